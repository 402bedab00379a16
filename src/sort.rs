//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use crate::line::{self, LineError, DEFAULT_MAX_LINE_LEN};
use crate::pass::PassEngine;
use crate::workspace::{ScratchFile, ScratchWorkspace, WorkspaceLocation};

/// Sort operation phase, used as error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Copying the input file into the first mirror.
    Load,
    /// Merge pass with the given batch size.
    Pass(usize),
    /// Copying the sorted mirror to the output file.
    Finalize,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Phase::Load => write!(f, "mirror loading"),
            Phase::Pass(batch_size) => write!(f, "merge pass (batch size {})", batch_size),
            Phase::Finalize => write!(f, "finalization"),
        }
    }
}

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration.
    Config(String),
    /// Scratch workspace directory or file creation error.
    Workspace(io::Error),
    /// Input file opening error.
    Input(io::Error),
    /// Output file creation error.
    Output(io::Error),
    /// Scratch file truncation or seek error.
    Filesystem { file: ScratchFile, err: io::Error },
    /// Line read error.
    Read(Phase, io::Error),
    /// A line exceeds the maximum supported length.
    LineTooLong { phase: Phase, line: usize, limit: usize },
    /// Write error.
    Write(Phase, io::Error),
}

impl SortError {
    /// Wraps a line level error with the phase it occurred in.
    pub fn from_line(phase: Phase, err: LineError) -> Self {
        match err {
            LineError::Read(err) => SortError::Read(phase, err),
            LineError::TooLong { line, limit } => SortError::LineTooLong { phase, line, limit },
            LineError::Write(err) => SortError::Write(phase, err),
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(_) => None,
            SortError::Workspace(err) => Some(err),
            SortError::Input(err) => Some(err),
            SortError::Output(err) => Some(err),
            SortError::Filesystem { err, .. } => Some(err),
            SortError::Read(_, err) => Some(err),
            SortError::LineTooLong { .. } => None,
            SortError::Write(_, err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(msg) => write!(f, "invalid sorter configuration: {}", msg),
            SortError::Workspace(err) => write!(f, "scratch workspace not created: {}", err),
            SortError::Input(err) => write!(f, "input file not opened: {}", err),
            SortError::Output(err) => write!(f, "output file not created: {}", err),
            SortError::Filesystem { file, err } => write!(f, "scratch file {} not reset: {}", file, err),
            SortError::Read(phase, err) => write!(f, "read failed during {}: {}", phase, err),
            SortError::LineTooLong { phase, line, limit } => write!(
                f,
                "line {} exceeds the maximum length of {} bytes during {}",
                line, limit, phase
            ),
            SortError::Write(phase, err) => write!(f, "write failed during {}: {}", phase, err),
        }
    }
}

/// Sort operation summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    /// Number of sorted lines.
    pub lines: usize,
    /// Number of executed merge passes.
    pub passes: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone, Debug)]
pub struct ExternalSorterBuilder {
    /// Directory in which uniquely named scratch workspaces are created.
    tmp_dir: Option<Box<Path>>,
    /// Exact scratch workspace directory.
    workspace_dir: Option<Box<Path>>,
    /// Maximum supported line length.
    max_line_len: usize,
    /// Scratch and output file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        if self.max_line_len == 0 {
            return Err(SortError::Config("maximum line length must be positive".into()));
        }
        if self.rw_buf_size == Some(0) {
            return Err(SortError::Config("read/write buffer size must be positive".into()));
        }

        let location = match self.workspace_dir {
            Some(path) => WorkspaceLocation::Fixed(path.into()),
            None => WorkspaceLocation::Unique(self.tmp_dir.map(Into::into)),
        };

        return Ok(ExternalSorter::new(location, self.max_line_len, self.rw_buf_size));
    }

    /// Sets directory in which a uniquely named scratch workspace is created for every sort.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets the exact scratch workspace directory. The directory must not exist when a sort starts
    /// and concurrent sorts must not share it. Takes precedence over [`Self::with_tmp_dir`].
    pub fn with_workspace_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.workspace_dir = Some(path.into());
        return self;
    }

    /// Sets the maximum supported line length in bytes, separator excluded.
    /// Longer lines fail the sort with [`SortError::LineTooLong`].
    pub fn with_max_line_len(mut self, max_line_len: usize) -> ExternalSorterBuilder {
        self.max_line_len = max_line_len;
        return self;
    }

    /// Sets file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            tmp_dir: None,
            workspace_dir: None,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            rw_buf_size: None,
        }
    }
}

/// External sorter.
#[derive(Clone, Debug)]
pub struct ExternalSorter {
    /// Scratch workspace location.
    location: WorkspaceLocation,
    /// Maximum supported line length.
    max_line_len: usize,
    /// Scratch and output file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `location` - Where the scratch workspace of every sort is created
    /// * `max_line_len` - Maximum supported line length in bytes, separator excluded
    /// * `rw_buf_size` - File read/write buffer size. If the parameter is [`None`] the default
    ///   buffer size is used.
    pub fn new(location: WorkspaceLocation, max_line_len: usize, rw_buf_size: Option<usize>) -> Self {
        ExternalSorter {
            location,
            max_line_len,
            rw_buf_size,
        }
    }

    /// Sorts lines of the input file into the output file.
    /// The output file is created or overwritten and may be the input file itself.
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    /// * `output` - Result file
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let source = fs::File::open(input).map_err(SortError::Input)?;

        let workspace = ScratchWorkspace::acquire(&self.location, self.rw_buf_size)?;
        let result = self.sort_in(&workspace, source, output);
        workspace.release();

        let stats = result?;
        log::info!(
            "sorted {} lines into {} ({} passes)",
            stats.lines,
            output.display(),
            stats.passes
        );

        return Ok(stats);
    }

    fn sort_in(&self, workspace: &ScratchWorkspace, source: fs::File, output: &Path) -> Result<SortStats, SortError> {
        let lines = self.load(workspace, source)?;
        log::info!("loaded {} lines", lines);

        let outcome = PassEngine::new(workspace, lines, self.max_line_len).run()?;
        self.finalize(workspace, outcome.sorted, output)?;

        return Ok(SortStats {
            lines,
            passes: outcome.passes,
        });
    }

    fn load(&self, workspace: &ScratchWorkspace, source: fs::File) -> Result<usize, SortError> {
        let source = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, source),
            None => io::BufReader::new(source),
        };
        let mut mirror = workspace.writer(ScratchFile::MirrorA);

        line::load_mirror(source, &mut mirror, self.max_line_len).map_err(|err| SortError::from_line(Phase::Load, err))
    }

    fn finalize(&self, workspace: &ScratchWorkspace, sorted: ScratchFile, output: &Path) -> Result<(), SortError> {
        workspace.rewind(sorted)?;

        let output = fs::File::create(output).map_err(SortError::Output)?;
        let mut writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, output),
            None => io::BufWriter::new(output),
        };

        io::copy(&mut workspace.reader(sorted), &mut writer).map_err(|err| SortError::Write(Phase::Finalize, err))?;
        writer.flush().map_err(|err| SortError::Write(Phase::Finalize, err))?;

        return Ok(());
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder, Phase, SortError, SortStats};
    use crate::gen;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn scratch_parent(tmp_dir: &tempfile::TempDir) -> PathBuf {
        let parent = tmp_dir.path().join("scratch");
        fs::create_dir(&parent).unwrap();
        parent
    }

    fn sorter(scratch_parent: &Path) -> ExternalSorter {
        ExternalSorterBuilder::new()
            .with_tmp_dir(scratch_parent)
            .with_rw_buf_size(16)
            .build()
            .unwrap()
    }

    fn assert_workspace_removed(scratch_parent: &Path) {
        assert_eq!(fs::read_dir(scratch_parent).unwrap().count(), 0);
    }

    fn sort_content(tmp_dir: &tempfile::TempDir, content: &[u8]) -> Vec<u8> {
        let parent = scratch_parent(tmp_dir);
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, content).unwrap();

        sorter(&parent).sort(&input, &output).unwrap();
        assert_workspace_removed(&parent);

        fs::read(&output).unwrap()
    }

    #[rstest]
    #[case(b"", b"")]
    #[case(b"single\n", b"single\n")]
    #[case(b"b\na\na\nc\n", b"a\na\nb\nc\n")]
    #[case(b"banana\napple\ncherry\n", b"apple\nbanana\ncherry\n")]
    #[case(b"banana\napple\ncherry", b"apple\nbanana\ncherry\n")]
    #[case(b"b\n\na\n\n", b"\n\na\nb\n")]
    #[case(b"ab\na\nB\nabc\n", b"B\na\nab\nabc\n")]
    fn test_sort(tmp_dir: tempfile::TempDir, #[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(sort_content(&tmp_dir, input), expected);
    }

    #[rstest]
    fn test_sort_stats(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, b"5\n4\n3\n2\n1\n").unwrap();

        let stats = sorter(&parent).sort(&input, &output).unwrap();
        assert_eq!(stats, SortStats { lines: 5, passes: 3 });
    }

    #[rstest]
    fn test_sort_generated(tmp_dir: tempfile::TempDir) {
        let mut generated = Vec::new();
        gen::random_lines(1000, 12, &mut StdRng::seed_from_u64(42), &mut generated).unwrap();

        let sorted = sort_content(&tmp_dir, &generated);

        let input_lines = Vec::from_iter(generated.split(|b| *b == b'\n'));
        let output_lines = Vec::from_iter(sorted.split(|b| *b == b'\n'));
        assert_eq!(output_lines.len(), input_lines.len());

        // order
        let output_lines = &output_lines[..output_lines.len() - 1];
        assert!(output_lines.windows(2).all(|pair| pair[0] <= pair[1]));

        // permutation
        let mut counts: HashMap<&[u8], isize> = HashMap::new();
        for line in &input_lines[..input_lines.len() - 1] {
            *counts.entry(*line).or_default() += 1;
        }
        for line in output_lines {
            *counts.entry(*line).or_default() -= 1;
        }
        assert!(counts.values().all(|count| *count == 0));
    }

    #[rstest]
    fn test_sort_idempotent_and_deterministic(tmp_dir: tempfile::TempDir) {
        let mut generated = Vec::new();
        gen::random_lines(300, 8, &mut StdRng::seed_from_u64(7), &mut generated).unwrap();

        let first = sort_content(&tmp_dir, &generated);
        let second = sort_content(&tempfile::tempdir().unwrap(), &generated);
        assert_eq!(first, second);

        let resorted = sort_content(&tempfile::tempdir().unwrap(), &first);
        assert_eq!(resorted, first);
    }

    #[rstest]
    fn test_sort_patterned(tmp_dir: tempfile::TempDir) {
        let mut generated = Vec::new();
        gen::reversed_alphabet_lines(60, &mut generated).unwrap();

        let mut expected = Vec::from_iter(generated.split(|b| *b == b'\n').filter(|l| !l.is_empty()));
        expected.sort();
        let expected: Vec<u8> = expected.into_iter().flat_map(|l| l.iter().copied().chain([b'\n'])).collect();

        assert_eq!(sort_content(&tmp_dir, &generated), expected);
    }

    #[rstest]
    fn test_sort_in_place(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let path = tmp_dir.path().join("data.txt");
        fs::write(&path, b"c\nb\na\n").unwrap();

        sorter(&parent).sort(&path, &path).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a\nb\nc\n");
    }

    #[rstest]
    fn test_sort_overwrites_output(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, b"y\nx\n").unwrap();
        fs::write(&output, b"previous content that is longer\n").unwrap();

        sorter(&parent).sort(&input, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"x\ny\n");
    }

    #[rstest]
    fn test_sort_line_too_long(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        fs::write(&input, b"short\nmuch too long\nshort\n").unwrap();

        let sorter = ExternalSorterBuilder::new()
            .with_tmp_dir(&parent)
            .with_max_line_len(8)
            .build()
            .unwrap();
        let result = sorter.sort(&input, &output);

        assert!(
            matches!(
                result,
                Err(SortError::LineTooLong {
                    phase: Phase::Load,
                    line: 2,
                    limit: 8
                })
            ),
            "unexpected result: {:?}",
            result
        );
        assert_workspace_removed(&parent);
        assert!(!output.exists());
    }

    #[rstest]
    fn test_sort_missing_input(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let result = sorter(&parent).sort(&tmp_dir.path().join("missing.txt"), &tmp_dir.path().join("out.txt"));

        assert!(matches!(result, Err(SortError::Input(_))));
        assert_workspace_removed(&parent);
    }

    #[rstest]
    fn test_sort_output_not_creatable(tmp_dir: tempfile::TempDir) {
        let parent = scratch_parent(&tmp_dir);
        let input = tmp_dir.path().join("input.txt");
        fs::write(&input, b"b\na\n").unwrap();

        let result = sorter(&parent).sort(&input, &tmp_dir.path().join("no_such_dir").join("out.txt"));

        assert!(matches!(result, Err(SortError::Output(_))));
        assert_workspace_removed(&parent);
    }

    #[rstest]
    fn test_sort_fixed_workspace_collision(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        let output = tmp_dir.path().join("output.txt");
        let workspace_dir = tmp_dir.path().join("workspace");
        fs::write(&input, b"b\na\n").unwrap();
        fs::create_dir(&workspace_dir).unwrap();

        let sorter = ExternalSorterBuilder::new()
            .with_workspace_dir(&workspace_dir)
            .build()
            .unwrap();

        let result = sorter.sort(&input, &output);
        assert!(matches!(result, Err(SortError::Workspace(_))));
        assert!(workspace_dir.is_dir());

        fs::remove_dir(&workspace_dir).unwrap();
        sorter.sort(&input, &output).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"a\nb\n");
        assert!(!workspace_dir.exists());
    }

    #[rstest]
    #[case(ExternalSorterBuilder::new().with_max_line_len(0))]
    #[case(ExternalSorterBuilder::new().with_rw_buf_size(0))]
    fn test_builder_rejects_invalid_config(#[case] builder: ExternalSorterBuilder) {
        assert!(matches!(builder.build(), Err(SortError::Config(_))));
    }
}
