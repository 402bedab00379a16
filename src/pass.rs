//! Merge pass engine.
//!
//! Every pass scans the current mirror, copies each adjacent pair of runs into the batch buffers
//! and merges them into the next mirror. The run length doubles after each pass and the mirrors
//! exchange roles, so after `ceil(log2(n))` passes the current mirror holds one sorted run.

use std::io::prelude::*;
use std::mem;

use log;

use crate::line::{copy_lines, LineReader};
use crate::merger::merge_runs;
use crate::sort::{Phase, SortError};
use crate::workspace::{ScratchFile, ScratchWorkspace};

/// Roles of the two mirrors during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorRoles {
    /// Mirror holding the dataset produced by the previous pass.
    pub current: ScratchFile,
    /// Mirror the running pass writes to.
    pub next: ScratchFile,
}

impl MirrorRoles {
    pub fn new() -> Self {
        MirrorRoles {
            current: ScratchFile::MirrorA,
            next: ScratchFile::MirrorB,
        }
    }

    /// Exchanges the mirror roles. No data is moved.
    pub fn swap(&mut self) {
        mem::swap(&mut self.current, &mut self.next);
    }
}

impl Default for MirrorRoles {
    fn default() -> Self {
        MirrorRoles::new()
    }
}

/// Outcome of the pass engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// Mirror holding the sorted dataset.
    pub sorted: ScratchFile,
    /// Number of executed passes.
    pub passes: usize,
}

/// Drives merge passes over the mirrors of a scratch workspace.
pub struct PassEngine<'a> {
    workspace: &'a ScratchWorkspace,
    line_count: usize,
    max_line_len: usize,
}

impl<'a> PassEngine<'a> {
    /// Creates a pass engine.
    ///
    /// # Arguments
    /// * `workspace` - Workspace whose [`ScratchFile::MirrorA`] holds the loaded dataset
    /// * `line_count` - Number of lines in the dataset
    /// * `max_line_len` - Maximum line length used by scratch readers
    pub fn new(workspace: &'a ScratchWorkspace, line_count: usize, max_line_len: usize) -> Self {
        PassEngine {
            workspace,
            line_count,
            max_line_len,
        }
    }

    /// Runs passes until the whole dataset is a single run.
    pub fn run(&self) -> Result<PassOutcome, SortError> {
        let mut roles = MirrorRoles::new();
        let mut batch_size: usize = 1;
        let mut passes = 0;

        while batch_size < self.line_count {
            log::debug!(
                "merge pass {} (batch size: {}, {} -> {})",
                passes + 1,
                batch_size,
                roles.current,
                roles.next
            );
            self.run_pass(roles, batch_size)?;

            roles.swap();
            batch_size = batch_size.saturating_mul(2);
            passes += 1;
        }

        return Ok(PassOutcome {
            sorted: roles.current,
            passes,
        });
    }

    fn run_pass(&self, roles: MirrorRoles, batch_size: usize) -> Result<(), SortError> {
        let phase = Phase::Pass(batch_size);
        let line_error = |err| SortError::from_line(phase, err);

        self.workspace.truncate(roles.next)?;
        self.workspace.rewind(roles.current)?;

        let mut input = LineReader::new(self.workspace.reader(roles.current), self.max_line_len);
        let mut output = self.workspace.writer(roles.next);

        let mut position = 0;
        while position < self.line_count {
            self.workspace.truncate(ScratchFile::LeftBatch)?;
            self.workspace.truncate(ScratchFile::RightBatch)?;

            let left_len = self.fill_batch(&mut input, ScratchFile::LeftBatch, batch_size, phase)?;
            let right_len = self.fill_batch(&mut input, ScratchFile::RightBatch, batch_size, phase)?;
            log::trace!("merging runs at line {} ({} + {} lines)", position, left_len, right_len);

            self.workspace.rewind(ScratchFile::LeftBatch)?;
            self.workspace.rewind(ScratchFile::RightBatch)?;

            let left = LineReader::new(self.workspace.reader(ScratchFile::LeftBatch), self.max_line_len);
            let right = LineReader::new(self.workspace.reader(ScratchFile::RightBatch), self.max_line_len);
            merge_runs(left, right, &mut output).map_err(line_error)?;

            position = position.saturating_add(batch_size.saturating_mul(2));
        }

        output.flush().map_err(|err| SortError::Write(phase, err))?;

        return Ok(());
    }

    fn fill_batch<R: BufRead>(
        &self,
        input: &mut LineReader<R>,
        batch: ScratchFile,
        batch_size: usize,
        phase: Phase,
    ) -> Result<usize, SortError> {
        let mut writer = self.workspace.writer(batch);
        let copied = copy_lines(input, &mut writer, batch_size).map_err(|err| SortError::from_line(phase, err))?;
        writer.flush().map_err(|err| SortError::Write(phase, err))?;

        return Ok(copied);
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use rstest::*;

    use super::{MirrorRoles, PassEngine};
    use crate::workspace::{ScratchFile, ScratchWorkspace, WorkspaceLocation};

    #[fixture]
    fn parent_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_mirror_roles_swap() {
        let mut roles = MirrorRoles::new();
        assert_eq!(roles.current, ScratchFile::MirrorA);

        roles.swap();
        assert_eq!(roles.current, ScratchFile::MirrorB);
        assert_eq!(roles.next, ScratchFile::MirrorA);

        roles.swap();
        assert_eq!(roles, MirrorRoles::default());
    }

    #[rstest]
    #[case(vec![], 0, ScratchFile::MirrorA)]
    #[case(vec!["only"], 0, ScratchFile::MirrorA)]
    #[case(vec!["b", "a"], 1, ScratchFile::MirrorB)]
    #[case(vec!["c", "b", "a"], 2, ScratchFile::MirrorA)]
    #[case(vec!["e", "d", "c", "b", "a"], 3, ScratchFile::MirrorB)]
    #[case(vec!["h", "g", "f", "e", "d", "c", "b", "a"], 3, ScratchFile::MirrorB)]
    #[case(vec!["b", "a", "a", "c", "b", "", "a", "c", "d"], 4, ScratchFile::MirrorA)]
    fn test_pass_engine(
        parent_dir: tempfile::TempDir,
        #[case] lines: Vec<&str>,
        #[case] expected_passes: usize,
        #[case] expected_mirror: ScratchFile,
    ) {
        let location = WorkspaceLocation::Unique(Some(parent_dir.path().to_path_buf()));
        let workspace = ScratchWorkspace::acquire(&location, Some(8)).unwrap();

        let mut mirror = workspace.file(ScratchFile::MirrorA);
        for line in &lines {
            mirror.write_all(format!("{}\n", line).as_bytes()).unwrap();
        }

        let outcome = PassEngine::new(&workspace, lines.len(), 64).run().unwrap();
        assert_eq!(outcome.passes, expected_passes);
        assert_eq!(outcome.sorted, expected_mirror);

        workspace.rewind(outcome.sorted).unwrap();
        let mut actual = String::new();
        workspace.file(outcome.sorted).read_to_string(&mut actual).unwrap();

        let mut expected = lines.clone();
        expected.sort();
        let expected: String = expected.into_iter().map(|line| format!("{}\n", line)).collect();

        assert_eq!(actual, expected);
    }
}
