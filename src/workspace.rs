//! Scratch workspace.

use std::fmt;
use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log;

use crate::sort::SortError;

/// Prefix of uniquely named workspace directories.
pub const WORKSPACE_PREFIX: &str = "line-sort-";

/// Scratch files owned by a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchFile {
    /// Left run buffer, rewritten for every run pair.
    LeftBatch,
    /// Right run buffer, rewritten for every run pair.
    RightBatch,
    /// First full-dataset mirror.
    MirrorA,
    /// Second full-dataset mirror.
    MirrorB,
}

impl ScratchFile {
    pub const ALL: [ScratchFile; 4] = [
        ScratchFile::LeftBatch,
        ScratchFile::RightBatch,
        ScratchFile::MirrorA,
        ScratchFile::MirrorB,
    ];

    /// Returns the file name inside the workspace directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ScratchFile::LeftBatch => "left_batch.txt",
            ScratchFile::RightBatch => "right_batch.txt",
            ScratchFile::MirrorA => "mirror_a.txt",
            ScratchFile::MirrorB => "mirror_b.txt",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ScratchFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Where a workspace directory is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceLocation {
    /// A fresh uniquely named directory inside the parent (OS temporary directory if [`None`]).
    Unique(Option<PathBuf>),
    /// Exactly this directory. It must not exist yet.
    Fixed(PathBuf),
}

impl Default for WorkspaceLocation {
    fn default() -> Self {
        WorkspaceLocation::Unique(None)
    }
}

enum WorkspaceDir {
    Temp(tempfile::TempDir),
    Fixed(PathBuf),
}

/// Working directory holding the four scratch files of one sort operation.
///
/// The directory is removed by [`ScratchWorkspace::release`] or, on any other exit path, when the
/// workspace is dropped. Removal errors are logged and never propagated.
pub struct ScratchWorkspace {
    path: PathBuf,
    dir: Option<WorkspaceDir>,
    files: Vec<fs::File>,
    rw_buf_size: Option<usize>,
}

impl ScratchWorkspace {
    /// Creates the working directory and the scratch files.
    ///
    /// # Arguments
    /// * `location` - Where the working directory is created
    /// * `rw_buf_size` - Read/write buffer size of the streams opened over scratch files
    pub fn acquire(location: &WorkspaceLocation, rw_buf_size: Option<usize>) -> Result<Self, SortError> {
        let dir = match location {
            WorkspaceLocation::Unique(parent) => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(WORKSPACE_PREFIX);
                let dir = match parent {
                    Some(parent) => builder.tempdir_in(parent),
                    None => builder.tempdir(),
                };
                dir.map(WorkspaceDir::Temp)
            }
            WorkspaceLocation::Fixed(path) => fs::create_dir(path).map(|_| WorkspaceDir::Fixed(path.clone())),
        }
        .map_err(SortError::Workspace)?;

        let path = match &dir {
            WorkspaceDir::Temp(dir) => dir.path().to_path_buf(),
            WorkspaceDir::Fixed(path) => path.clone(),
        };

        // dropping a partially initialized workspace removes the directory
        let mut workspace = ScratchWorkspace {
            path,
            dir: Some(dir),
            files: Vec::with_capacity(ScratchFile::ALL.len()),
            rw_buf_size,
        };

        for scratch in ScratchFile::ALL {
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(workspace.path.join(scratch.file_name()))
                .map_err(SortError::Workspace)?;
            workspace.files.push(file);
        }

        log::info!("using {} as a scratch workspace", workspace.path.display());

        return Ok(workspace);
    }

    /// Returns the working directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a handle to a scratch file.
    pub fn file(&self, scratch: ScratchFile) -> &fs::File {
        &self.files[scratch.index()]
    }

    /// Resets a scratch file to zero length and moves its cursor to the start.
    pub fn truncate(&self, scratch: ScratchFile) -> Result<(), SortError> {
        self.file(scratch)
            .set_len(0)
            .map_err(|err| SortError::Filesystem { file: scratch, err })?;
        self.rewind(scratch)
    }

    /// Moves a scratch file cursor to the start.
    pub fn rewind(&self, scratch: ScratchFile) -> Result<(), SortError> {
        self.file(scratch)
            .seek(SeekFrom::Start(0))
            .map_err(|err| SortError::Filesystem { file: scratch, err })?;
        Ok(())
    }

    /// Opens a buffered reader at the current cursor of a scratch file.
    pub fn reader(&self, scratch: ScratchFile) -> io::BufReader<&fs::File> {
        match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, self.file(scratch)),
            None => io::BufReader::new(self.file(scratch)),
        }
    }

    /// Opens a buffered writer at the current cursor of a scratch file.
    pub fn writer(&self, scratch: ScratchFile) -> io::BufWriter<&fs::File> {
        match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, self.file(scratch)),
            None => io::BufWriter::new(self.file(scratch)),
        }
    }

    /// Closes the scratch files and removes the working directory.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        // files are closed before the directory is removed
        self.files.clear();

        let result = match self.dir.take() {
            Some(WorkspaceDir::Temp(dir)) => dir.close(),
            Some(WorkspaceDir::Fixed(path)) => fs::remove_dir_all(path),
            None => return,
        };

        match result {
            Ok(()) => log::debug!("scratch workspace {} removed", self.path.display()),
            Err(err) => log::warn!("scratch workspace {} not removed: {}", self.path.display(), err),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        self.remove();
    }
}
