//! Bounded line reading and line copying.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::prelude::*;

/// Line record separator.
pub const SEPARATOR: u8 = b'\n';

/// Default maximum line length in bytes, separator excluded.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Line level I/O error.
#[derive(Debug)]
pub enum LineError {
    /// Underlying read error.
    Read(io::Error),
    /// A line exceeds the maximum supported length.
    TooLong {
        /// One-based number of the offending line in its stream.
        line: usize,
        /// Maximum supported line length.
        limit: usize,
    },
    /// Underlying write error.
    Write(io::Error),
}

impl Error for LineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            LineError::Read(err) => Some(err),
            LineError::TooLong { .. } => None,
            LineError::Write(err) => Some(err),
        }
    }
}

impl Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            LineError::Read(err) => write!(f, "line read failed: {}", err),
            LineError::TooLong { line, limit } => {
                write!(f, "line {} exceeds the maximum length of {} bytes", line, limit)
            }
            LineError::Write(err) => write!(f, "line write failed: {}", err),
        }
    }
}

/// Reads separator-terminated lines, never buffering more than the maximum line length.
///
/// A line longer than the limit is an error, not a truncation. The last line of a stream
/// may lack the separator.
pub struct LineReader<R> {
    reader: R,
    max_line_len: usize,
    lines_read: usize,
}

impl<R: BufRead> LineReader<R> {
    /// Creates a line reader.
    ///
    /// # Arguments
    /// * `reader` - Stream lines are read from
    /// * `max_line_len` - Maximum line length in bytes, separator excluded
    pub fn new(reader: R, max_line_len: usize) -> Self {
        LineReader {
            reader,
            max_line_len,
            lines_read: 0,
        }
    }

    /// Reads the next line into `line` without the separator.
    /// Returns `false` when the stream is exhausted.
    pub fn read_line(&mut self, line: &mut Vec<u8>) -> Result<bool, LineError> {
        line.clear();

        let limit = (self.max_line_len as u64).saturating_add(1);
        let read = (&mut self.reader)
            .take(limit)
            .read_until(SEPARATOR, line)
            .map_err(LineError::Read)?;
        if read == 0 {
            return Ok(false);
        }

        self.lines_read += 1;
        if line.last() == Some(&SEPARATOR) {
            line.pop();
        } else if line.len() > self.max_line_len {
            return Err(LineError::TooLong {
                line: self.lines_read,
                limit: self.max_line_len,
            });
        }

        return Ok(true);
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<Vec<u8>, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.read_line(&mut line) {
            Ok(true) => Some(Ok(line)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Writes a line followed by the separator.
pub fn write_line<W: Write>(writer: &mut W, line: &[u8]) -> Result<(), LineError> {
    writer.write_all(line).map_err(LineError::Write)?;
    writer.write_all(&[SEPARATOR]).map_err(LineError::Write)
}

/// Copies up to `max_lines` lines from the reader to the writer, re-appending the separator.
/// Returns the number of lines copied.
pub fn copy_lines<R: BufRead, W: Write>(
    reader: &mut LineReader<R>,
    writer: &mut W,
    max_lines: usize,
) -> Result<usize, LineError> {
    let mut line = Vec::new();
    let mut copied = 0;

    while copied < max_lines && reader.read_line(&mut line)? {
        write_line(writer, &line)?;
        copied += 1;
    }

    return Ok(copied);
}

/// Streams every line of the source into a mirror and returns the line count.
pub fn load_mirror<R: BufRead, W: Write>(source: R, mirror: &mut W, max_line_len: usize) -> Result<usize, LineError> {
    let mut reader = LineReader::new(source, max_line_len);
    let count = copy_lines(&mut reader, mirror, usize::MAX)?;
    mirror.flush().map_err(LineError::Write)?;

    return Ok(count);
}
