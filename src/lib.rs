//! `ext-line-sort` sorts line-oriented text files that do not fit into memory.
//!
//! The sort is a bottom-up two-way external merge sort. The input file is streamed into a scratch
//! mirror file, then repeated passes merge adjacent runs of lines, doubling the run length every pass,
//! until the whole mirror is a single sorted run which is copied to the output file. At any moment
//! only one line per open stream is held in memory. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! * **Bounded memory:**
//!   lines are read through a bounded reader; a line longer than the configured maximum
//!   (64 KiB by default) fails the sort instead of being truncated.
//! * **Private scratch workspace:**
//!   every sort creates its own uniquely named scratch directory and removes it on every exit path,
//!   including errors and panics.
//! * **Byte order:**
//!   lines are compared as raw bytes, the line feed is the only record separator.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_line_sort::ExternalSorterBuilder;
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .with_max_line_len(1024)
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter.sort(Path::new("input.txt"), Path::new("output.txt")).unwrap();
//!     println!("{} lines sorted in {} passes", stats.lines, stats.passes);
//! }
//! ```

use std::path::Path;

pub mod gen;
pub mod line;
pub mod merger;
pub mod pass;
pub mod sort;
pub mod workspace;

pub use line::{LineError, LineReader, DEFAULT_MAX_LINE_LEN};
pub use merger::TwoWayMerger;
pub use pass::{MirrorRoles, PassEngine};
pub use sort::{ExternalSorter, ExternalSorterBuilder, Phase, SortError, SortStats};
pub use workspace::{ScratchFile, ScratchWorkspace, WorkspaceLocation};

/// Sorts lines of the input file into the output file using the default configuration.
pub fn sort(input: &Path, output: &Path) -> Result<SortStats, SortError> {
    ExternalSorterBuilder::new().build()?.sort(input, output)
}
