//! File content and directory operations layered on [`Filesystem`](crate::filesystem::Filesystem)
//!
//! Regular files address their data through five direct block pointers and
//! one single-indirect block. Directories own exactly one block of fixed-size
//! entries, the first two of which are `.` and `..`.

mod directory;
mod path;
mod regular_file;

pub use path::split_path;
