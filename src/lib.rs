//! Single-file container filesystem
//!
//! A container holds, in order, a superblock, an inode bitmap, a block
//! bitmap, a fixed inode table and the data blocks. [`Filesystem`] mounts a
//! container and exposes allocation, inode/block access, file content and
//! path operations; [`Session`] adds the working directory used by the shell.

pub mod error;
pub mod filesystem;
pub mod filetypes;
pub mod session;
pub mod shell;
pub mod structs;

pub use error::Error;
pub use filesystem::{format, format_device, BlockDevice, Filesystem};
pub use session::Session;
