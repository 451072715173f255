use thiserror::Error;

/// Reasons a container cannot be mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("container not found")]
    NotFound,
    #[error("corrupt superblock")]
    CorruptSuperblock,
    #[error("bad magic signature")]
    BadMagic,
    #[error("unsupported format version")]
    UnsupportedVersion,
    #[error("truncated bitmap")]
    TruncatedBitmap,
}

/// Bitmap exhaustion, an ordinary failed-operation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no free inode")]
    NoFreeInode,
    #[error("no free block")]
    NoFreeBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("already exists")]
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory full")]
    Full,
    #[error("directory not empty")]
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("requested size too small to hold at least one inode")]
    TooSmall,
    #[error("requested size not addressable")]
    TooLarge,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("filesystem not mounted")]
    NotMounted,
    #[error("is a directory")]
    IsADirectory,
    #[error("file too large")]
    FileTooLarge,
    #[error("invalid name")]
    InvalidName,
    #[error("out of bounds")]
    OutOfBounds,
    #[error("double release")]
    DoubleRelease,
}
