mod bitmap;
mod block;
mod entry;
mod inode;
mod superblock;

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

pub use entry::DirectoryListing;

/// Format signature stored in the first four bytes of every container
pub const MAGIC_SIGNATURE: u32 = 0xEF53_F00D;
pub const FORMAT_VERSION: u32 = 1;
pub const BLOCK_SIZE: u32 = 4096;
/// Reserved id meaning "no block" or "no inode"
pub const NULL_ID: u32 = u32::MAX;
pub const ROOT_INODE: u32 = 0;
pub const ROOT_BLOCK: u32 = 0;
pub const DIRECT_BLOCKS: usize = 5;
pub const BLOCKS_PER_INODE: u32 = 8;
pub const NAME_LENGTH: usize = 12;
pub const MEBIBYTE: u64 = 1024 * 1024;

pub const SUPERBLOCK_SIZE: usize = std::mem::size_of::<Superblock>();
pub const INODE_SIZE: usize = std::mem::size_of::<Inode>();
pub const ENTRY_SIZE: usize = std::mem::size_of::<DirectoryEntry>();
pub const BLOCK_ID_SIZE: usize = std::mem::size_of::<u32>();

/// Marker for resources tracked by a [`Bitmap`]
pub trait AsBitmap {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Superblock {
    /// Magic signature
    pub(crate) magic: u32,
    /// On-disk format version
    pub(crate) version: u32,
    /// Block size in bytes
    pub(crate) block_size: u32,
    pub(crate) inode_bitmap_offset: u32,
    /// Inode bitmap size in bytes
    pub(crate) inode_bitmap_size: u32,
    pub(crate) block_bitmap_offset: u32,
    /// Block bitmap size in bytes
    pub(crate) block_bitmap_size: u32,
    pub(crate) inode_table_offset: u32,
    /// Total count of inodes in the filesystem
    pub(crate) total_inodes: u32,
    pub(crate) data_blocks_offset: u32,
    /// Total count of blocks in the filesystem
    pub(crate) total_blocks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Inode {
    /// Inode's index in the inode table
    pub(crate) id: u32,
    /// File size in bytes, unused for directories
    pub(crate) file_size: u32,
    /// Directly referenced data blocks
    pub(crate) direct_blocks: [u32; DIRECT_BLOCKS],
    /// Block holding an array of further block ids
    pub(crate) indirect_block: u32,
    /// Count of directory entries referencing this inode
    pub(crate) link_count: u8,
    /// Non-zero for directories
    pub(crate) directory: u8,
    #[doc(hidden)]
    pub(crate) __padding_1: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DirectoryEntry {
    /// NUL padded name, not terminated when all bytes are used
    pub(crate) name: [u8; NAME_LENGTH],
    /// Referenced inode or [`NULL_ID`] for an empty slot
    pub(crate) inode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block's index
    pub(crate) index: u32,
    /// Raw data as bytes
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Bitmap<T: AsBitmap> {
    /// One bit per resource, least significant bit first
    pub(crate) bitfield: Vec<u8>,
    /// Number of valid indexes
    pub(crate) count: u32,
    /// Cached count of clear bits below `count`
    pub(crate) free: u32,
    /// Byte offset in the container
    pub(crate) position: u64,
    /// Modified since the last flush
    pub(crate) dirty: bool,
    #[doc(hidden)]
    __type: PhantomData<T>,
}
