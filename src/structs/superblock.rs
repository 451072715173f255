use std::fmt::Display;

use super::*;
use crate::error::{Error, FormatError};

impl Superblock {
    /// Lay out a container of `size_mb` mebibytes
    pub fn new(size_mb: u32) -> Result<Self, Error> {
        let size_bytes = size_mb as u64 * MEBIBYTE;
        let usable = size_bytes.saturating_sub(SUPERBLOCK_SIZE as u64);
        // Cost of 64 blocks: their data, 8 bytes of block bitmap,
        // 1 byte of inode bitmap and 8 inode records
        let cost_of_64 = 64 * BLOCK_SIZE as u64
            + 64 / 8
            + 64 / (8 * BLOCKS_PER_INODE as u64)
            + (64 / BLOCKS_PER_INODE as u64) * INODE_SIZE as u64;
        let mut total_blocks = usable * 64 / cost_of_64;
        while total_blocks > 0 && Self::layout_end(total_blocks) > size_bytes {
            total_blocks -= 1;
        }
        let total_inodes = total_blocks / BLOCKS_PER_INODE as u64;
        if total_inodes == 0 {
            return Err(FormatError::TooSmall.into());
        }
        if Self::layout_end(total_blocks) > u32::MAX as u64 {
            return Err(FormatError::TooLarge.into());
        }
        let (total_blocks, total_inodes) = (total_blocks as u32, total_inodes as u32);

        let inode_bitmap_offset = SUPERBLOCK_SIZE as u32;
        let inode_bitmap_size = Bitmap::<Inode>::size(total_inodes);
        let block_bitmap_offset = inode_bitmap_offset + inode_bitmap_size;
        let block_bitmap_size = Bitmap::<Block>::size(total_blocks);
        let inode_table_offset = block_bitmap_offset + block_bitmap_size;
        let data_blocks_offset = inode_table_offset + total_inodes * INODE_SIZE as u32;
        Ok(Self {
            magic: MAGIC_SIGNATURE,
            version: FORMAT_VERSION,
            block_size: BLOCK_SIZE,
            inode_bitmap_offset,
            inode_bitmap_size,
            block_bitmap_offset,
            block_bitmap_size,
            inode_table_offset,
            total_inodes,
            data_blocks_offset,
            total_blocks,
        })
    }

    /// Exact container size for a given block count
    fn layout_end(total_blocks: u64) -> u64 {
        let total_inodes = total_blocks / BLOCKS_PER_INODE as u64;
        SUPERBLOCK_SIZE as u64
            + total_inodes.div_ceil(8)
            + total_blocks.div_ceil(8)
            + total_inodes * INODE_SIZE as u64
            + total_blocks * BLOCK_SIZE as u64
    }

    /// Regions are ordered and sized the way [`Superblock::new`] lays them out
    pub fn is_consistent(&self) -> bool {
        let ordered = (SUPERBLOCK_SIZE as u32) <= self.inode_bitmap_offset
            && self.inode_bitmap_offset < self.block_bitmap_offset
            && self.block_bitmap_offset < self.inode_table_offset
            && self.inode_table_offset < self.data_blocks_offset;
        ordered
            && self.block_size > 0
            && self.inode_bitmap_size >= Bitmap::<Inode>::size(self.total_inodes)
            && self.block_bitmap_size >= Bitmap::<Block>::size(self.total_blocks)
            && self.block_bitmap_offset - self.inode_bitmap_offset >= self.inode_bitmap_size
            && self.inode_table_offset - self.block_bitmap_offset >= self.block_bitmap_size
            && (self.data_blocks_offset - self.inode_table_offset) as u64
                >= self.total_inodes as u64 * INODE_SIZE as u64
    }

    /// Position of inode record `index`
    pub fn inode_position(&self, index: u32) -> Result<u64, Error> {
        if index >= self.total_inodes {
            return Err(Error::OutOfBounds);
        }
        Ok(self.inode_table_offset as u64 + index as u64 * INODE_SIZE as u64)
    }

    /// Position of data block `index`
    pub fn block_position(&self, index: u32) -> Result<u64, Error> {
        if index >= self.total_blocks {
            return Err(Error::OutOfBounds);
        }
        Ok(self.data_blocks_offset as u64 + index as u64 * self.block_size as u64)
    }

    /// First byte past the data region
    pub fn end(&self) -> u64 {
        self.data_blocks_offset as u64 + self.total_blocks as u64 * self.block_size as u64
    }

    /// Block ids stored in a single indirect block
    pub fn ids_per_block(&self) -> usize {
        self.block_size as usize / BLOCK_ID_SIZE
    }

    /// Directory entries stored in a directory block
    pub fn entries_per_block(&self) -> usize {
        self.block_size as usize / ENTRY_SIZE
    }

    /// Largest file representable with direct and single indirect blocks
    pub fn max_file_size(&self) -> u64 {
        (DIRECT_BLOCKS + self.ids_per_block()) as u64 * self.block_size as u64
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn total_inodes(&self) -> u32 {
        self.total_inodes
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..SUPERBLOCK_SIZE])
    }
}

impl Display for Superblock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "magic:        {:#010x}", self.magic)?;
        writeln!(f, "version:      {}", self.version)?;
        writeln!(f, "block size:   {}", self.block_size)?;
        writeln!(
            f,
            "inode bitmap: {} (+{} bytes)",
            self.inode_bitmap_offset, self.inode_bitmap_size
        )?;
        writeln!(
            f,
            "block bitmap: {} (+{} bytes)",
            self.block_bitmap_offset, self.block_bitmap_size
        )?;
        writeln!(
            f,
            "inode table:  {} ({} inodes)",
            self.inode_table_offset, self.total_inodes
        )?;
        write!(
            f,
            "data blocks:  {} ({} blocks)",
            self.data_blocks_offset, self.total_blocks
        )
    }
}
