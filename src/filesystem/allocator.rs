use log::{debug, info};

use super::Filesystem;
use crate::error::{AllocationError, Error};

impl Filesystem {
    /// Recompute cached free counters from both bitmaps
    pub(crate) fn metadata_init(&mut self) {
        let free_inodes = self.inodes.recount();
        let free_blocks = self.blocks.recount();
        info!(
            "Inodes: {} used, {free_inodes} free; blocks: {} used, {free_blocks} free",
            self.superblock.total_inodes - free_inodes,
            self.superblock.total_blocks - free_blocks,
        );
    }

    /// Get index of first empty inode
    pub fn allocate_inode(&mut self) -> Option<u32> {
        let index = self.inodes.next_free(0)?;
        self.inodes.set(index, true).ok()?;
        self.inodes.free = self.inodes.free.saturating_sub(1);
        self.mark_inode_bitmap_dirty();
        debug!("Acquire inode {index}");
        Some(index)
    }

    /// Release inode at index
    pub fn free_inode(&mut self, index: u32) -> Result<(), Error> {
        if !self.inodes.get(index)? {
            return Err(Error::DoubleRelease);
        }
        debug!("Release inode {index}");
        self.inodes.set(index, false)?;
        self.inodes.free += 1;
        self.mark_inode_bitmap_dirty();
        Ok(())
    }

    /// Get index of first empty block
    pub fn allocate_block(&mut self) -> Option<u32> {
        let index = self.blocks.next_free(0)?;
        self.blocks.set(index, true).ok()?;
        self.blocks.free = self.blocks.free.saturating_sub(1);
        self.mark_block_bitmap_dirty();
        debug!("Acquire block {index}");
        Some(index)
    }

    /// Release block at index
    pub fn free_block(&mut self, index: u32) -> Result<(), Error> {
        if !self.blocks.get(index)? {
            return Err(Error::DoubleRelease);
        }
        debug!("Release block {index}");
        self.blocks.set(index, false)?;
        self.blocks.free += 1;
        self.mark_block_bitmap_dirty();
        Ok(())
    }

    /// [`Self::allocate_inode`] with exhaustion as an error
    pub(crate) fn acquire_inode(&mut self) -> Result<u32, Error> {
        self.allocate_inode()
            .ok_or(Error::Allocation(AllocationError::NoFreeInode))
    }

    /// [`Self::allocate_block`] with exhaustion as an error
    pub(crate) fn acquire_block(&mut self) -> Result<u32, Error> {
        self.allocate_block()
            .ok_or(Error::Allocation(AllocationError::NoFreeBlock))
    }

    pub fn free_inode_count(&self) -> u32 {
        self.inodes.free
    }

    pub fn free_block_count(&self) -> u32 {
        self.blocks.free
    }
}
