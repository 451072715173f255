use std::fmt::Display;

use super::*;
use crate::error::Error;

const BITS_IN_BYTE: u32 = u8::BITS;

impl<T: AsBitmap> Bitmap<T> {
    /// Return empty bitmap tracking `count` resources
    fn empty(count: u32, position: u64) -> Self {
        Self {
            bitfield: vec![0; Self::size(count) as usize],
            count,
            free: count,
            position,
            dirty: false,
            __type: PhantomData,
        }
    }

    /// Calculate bitmap size in bytes for `count` resources
    pub(crate) fn size(count: u32) -> u32 {
        count.div_ceil(BITS_IN_BYTE)
    }

    /// Modify occupancy
    pub(crate) fn set(&mut self, index: u32, value: bool) -> Result<(), Error> {
        if index >= self.count {
            return Err(Error::OutOfBounds);
        }
        let row = (index / BITS_IN_BYTE) as usize;
        let mask = 1u8 << (index % BITS_IN_BYTE);
        if value {
            self.bitfield[row] |= mask;
        } else {
            self.bitfield[row] &= !mask;
        }
        Ok(())
    }

    /// Get occupancy
    pub(crate) fn get(&self, index: u32) -> Result<bool, Error> {
        if index >= self.count {
            return Err(Error::OutOfBounds);
        }
        let row = (index / BITS_IN_BYTE) as usize;
        let mask = 1u8 << (index % BITS_IN_BYTE);
        Ok(self.bitfield[row] & mask != 0)
    }

    /// Index of the first clear bit at or after `start`
    pub(crate) fn next_free(&self, start: u32) -> Option<u32> {
        (start..self.count).find(|&index| matches!(self.get(index), Ok(false)))
    }

    /// Recount clear bits below `count`
    pub(crate) fn recount(&mut self) -> u32 {
        let used = (0..self.count)
            .filter(|&index| matches!(self.get(index), Ok(true)))
            .count() as u32;
        self.free = self.count - used;
        self.free
    }

    /// Replace the bitfield with raw bytes read from the container
    pub(crate) fn load_bytes(&mut self, bytes: &[u8]) {
        let length = self.bitfield.len().min(bytes.len());
        self.bitfield[..length].copy_from_slice(&bytes[..length]);
        // Bits past the resource count must stay clear
        let tail = self.count % BITS_IN_BYTE;
        if tail != 0 {
            if let Some(last) = self.bitfield.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        self.dirty = false;
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bitfield
    }
}

impl Bitmap<Inode> {
    /// Create new bitmap with all inodes inactive
    pub fn new(superblock: &Superblock) -> Self {
        Self::empty(
            superblock.total_inodes,
            superblock.inode_bitmap_offset as u64,
        )
    }
}

impl Bitmap<Block> {
    /// Create new bitmap with all blocks inactive
    pub fn new(superblock: &Superblock) -> Self {
        Self::empty(
            superblock.total_blocks,
            superblock.block_bitmap_offset as u64,
        )
    }
}

impl<T: AsBitmap> Display for Bitmap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} of {} used, {} free",
            self.count - self.free,
            self.count,
            self.free
        )?;
        for (row, chunk) in self.bitfield.chunks(8).enumerate() {
            write!(f, "{:>8}:", row * 64)?;
            for byte in chunk {
                write!(f, " {byte:08b}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
