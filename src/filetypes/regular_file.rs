use log::debug;

use crate::error::Error;
use crate::filesystem::Filesystem;
use crate::structs::{Block, Inode, DIRECT_BLOCKS, NULL_ID};

impl Filesystem {
    /// Count of data and indirect blocks needed to store `length` bytes
    pub fn blocks_required(&self, length: u64) -> Result<u32, Error> {
        if length > self.superblock.max_file_size() {
            return Err(Error::FileTooLarge);
        }
        let data = length.div_ceil(self.superblock.block_size as u64);
        let indirect = u64::from(data > DIRECT_BLOCKS as u64);
        Ok((data + indirect) as u32)
    }

    /// Count of blocks currently referenced by `inode`, indirect block included
    pub fn blocks_held(&mut self, inode: &Inode) -> Result<u32, Error> {
        let mut held = inode
            .direct_blocks
            .iter()
            .filter(|&&id| id != NULL_ID)
            .count() as u32;
        if let Some(indirect) = inode.indirect_block() {
            let pointers = self.read_block(indirect)?;
            held += 1 + (0..pointers.pointer_count())
                .filter(|&slot| pointers.pointer(slot) != NULL_ID)
                .count() as u32;
        }
        Ok(held)
    }

    /// Read whole content of a regular file
    pub fn read_file_data(&mut self, index: u32) -> Result<Vec<u8>, Error> {
        let inode = self.read_inode(index)?;
        if inode.is_directory() {
            return Err(Error::IsADirectory);
        }
        let size = inode.file_size as usize;
        let mut data = Vec::with_capacity(size);
        for id in inode.direct_blocks {
            if data.len() >= size {
                break;
            }
            if id != NULL_ID {
                data.extend_from_slice(&self.read_block(id)?.data);
            }
        }
        if let Some(indirect) = inode.indirect_block() {
            if data.len() < size {
                let pointers = self.read_block(indirect)?;
                for slot in 0..pointers.pointer_count() {
                    if data.len() >= size {
                        break;
                    }
                    let id = pointers.pointer(slot);
                    if id != NULL_ID {
                        data.extend_from_slice(&self.read_block(id)?.data);
                    }
                }
            }
        }
        data.truncate(size);
        debug!("Read {} bytes from inode {index}", data.len());
        Ok(data)
    }

    /// Replace content of a regular file, returning the count of bytes written.
    /// Blocks not needed by the new content are released
    pub fn write_file_data(&mut self, index: u32, bytes: &[u8]) -> Result<usize, Error> {
        let mut inode = self.read_inode(index)?;
        if inode.is_directory() {
            return Err(Error::IsADirectory);
        }
        if bytes.len() as u64 > self.superblock.max_file_size() {
            return Err(Error::FileTooLarge);
        }
        let outcome = self.store_chunks(&mut inode, bytes);
        // Blocks acquired before a failure stay referenced so deletion reclaims them
        inode.file_size = if outcome.is_ok() { bytes.len() as u32 } else { 0 };
        self.write_inode(index, &inode)?;
        outcome?;
        debug!("Wrote {} bytes to inode {index}", bytes.len());
        Ok(bytes.len())
    }

    fn store_chunks(&mut self, inode: &mut Inode, bytes: &[u8]) -> Result<(), Error> {
        let block_size = self.superblock.block_size;
        let mut chunks = bytes.chunks(block_size as usize);
        for slot in 0..DIRECT_BLOCKS {
            let id = inode.direct_blocks[slot];
            match chunks.next() {
                Some(chunk) => {
                    let id = if id == NULL_ID {
                        let id = self.acquire_block()?;
                        inode.direct_blocks[slot] = id;
                        id
                    } else {
                        id
                    };
                    self.store_chunk(id, chunk)?;
                }
                None if id != NULL_ID => {
                    self.free_block(id)?;
                    inode.direct_blocks[slot] = NULL_ID;
                }
                None => {}
            }
        }

        let remaining = chunks.len();
        match inode.indirect_block() {
            None if remaining == 0 => Ok(()),
            Some(indirect) if remaining == 0 => {
                let pointers = self.read_block(indirect)?;
                self.release_pointers(&pointers)?;
                self.free_block(indirect)?;
                inode.indirect_block = NULL_ID;
                Ok(())
            }
            current => {
                let mut pointers = match current {
                    Some(indirect) => self.read_block(indirect)?,
                    None => {
                        let indirect = self.acquire_block()?;
                        inode.indirect_block = indirect;
                        Block::pointers(indirect, block_size)
                    }
                };
                let outcome = self.store_indirect(&mut pointers, &mut chunks);
                self.write_block(&pointers)?;
                outcome
            }
        }
    }

    fn store_indirect<'a>(
        &mut self,
        pointers: &mut Block,
        chunks: &mut impl Iterator<Item = &'a [u8]>,
    ) -> Result<(), Error> {
        for slot in 0..pointers.pointer_count() {
            let id = pointers.pointer(slot);
            match chunks.next() {
                Some(chunk) => {
                    let id = if id == NULL_ID {
                        let id = self.acquire_block()?;
                        pointers.set_pointer(slot, id);
                        id
                    } else {
                        id
                    };
                    self.store_chunk(id, chunk)?;
                }
                None if id != NULL_ID => {
                    self.free_block(id)?;
                    pointers.set_pointer(slot, NULL_ID);
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Write `chunk` zero-padded to a full block
    fn store_chunk(&mut self, id: u32, chunk: &[u8]) -> Result<(), Error> {
        let mut block = Block::new(id, self.superblock.block_size);
        block.fill(chunk);
        self.write_block(&block)
    }

    fn release_pointers(&mut self, pointers: &Block) -> Result<(), Error> {
        for slot in 0..pointers.pointer_count() {
            let id = pointers.pointer(slot);
            if id != NULL_ID {
                self.free_block(id)?;
            }
        }
        Ok(())
    }

    /// Release every block referenced by `inode`, directly or through its indirect block
    pub fn release_blocks(&mut self, inode: &mut Inode) -> Result<(), Error> {
        for slot in 0..DIRECT_BLOCKS {
            let id = inode.direct_blocks[slot];
            if id != NULL_ID {
                self.free_block(id)?;
                inode.direct_blocks[slot] = NULL_ID;
            }
        }
        if let Some(indirect) = inode.indirect_block() {
            let pointers = self.read_block(indirect)?;
            self.release_pointers(&pointers)?;
            self.free_block(indirect)?;
            inode.indirect_block = NULL_ID;
        }
        inode.file_size = 0;
        Ok(())
    }
}
