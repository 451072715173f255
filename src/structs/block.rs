use std::fmt::Display;

use super::*;

impl AsBitmap for Block {}

impl Block {
    /// Zero-initialized block
    pub fn new(index: u32, block_size: u32) -> Self {
        Self {
            index,
            data: vec![0; block_size as usize],
        }
    }

    /// Indirect block with every slot set to [`NULL_ID`]
    pub fn pointers(index: u32, block_size: u32) -> Self {
        Self {
            index,
            data: vec![0xff; block_size as usize],
        }
    }

    /// Directory block with every slot empty
    pub fn directory(index: u32, block_size: u32) -> Self {
        let mut block = Self::new(index, block_size);
        let empty = DirectoryEntry::empty();
        for slot in 0..block.data.len() / ENTRY_SIZE {
            block.set_entry(slot, &empty);
        }
        block
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy `data` to the start of the block and zero the rest,
    /// returning the bytes exceeding block's capacity
    pub fn fill<'a>(&mut self, data: &'a [u8]) -> &'a [u8] {
        let length = data.len().min(self.data.len());
        self.data[..length].copy_from_slice(&data[..length]);
        self.data[length..].fill(0);
        &data[length..]
    }

    /// Read the block id stored in slot `slot` of an indirect block
    pub fn pointer(&self, slot: usize) -> u32 {
        let start = slot * BLOCK_ID_SIZE;
        bytemuck::pod_read_unaligned(&self.data[start..start + BLOCK_ID_SIZE])
    }

    pub fn set_pointer(&mut self, slot: usize, id: u32) {
        let start = slot * BLOCK_ID_SIZE;
        self.data[start..start + BLOCK_ID_SIZE].copy_from_slice(bytemuck::bytes_of(&id));
    }

    pub fn pointer_count(&self) -> usize {
        self.data.len() / BLOCK_ID_SIZE
    }

    pub fn entry(&self, slot: usize) -> DirectoryEntry {
        let start = slot * ENTRY_SIZE;
        bytemuck::pod_read_unaligned(&self.data[start..start + ENTRY_SIZE])
    }

    pub fn set_entry(&mut self, slot: usize, entry: &DirectoryEntry) {
        let start = slot * ENTRY_SIZE;
        self.data[start..start + ENTRY_SIZE].copy_from_slice(bytemuck::bytes_of(entry));
    }

    pub fn entries(&self) -> impl Iterator<Item = DirectoryEntry> + '_ {
        self.data
            .chunks_exact(ENTRY_SIZE)
            .map(bytemuck::pod_read_unaligned::<DirectoryEntry>)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "block {}", self.index)?;
        for (row, chunk) in self.data.chunks(16).enumerate() {
            if chunk.iter().all(|&b| b == 0) {
                continue;
            }
            write!(f, "{:08x}:", row * 16)?;
            for byte in chunk {
                write!(f, " {byte:02x}")?;
            }
            let text = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect::<String>();
            writeln!(f, "  {text}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_returns_overflow_and_pads() {
        let mut block = Block::new(1, 8);
        block.data.fill(7);
        let rest = block.fill(b"abc");
        assert!(rest.is_empty());
        assert_eq!(block.data, b"abc\0\0\0\0\0");
        let rest = block.fill(b"0123456789");
        assert_eq!(rest, b"89");
    }

    #[test]
    fn pointers_start_empty() {
        let mut block = Block::pointers(2, 16);
        assert_eq!(block.pointer_count(), 4);
        assert!((0..4).all(|slot| block.pointer(slot) == NULL_ID));
        block.set_pointer(3, 0);
        assert_eq!(block.pointer(3), 0);
    }

    #[test]
    fn directory_slots() {
        let mut block = Block::directory(0, 64);
        assert_eq!(block.entries().count(), 4);
        assert!(block.entries().all(|e| e.is_empty()));
        block.set_entry(2, &DirectoryEntry::new("x", 5));
        assert_eq!(block.entry(2).inode, 5);
    }
}
