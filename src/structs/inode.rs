use std::fmt::Display;

use super::*;

impl AsBitmap for Inode {}

impl Inode {
    /// Fresh inode with no blocks referenced
    pub fn new(id: u32, directory: bool) -> Self {
        Self {
            id,
            file_size: 0,
            direct_blocks: [NULL_ID; DIRECT_BLOCKS],
            indirect_block: NULL_ID,
            link_count: 1,
            directory: directory as u8,
            __padding_1: Default::default(),
        }
    }

    /// Record of a released inode
    pub fn released(id: u32) -> Self {
        Self {
            link_count: 0,
            ..Self::new(id, false)
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn file_size(&self) -> u32 {
        self.file_size
    }

    pub fn is_directory(&self) -> bool {
        self.directory != 0
    }

    pub fn direct_blocks(&self) -> [u32; DIRECT_BLOCKS] {
        self.direct_blocks
    }

    pub fn indirect_block(&self) -> Option<u32> {
        (self.indirect_block != NULL_ID).then_some(self.indirect_block)
    }

    /// Block holding a directory's entries
    pub fn directory_block(&self) -> Option<u32> {
        (self.direct_blocks[0] != NULL_ID).then_some(self.direct_blocks[0])
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..INODE_SIZE])
    }
}

fn pointer(id: u32) -> String {
    if id == NULL_ID {
        "-".to_owned()
    } else {
        id.to_string()
    }
}

impl Display for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_directory() { "directory" } else { "file" };
        let direct = self
            .direct_blocks
            .iter()
            .map(|&id| pointer(id))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "inode {} ({kind}): {} bytes, {} link(s), direct [{direct}], indirect {}",
            self.id,
            self.file_size,
            self.link_count,
            pointer(self.indirect_block)
        )
    }
}
