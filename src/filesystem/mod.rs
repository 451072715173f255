use std::fmt::Debug;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, error, info, warn};

use crate::error::{Error, MountError};
use crate::structs::*;

mod allocator;
mod format;

pub use format::{format, format_device};

pub trait BlockDevice: Read + Write + Seek + Debug {}

impl BlockDevice for std::fs::File {}

impl BlockDevice for std::io::Cursor<Vec<u8>> {}

/// A mounted container: the device plus the metadata cached for the whole mount
#[derive(Debug)]
pub struct Filesystem {
    pub(crate) superblock: Superblock,
    pub(crate) inodes: Bitmap<Inode>,
    pub(crate) blocks: Bitmap<Block>,
    pub(crate) device: Box<dyn BlockDevice>,
}

/// Read as many bytes as the device has, returning the count
fn read_available(device: &mut dyn BlockDevice, buffer: &mut [u8]) -> Result<usize, Error> {
    let mut total = 0;
    while total < buffer.len() {
        match device.read(&mut buffer[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

/// Read a whole bitmap region, failing the mount when it is cut short
fn read_region(device: &mut dyn BlockDevice, position: u32, size: u32) -> Result<Vec<u8>, Error> {
    device.seek(SeekFrom::Start(position as u64))?;
    let mut raw = vec![0u8; size as usize];
    if read_available(device, &mut raw)? < raw.len() {
        warn!("Short bitmap read at {position}");
        return Err(MountError::TruncatedBitmap.into());
    }
    Ok(raw)
}

impl Filesystem {
    /// Open an existing container file and load its metadata
    pub fn mount(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::options()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                warn!("Cannot open container {}: {e}", path.display());
                MountError::NotFound
            })?;
        info!("Mounting container {}", path.display());
        Self::mount_device(Box::new(file))
    }

    /// Load filesystem from a block device
    pub fn mount_device(mut device: Box<dyn BlockDevice>) -> Result<Self, Error> {
        device.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        if read_available(device.as_mut(), &mut raw)? < SUPERBLOCK_SIZE {
            warn!("Short superblock read");
            return Err(MountError::CorruptSuperblock.into());
        }
        let superblock = Superblock::from_bytes(&raw);
        if superblock.magic != MAGIC_SIGNATURE {
            warn!("Invalid magic {:#010x}", superblock.magic);
            return Err(MountError::BadMagic.into());
        }
        if superblock.version != FORMAT_VERSION {
            warn!("Unsupported version {}", superblock.version);
            return Err(MountError::UnsupportedVersion.into());
        }
        if !superblock.is_consistent() {
            warn!("Superblock regions are out of order");
            return Err(MountError::CorruptSuperblock.into());
        }

        let mut inodes = Bitmap::<Inode>::new(&superblock);
        let mut blocks = Bitmap::<Block>::new(&superblock);
        inodes.load_bytes(&read_region(
            device.as_mut(),
            superblock.inode_bitmap_offset,
            superblock.inode_bitmap_size,
        )?);
        blocks.load_bytes(&read_region(
            device.as_mut(),
            superblock.block_bitmap_offset,
            superblock.block_bitmap_size,
        )?);

        let mut fs = Self {
            superblock,
            inodes,
            blocks,
            device,
        };
        fs.metadata_init();
        info!(
            "Mounted filesystem with {} inodes and {} blocks",
            fs.superblock.total_inodes, fs.superblock.total_blocks
        );
        Ok(fs)
    }

    /// Write superblock and dirty bitmaps back to the device.
    /// Every region is attempted; the last failure is returned
    pub fn sync(&mut self) -> Result<(), Error> {
        debug!("Syncing filesystem metadata");
        let mut result = Ok(());
        let superblock = self.superblock;
        if let Err(e) = self.write_bytes(0, superblock.as_bytes()) {
            error!("Failed to write superblock: {e}");
            result = Err(e);
        }
        if self.inodes.dirty {
            let (position, bytes) = (self.inodes.position, self.inodes.bitfield.clone());
            match self.write_bytes(position, &bytes) {
                Ok(()) => self.inodes.dirty = false,
                Err(e) => {
                    error!("Failed to write inode bitmap: {e}");
                    result = Err(e);
                }
            }
        }
        if self.blocks.dirty {
            let (position, bytes) = (self.blocks.position, self.blocks.bitfield.clone());
            match self.write_bytes(position, &bytes) {
                Ok(()) => self.blocks.dirty = false,
                Err(e) => {
                    error!("Failed to write block bitmap: {e}");
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Sync and release the filesystem, handing back its device
    pub fn unmount(mut self) -> Box<dyn BlockDevice> {
        info!("Unmounting filesystem");
        if let Err(e) = self.sync() {
            error!("Metadata may be lost: {e}");
        }
        self.device
    }

    /// Positioned read, zero-filling anything past the end of the container
    pub fn read_bytes(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, Error> {
        let mut buffer = vec![0u8; length];
        self.device.seek(SeekFrom::Start(offset))?;
        let read = read_available(self.device.as_mut(), &mut buffer)?;
        if read < length {
            debug!("Zero-filled {} bytes past end at {offset}", length - read);
        }
        Ok(buffer)
    }

    /// Positioned write, flushed immediately
    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        self.device.seek(SeekFrom::Start(offset))?;
        self.device.write_all(bytes)?;
        self.device.flush()?;
        Ok(())
    }

    pub fn mark_inode_bitmap_dirty(&mut self) {
        self.inodes.dirty = true;
    }

    pub fn mark_block_bitmap_dirty(&mut self) {
        self.blocks.dirty = true;
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn inode_bitmap(&self) -> &Bitmap<Inode> {
        &self.inodes
    }

    pub fn block_bitmap(&self) -> &Bitmap<Block> {
        &self.blocks
    }

    /// Load inode with index
    pub fn read_inode(&mut self, index: u32) -> Result<Inode, Error> {
        let position = self.superblock.inode_position(index)?;
        debug!("Load inode {index}");
        let raw = self.read_bytes(position, INODE_SIZE)?;
        Ok(Inode::from_bytes(&raw))
    }

    /// Flush inode to slot `index`
    pub fn write_inode(&mut self, index: u32, inode: &Inode) -> Result<(), Error> {
        let position = self.superblock.inode_position(index)?;
        debug!("Flush inode {index}");
        self.write_bytes(position, inode.as_bytes())
    }

    /// Load block with index
    pub fn read_block(&mut self, index: u32) -> Result<Block, Error> {
        let position = self.superblock.block_position(index)?;
        debug!("Load block {index}");
        let data = self.read_bytes(position, self.superblock.block_size as usize)?;
        Ok(Block { index, data })
    }

    /// Flush block
    pub fn write_block(&mut self, block: &Block) -> Result<(), Error> {
        let position = self.superblock.block_position(block.index)?;
        if block.data.len() != self.superblock.block_size as usize {
            return Err(Error::OutOfBounds);
        }
        debug!("Flush block {}", block.index);
        self.write_bytes(position, &block.data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;

    /// Freshly formatted in-memory filesystem
    pub(crate) fn mounted(size_mb: u32) -> Filesystem {
        let mut dev = Cursor::new(Vec::new());
        format_device(&mut dev, size_mb).unwrap();
        Filesystem::mount_device(Box::new(dev)).unwrap()
    }

    fn remount(fs: Filesystem) -> Filesystem {
        Filesystem::mount_device(fs.unmount()).unwrap()
    }

    #[test]
    fn format_and_mount_round_trip() {
        let fs = mounted(2);
        let sb = fs.superblock;
        assert_eq!(sb.magic, MAGIC_SIGNATURE);
        assert_eq!(sb.block_size, BLOCK_SIZE);
        assert!(sb.inode_bitmap_offset < sb.block_bitmap_offset);
        assert!(sb.block_bitmap_offset < sb.inode_table_offset);
        assert!(sb.inode_table_offset < sb.data_blocks_offset);
        assert!(sb.end() <= 2 * MEBIBYTE);
        assert_eq!(fs.free_inode_count(), sb.total_inodes - 1);
        assert_eq!(fs.free_block_count(), sb.total_blocks - 1);
    }

    #[test]
    fn load_and_flush() {
        let mut fs = mounted(1);
        assert_eq!(fs.allocate_block(), Some(1));
        assert!(fs.sync().is_ok());
        assert!(!fs.blocks.dirty);
        let fs = remount(fs);
        assert!(fs.blocks.get(1).unwrap());
        assert_eq!(fs.superblock.total_blocks - fs.free_block_count(), 2);
    }

    #[test]
    fn unsynced_bitmap_is_not_written() {
        let mut fs = mounted(1);
        fs.allocate_inode();
        // Simulate a lost flush by clearing the flag before unmount
        fs.inodes.dirty = false;
        let fs = remount(fs);
        assert_eq!(fs.free_inode_count(), fs.superblock.total_inodes - 1);
    }

    #[test]
    fn mount_rejects_bad_devices() {
        let short = Cursor::new(vec![0u8; 10]);
        assert!(matches!(
            Filesystem::mount_device(Box::new(short)),
            Err(Error::Mount(MountError::CorruptSuperblock))
        ));
        let zeroed = Cursor::new(vec![0u8; 4096]);
        assert!(matches!(
            Filesystem::mount_device(Box::new(zeroed)),
            Err(Error::Mount(MountError::BadMagic))
        ));

        let mut dev = Cursor::new(Vec::new());
        format_device(&mut dev, 1).unwrap();
        let mut raw = dev.into_inner();
        raw.truncate(SUPERBLOCK_SIZE + 2);
        assert!(matches!(
            Filesystem::mount_device(Box::new(Cursor::new(raw))),
            Err(Error::Mount(MountError::TruncatedBitmap))
        ));
    }

    #[test]
    fn mount_missing_container() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Filesystem::mount(dir.path().join("missing.vfs")),
            Err(Error::Mount(MountError::NotFound))
        ));
        assert!(!dir.path().join("missing.vfs").exists());
    }

    #[test]
    fn read_past_end_zero_fills() {
        let mut fs = mounted(1);
        let end = fs.superblock.end();
        fs.write_bytes(end - 2, &[1, 2]).unwrap();
        assert_eq!(fs.read_bytes(end - 2, 6).unwrap(), vec![1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn inode_and_block_access() {
        let mut fs = mounted(1);
        let root = fs.read_inode(ROOT_INODE).unwrap();
        assert!(root.is_directory());
        assert_eq!(root.directory_block(), Some(ROOT_BLOCK));
        let mut block = Block::new(3, BLOCK_SIZE);
        block.fill(b"hello");
        fs.write_block(&block).unwrap();
        assert_eq!(fs.read_block(3).unwrap(), block);
        let total = fs.superblock.total_inodes;
        assert!(matches!(fs.read_inode(total), Err(Error::OutOfBounds)));
        assert!(matches!(
            fs.write_block(&Block::new(3, 16)),
            Err(Error::OutOfBounds)
        ));
    }
}
