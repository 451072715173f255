use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use crate::error::Error;
use crate::structs::*;

/// Create or overwrite a container file holding an empty filesystem
pub fn format(path: impl AsRef<Path>, size_mb: u32) -> Result<Superblock, Error> {
    let path = path.as_ref();
    let superblock = Superblock::new(size_mb)?;
    info!("Formatting {} as {size_mb} MiB", path.display());
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_layout(&mut writer, &superblock)?;
    writer.flush()?;
    Ok(superblock)
}

/// Write an empty filesystem of `size_mb` mebibytes to the start of `device`
pub fn format_device<D: Write + Seek>(device: &mut D, size_mb: u32) -> Result<Superblock, Error> {
    let superblock = Superblock::new(size_mb)?;
    info!("Formatting device as {size_mb} MiB");
    device.seek(SeekFrom::Start(0))?;
    write_layout(device, &superblock)?;
    device.flush()?;
    Ok(superblock)
}

fn write_layout<D: Write>(device: &mut D, superblock: &Superblock) -> Result<(), Error> {
    debug!("Layout:\n{superblock}");
    device.write_all(superblock.as_bytes())?;

    let mut inode_bitmap = Bitmap::<Inode>::new(superblock);
    inode_bitmap.set(ROOT_INODE, true)?;
    device.write_all(inode_bitmap.as_bytes())?;
    let mut block_bitmap = Bitmap::<Block>::new(superblock);
    block_bitmap.set(ROOT_BLOCK, true)?;
    device.write_all(block_bitmap.as_bytes())?;

    let mut root = Inode::new(ROOT_INODE, true);
    root.direct_blocks[0] = ROOT_BLOCK;
    device.write_all(root.as_bytes())?;
    for index in 1..superblock.total_inodes {
        device.write_all(Inode::released(index).as_bytes())?;
    }

    let mut root_block = Block::directory(ROOT_BLOCK, superblock.block_size);
    root_block.set_entry(0, &DirectoryEntry::new(".", ROOT_INODE));
    root_block.set_entry(1, &DirectoryEntry::new("..", ROOT_INODE));
    device.write_all(&root_block.data)?;
    let zeroes = vec![0u8; superblock.block_size as usize];
    for _ in 1..superblock.total_blocks {
        device.write_all(&zeroes)?;
    }
    info!(
        "Formatted {} blocks and {} inodes",
        superblock.total_blocks, superblock.total_inodes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::FormatError;
    use crate::filesystem::Filesystem;

    #[test]
    fn device_size_matches_layout() {
        let mut dev = Cursor::new(Vec::new());
        let sb = format_device(&mut dev, 1).unwrap();
        assert_eq!(dev.get_ref().len() as u64, sb.end());
        assert!(sb.end() <= MEBIBYTE);
    }

    #[test]
    fn too_small_leaves_device_untouched() {
        let mut dev = Cursor::new(Vec::new());
        assert!(matches!(
            format_device(&mut dev, 0),
            Err(Error::Format(FormatError::TooSmall))
        ));
        assert!(dev.get_ref().is_empty());
    }

    #[test]
    fn root_directory_links_to_itself() {
        let mut dev = Cursor::new(Vec::new());
        format_device(&mut dev, 1).unwrap();
        let mut fs = Filesystem::mount_device(Box::new(dev)).unwrap();
        let block = fs.read_block(ROOT_BLOCK).unwrap();
        let entries: Vec<_> = block.entries().filter(|e| !e.is_empty()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), ".");
        assert_eq!(entries[1].name(), "..");
        assert!(entries.iter().all(|e| e.inode == ROOT_INODE));
        let unused = fs.read_inode(1).unwrap();
        assert_eq!(unused.indirect_block(), None);
    }

    #[test]
    fn format_file_and_mount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fs.vfs");
        let sb = format(&path, 2).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), sb.end());
        let fs = Filesystem::mount(&path).unwrap();
        assert_eq!(*fs.superblock(), sb);
    }
}
