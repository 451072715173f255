use log::{debug, warn};

use crate::error::{DirectoryError, Error, PathError};
use crate::filesystem::Filesystem;
use crate::structs::*;

/// Reject names that cannot be stored in a directory entry
pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > NAME_LENGTH || name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidName);
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidName);
    }
    Ok(())
}

impl Filesystem {
    /// Load inode `index`, failing unless it is a directory
    fn directory_inode(&mut self, index: u32) -> Result<Inode, Error> {
        let inode = self.read_inode(index)?;
        if !inode.is_directory() {
            return Err(PathError::NotADirectory.into());
        }
        Ok(inode)
    }

    /// Entries block of `dir`, if it has one
    fn entries_block(&mut self, dir: &Inode) -> Result<Option<Block>, Error> {
        dir.directory_block()
            .map(|id| self.read_block(id))
            .transpose()
    }

    pub fn is_directory(&mut self, index: u32) -> Result<bool, Error> {
        Ok(self.read_inode(index)?.is_directory())
    }

    /// Look up `name` among the entries of directory `parent`
    pub fn find_in_directory(&mut self, parent: u32, name: &str) -> Result<Option<u32>, Error> {
        let dir = self.directory_inode(parent)?;
        let Some(block) = self.entries_block(&dir)? else {
            return Ok(None);
        };
        let found = block.entries().find(|entry| entry.matches(name));
        Ok(found.map(|entry| entry.inode))
    }

    /// Insert an entry into the first empty slot of directory `parent`
    pub fn add_entry(&mut self, parent: u32, name: &str, child: u32) -> Result<(), Error> {
        validate_name(name)?;
        let mut dir = self.directory_inode(parent)?;
        let mut block = match self.entries_block(&dir)? {
            Some(block) => block,
            None => {
                let id = self.acquire_block()?;
                debug!("Directory {parent} gets entries block {id}");
                let block = Block::directory(id, self.superblock.block_size);
                self.write_block(&block)?;
                dir.direct_blocks[0] = id;
                self.write_inode(parent, &dir)?;
                block
            }
        };
        let mut free_slot = None;
        for (slot, entry) in block.entries().enumerate() {
            if entry.matches(name) {
                return Err(PathError::AlreadyExists.into());
            }
            if entry.is_empty() && free_slot.is_none() {
                free_slot = Some(slot);
            }
        }
        let slot = free_slot.ok_or(DirectoryError::Full)?;
        block.set_entry(slot, &DirectoryEntry::new(name, child));
        self.write_block(&block)?;
        debug!("Linked {name:?} -> inode {child} in directory {parent}");
        Ok(())
    }

    /// Clear the slot holding `name`, returning whether one was found
    pub fn remove_entry(&mut self, parent: u32, name: &str) -> Result<bool, Error> {
        let dir = self.directory_inode(parent)?;
        let Some(mut block) = self.entries_block(&dir)? else {
            return Ok(false);
        };
        let Some(slot) = block.entries().position(|entry| entry.matches(name)) else {
            return Ok(false);
        };
        block.set_entry(slot, &DirectoryEntry::empty());
        self.write_block(&block)?;
        debug!("Unlinked {name:?} from directory {parent}");
        Ok(true)
    }

    /// Point the existing entry `name` of `parent` at `child`
    pub(crate) fn relink_entry(&mut self, parent: u32, name: &str, child: u32) -> Result<bool, Error> {
        let dir = self.directory_inode(parent)?;
        let Some(mut block) = self.entries_block(&dir)? else {
            return Ok(false);
        };
        let Some(slot) = block.entries().position(|entry| entry.matches(name)) else {
            return Ok(false);
        };
        block.set_entry(slot, &DirectoryEntry::new(name, child));
        self.write_block(&block)?;
        Ok(true)
    }

    /// True when the directory holds nothing but `.` and `..`
    pub fn is_empty(&mut self, dir: u32) -> Result<bool, Error> {
        let dir = self.directory_inode(dir)?;
        let Some(block) = self.entries_block(&dir)? else {
            return Ok(true);
        };
        let empty = block
            .entries()
            .all(|entry| entry.is_empty() || entry.is_link());
        Ok(empty)
    }

    /// Occupied slots of a directory in slot order
    pub fn list_directory(&mut self, dir: u32) -> Result<Vec<DirectoryListing>, Error> {
        let inode = self.directory_inode(dir)?;
        let Some(block) = self.entries_block(&inode)? else {
            return Ok(Vec::new());
        };
        let mut listing = Vec::new();
        for entry in block.entries().filter(|entry| !entry.is_empty()) {
            listing.push(DirectoryListing {
                name: entry.name(),
                inode: entry.inode,
                is_directory: self.is_directory(entry.inode)?,
            });
        }
        Ok(listing)
    }

    /// Create a file or directory named `name` inside directory `parent`
    pub fn create(&mut self, parent: u32, name: &str, is_directory: bool) -> Result<u32, Error> {
        validate_name(name)?;
        self.directory_inode(parent)?;
        let index = self.acquire_inode()?;
        let mut inode = Inode::new(index, is_directory);
        if is_directory {
            let id = match self.acquire_block() {
                Ok(id) => id,
                Err(e) => {
                    self.free_inode(index)?;
                    return Err(e);
                }
            };
            let mut block = Block::directory(id, self.superblock.block_size);
            block.set_entry(0, &DirectoryEntry::new(".", index));
            block.set_entry(1, &DirectoryEntry::new("..", parent));
            inode.direct_blocks[0] = id;
            self.write_block(&block)?;
        }
        self.write_inode(index, &inode)?;
        if let Err(e) = self.add_entry(parent, name, index) {
            warn!("Rolling back inode {index}: {e}");
            self.release_inode(&mut inode)?;
            return Err(e);
        }
        debug!("Created {name:?} as inode {index} in directory {parent}");
        Ok(index)
    }

    /// Release all blocks of `inode`, then the inode itself
    pub(crate) fn release_inode(&mut self, inode: &mut Inode) -> Result<(), Error> {
        let index = inode.id;
        self.release_blocks(inode)?;
        self.write_inode(index, &Inode::released(index))?;
        self.free_inode(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AllocationError;
    use crate::filesystem::tests::mounted;

    #[test]
    fn entry_symmetry() {
        let mut fs = mounted(1);
        let child = fs.allocate_inode().unwrap();
        fs.write_inode(child, &Inode::new(child, false)).unwrap();
        fs.add_entry(ROOT_INODE, "x", child).unwrap();
        assert_eq!(fs.find_in_directory(ROOT_INODE, "x").unwrap(), Some(child));
        assert!(fs.remove_entry(ROOT_INODE, "x").unwrap());
        assert_eq!(fs.find_in_directory(ROOT_INODE, "x").unwrap(), None);
        assert!(!fs.remove_entry(ROOT_INODE, "x").unwrap());
    }

    #[test]
    fn root_links() {
        let mut fs = mounted(1);
        assert_eq!(fs.find_in_directory(ROOT_INODE, ".").unwrap(), Some(ROOT_INODE));
        assert_eq!(fs.find_in_directory(ROOT_INODE, "..").unwrap(), Some(ROOT_INODE));
        assert!(fs.is_empty(ROOT_INODE).unwrap());
    }

    #[test]
    fn names_are_validated() {
        let mut fs = mounted(1);
        for name in ["", ".", "..", "a/b", "thirteen_char"] {
            assert!(matches!(fs.create(ROOT_INODE, name, false), Err(Error::InvalidName)));
        }
        assert!(fs.create(ROOT_INODE, "twelve_chars", false).is_ok());
        assert!(fs.find_in_directory(ROOT_INODE, "twelve_chars").unwrap().is_some());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut fs = mounted(1);
        let free = (fs.free_inode_count(), fs.free_block_count());
        fs.create(ROOT_INODE, "a", true).unwrap();
        assert!(matches!(
            fs.create(ROOT_INODE, "a", false),
            Err(Error::Path(PathError::AlreadyExists))
        ));
        assert_eq!(fs.free_inode_count(), free.0 - 1);
        assert_eq!(fs.free_block_count(), free.1 - 1);
    }

    #[test]
    fn new_directory_links_to_parent() {
        let mut fs = mounted(1);
        let a = fs.create(ROOT_INODE, "a", true).unwrap();
        let b = fs.create(a, "b", true).unwrap();
        assert_eq!(fs.find_in_directory(b, ".").unwrap(), Some(b));
        assert_eq!(fs.find_in_directory(b, "..").unwrap(), Some(a));
        assert!(fs.is_empty(b).unwrap());
        assert!(!fs.is_empty(a).unwrap());
    }

    #[test]
    fn files_are_not_directories() {
        let mut fs = mounted(1);
        let f = fs.create(ROOT_INODE, "f", false).unwrap();
        assert!(!fs.is_directory(f).unwrap());
        assert!(matches!(
            fs.find_in_directory(f, "x"),
            Err(Error::Path(PathError::NotADirectory))
        ));
        assert!(matches!(
            fs.create(f, "x", false),
            Err(Error::Path(PathError::NotADirectory))
        ));
    }

    #[test]
    fn lazy_entries_block() {
        let mut fs = mounted(1);
        let dir = fs.allocate_inode().unwrap();
        fs.write_inode(dir, &Inode::new(dir, true)).unwrap();
        assert!(fs.is_empty(dir).unwrap());
        assert!(fs.list_directory(dir).unwrap().is_empty());
        let free = fs.free_block_count();
        fs.add_entry(dir, "x", ROOT_INODE).unwrap();
        assert_eq!(fs.free_block_count(), free - 1);
        assert!(fs.read_inode(dir).unwrap().directory_block().is_some());
        assert_eq!(fs.find_in_directory(dir, "x").unwrap(), Some(ROOT_INODE));
    }

    #[test]
    fn full_directory_rolls_back() {
        let mut fs = mounted(10);
        let slots = fs.superblock().entries_per_block();
        // `.` and `..` occupy two slots of the root
        for n in 0..slots - 2 {
            let index = fs.allocate_inode().unwrap();
            fs.add_entry(ROOT_INODE, &format!("f{n}"), index).unwrap();
        }
        let free = (fs.free_inode_count(), fs.free_block_count());
        assert!(matches!(
            fs.create(ROOT_INODE, "extra", true),
            Err(Error::Directory(DirectoryError::Full))
        ));
        assert_eq!((fs.free_inode_count(), fs.free_block_count()), free);
    }

    #[test]
    fn inode_exhaustion_on_create() {
        let mut fs = mounted(1);
        while fs.allocate_inode().is_some() {}
        assert!(matches!(
            fs.create(ROOT_INODE, "x", false),
            Err(Error::Allocation(AllocationError::NoFreeInode))
        ));
        assert_eq!(fs.find_in_directory(ROOT_INODE, "x").unwrap(), None);
    }

    #[test]
    fn listing_reports_kinds() {
        let mut fs = mounted(1);
        fs.create(ROOT_INODE, "dir", true).unwrap();
        fs.create(ROOT_INODE, "file", false).unwrap();
        let listing = fs.list_directory(ROOT_INODE).unwrap();
        let names: Vec<_> = listing.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, [".", "..", "dir", "file"]);
        assert!(listing[2].is_directory);
        assert!(!listing[3].is_directory);
    }
}
