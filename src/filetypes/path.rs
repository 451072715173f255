use log::{debug, info};

use super::directory::validate_name;
use crate::error::{AllocationError, DirectoryError, Error, PathError};
use crate::filesystem::Filesystem;
use crate::structs::ROOT_INODE;

/// Split a path into its parent path and final component.
/// Returns `None` for the root and for paths without components
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_end_matches('/');
    let (parent, name) = match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    };
    if name.is_empty() {
        return None;
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent, name))
}

impl Filesystem {
    /// Resolve an absolute path to its inode, starting from the root
    pub fn resolve(&mut self, path: &str) -> Result<Option<u32>, Error> {
        let mut current = ROOT_INODE;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !self.is_directory(current)? {
                return Ok(None);
            }
            match self.find_in_directory(current, component)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn path_exists(&mut self, path: &str) -> Result<bool, Error> {
        Ok(self.resolve(path)?.is_some())
    }

    /// Resolve the directory that will hold the last component of `path`
    fn parent_of<'a>(&mut self, path: &'a str) -> Result<(u32, &'a str), Error> {
        let (parent, name) = split_path(path).ok_or(Error::InvalidName)?;
        let parent = self.resolve(parent)?.ok_or(PathError::NotFound)?;
        if !self.is_directory(parent)? {
            return Err(PathError::NotADirectory.into());
        }
        Ok((parent, name))
    }

    /// Create a file or directory at `path`
    pub fn create_path(&mut self, path: &str, is_directory: bool) -> Result<u32, Error> {
        let (parent, name) = self.parent_of(path)?;
        validate_name(name)?;
        if self.find_in_directory(parent, name)?.is_some() {
            return Err(PathError::AlreadyExists.into());
        }
        self.create(parent, name, is_directory)
    }

    /// Delete a file or an empty directory
    pub fn delete(&mut self, path: &str) -> Result<(), Error> {
        let index = self.resolve(path)?.ok_or(PathError::NotFound)?;
        let (parent, name) = split_path(path).ok_or(Error::InvalidName)?;
        if index == ROOT_INODE || name == "." || name == ".." {
            return Err(Error::InvalidName);
        }
        let mut inode = self.read_inode(index)?;
        if inode.is_directory() && !self.is_empty(index)? {
            return Err(DirectoryError::NotEmpty.into());
        }
        let parent = self.resolve(parent)?.ok_or(PathError::NotFound)?;
        if !self.remove_entry(parent, name)? {
            return Err(PathError::NotFound.into());
        }
        self.release_inode(&mut inode)?;
        info!("Deleted {path} (inode {index})");
        Ok(())
    }

    /// Move the entry at `source` to `destination`.
    /// An existing directory as destination receives the entry under its current name
    pub fn rename(&mut self, source: &str, destination: &str) -> Result<(), Error> {
        let index = self.resolve(source)?.ok_or(PathError::NotFound)?;
        let (source_parent, source_name) = split_path(source).ok_or(Error::InvalidName)?;
        if index == ROOT_INODE || source_name == "." || source_name == ".." {
            return Err(Error::InvalidName);
        }
        let source_parent = self.resolve(source_parent)?.ok_or(PathError::NotFound)?;
        let (target_parent, target_name) = match self.resolve(destination)? {
            Some(existing) if self.is_directory(existing)? => (existing, source_name),
            Some(_) => return Err(PathError::AlreadyExists.into()),
            None => self.parent_of(destination)?,
        };
        if (target_parent, target_name) == (source_parent, source_name) {
            return Ok(());
        }
        let is_directory = self.is_directory(index)?;
        if is_directory && self.is_within(target_parent, index)? {
            return Err(Error::InvalidName);
        }
        self.add_entry(target_parent, target_name, index)?;
        self.remove_entry(source_parent, source_name)?;
        if is_directory && target_parent != source_parent {
            self.relink_entry(index, "..", target_parent)?;
        }
        debug!("Moved inode {index} from {source} to {destination}");
        Ok(())
    }

    /// True when `dir` is `ancestor` or lies somewhere below it
    fn is_within(&mut self, dir: u32, ancestor: u32) -> Result<bool, Error> {
        let mut current = dir;
        loop {
            if current == ancestor {
                return Ok(true);
            }
            if current == ROOT_INODE {
                return Ok(false);
            }
            current = self.find_in_directory(current, "..")?.unwrap_or(ROOT_INODE);
        }
    }

    /// Content of the regular file at `path`
    pub fn read_path(&mut self, path: &str) -> Result<Vec<u8>, Error> {
        let index = self.resolve(path)?.ok_or(PathError::NotFound)?;
        self.read_file_data(index)
    }

    /// Replace the content of the file at `path`, creating it when missing.
    /// Capacity and free space are checked before anything is allocated
    pub fn write_path(&mut self, path: &str, bytes: &[u8]) -> Result<u32, Error> {
        let required = self.blocks_required(bytes.len() as u64)?;
        let index = match self.resolve(path)? {
            Some(index) => {
                let inode = self.read_inode(index)?;
                if inode.is_directory() {
                    return Err(Error::IsADirectory);
                }
                let held = self.blocks_held(&inode)?;
                if required > self.free_block_count() + held {
                    return Err(AllocationError::NoFreeBlock.into());
                }
                index
            }
            None => {
                if required > self.free_block_count() {
                    return Err(AllocationError::NoFreeBlock.into());
                }
                self.create_path(path, false)?
            }
        };
        self.write_file_data(index, bytes)?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::tests::mounted;

    #[test]
    fn split() {
        assert_eq!(split_path("/a/b/c"), Some(("/a/b", "c")));
        assert_eq!(split_path("/a"), Some(("/", "a")));
        assert_eq!(split_path("/a/"), Some(("/", "a")));
        assert_eq!(split_path("a"), Some(("/", "a")));
        assert_eq!(split_path("/"), None);
        assert_eq!(split_path(""), None);
    }

    #[test]
    fn resolve_nested() {
        let mut fs = mounted(1);
        assert_eq!(fs.resolve("/").unwrap(), Some(ROOT_INODE));
        let a = fs.create_path("/a", true).unwrap();
        let b = fs.create_path("/a/b", true).unwrap();
        let f = fs.create_path("/a/b/f", false).unwrap();
        assert_eq!(fs.resolve("/a").unwrap(), Some(a));
        assert_eq!(fs.resolve("/a/b/f").unwrap(), Some(f));
        assert_eq!(fs.resolve("//a//b/").unwrap(), Some(b));
        assert_eq!(fs.resolve("/a/b/..").unwrap(), Some(a));
        assert_eq!(fs.resolve("/a/./b/../..").unwrap(), Some(ROOT_INODE));
        assert_eq!(fs.resolve("/..").unwrap(), Some(ROOT_INODE));
        assert_eq!(fs.resolve("/a/missing").unwrap(), None);
        assert_eq!(fs.resolve("/a/b/f/x").unwrap(), None);
        assert!(fs.path_exists("/a/b").unwrap());
        assert!(!fs.path_exists("/b").unwrap());
    }

    #[test]
    fn create_path_errors() {
        let mut fs = mounted(1);
        fs.create_path("/f", false).unwrap();
        assert!(matches!(
            fs.create_path("/f", true),
            Err(Error::Path(PathError::AlreadyExists))
        ));
        assert!(matches!(
            fs.create_path("/missing/x", true),
            Err(Error::Path(PathError::NotFound))
        ));
        assert!(matches!(
            fs.create_path("/f/x", true),
            Err(Error::Path(PathError::NotADirectory))
        ));
        assert!(matches!(fs.create_path("/", true), Err(Error::InvalidName)));
    }

    #[test]
    fn non_empty_directory_guard() {
        let mut fs = mounted(1);
        fs.create_path("/d", true).unwrap();
        let f = fs.create_path("/d/f", false).unwrap();
        let free = (fs.free_inode_count(), fs.free_block_count());
        assert!(matches!(
            fs.delete("/d"),
            Err(Error::Directory(DirectoryError::NotEmpty))
        ));
        assert_eq!(fs.resolve("/d/f").unwrap(), Some(f));
        assert_eq!((fs.free_inode_count(), fs.free_block_count()), free);
        fs.delete("/d/f").unwrap();
        fs.delete("/d").unwrap();
        assert!(!fs.path_exists("/d").unwrap());
    }

    #[test]
    fn delete_reclaims_everything() {
        let mut fs = mounted(1);
        let free = (fs.free_inode_count(), fs.free_block_count());
        fs.create_path("/dir", true).unwrap();
        fs.write_path("/dir/big", &vec![7u8; 7 * 4096 + 5]).unwrap();
        assert_eq!(fs.free_block_count(), free.1 - 1 - 9);
        fs.delete("/dir/big").unwrap();
        fs.delete("/dir").unwrap();
        assert_eq!((fs.free_inode_count(), fs.free_block_count()), free);
        assert!(fs.is_empty(ROOT_INODE).unwrap());
    }

    #[test]
    fn delete_refuses_special_paths() {
        let mut fs = mounted(1);
        fs.create_path("/d", true).unwrap();
        assert!(matches!(fs.delete("/"), Err(Error::InvalidName)));
        assert!(matches!(fs.delete("/d/."), Err(Error::InvalidName)));
        assert!(matches!(fs.delete("/d/.."), Err(Error::InvalidName)));
        assert!(matches!(
            fs.delete("/nothing"),
            Err(Error::Path(PathError::NotFound))
        ));
    }

    #[test]
    fn deleted_inode_is_reused() {
        let mut fs = mounted(1);
        let a = fs.create_path("/a", false).unwrap();
        fs.create_path("/b", false).unwrap();
        fs.delete("/a").unwrap();
        assert_eq!(fs.create_path("/c", false).unwrap(), a);
        let inode = fs.read_inode(a).unwrap();
        assert_eq!(inode.file_size(), 0);
        assert_eq!(inode.indirect_block(), None);
    }

    #[test]
    fn rename_file_and_directory() {
        let mut fs = mounted(1);
        fs.create_path("/a", true).unwrap();
        let b = fs.create_path("/b", true).unwrap();
        let f = fs.write_path("/a/f", b"data").unwrap();

        fs.rename("/a/f", "/b").unwrap();
        assert_eq!(fs.resolve("/b/f").unwrap(), Some(f));
        assert!(!fs.path_exists("/a/f").unwrap());

        fs.rename("/b/f", "/b/g").unwrap();
        assert_eq!(fs.read_path("/b/g").unwrap(), b"data");

        fs.rename("/b", "/a/c").unwrap();
        assert_eq!(fs.resolve("/a/c/g").unwrap(), Some(f));
        assert_eq!(fs.resolve("/a/c/..").unwrap(), fs.resolve("/a").unwrap());
        assert_eq!(fs.resolve("/a/c").unwrap(), Some(b));
    }

    #[test]
    fn rename_errors() {
        let mut fs = mounted(1);
        fs.create_path("/a", true).unwrap();
        fs.create_path("/a/sub", true).unwrap();
        fs.create_path("/f", false).unwrap();
        fs.create_path("/g", false).unwrap();
        assert!(matches!(fs.rename("/a", "/a/sub"), Err(Error::InvalidName)));
        assert!(matches!(
            fs.rename("/f", "/g"),
            Err(Error::Path(PathError::AlreadyExists))
        ));
        assert!(matches!(
            fs.rename("/x", "/y"),
            Err(Error::Path(PathError::NotFound))
        ));
        assert!(matches!(
            fs.rename("/f", "/missing/f"),
            Err(Error::Path(PathError::NotFound))
        ));
    }

    #[test]
    fn write_path_checks_space() {
        let mut fs = mounted(1);
        let free = fs.free_block_count();
        let too_much = vec![0u8; (free as usize + 1) * 4096];
        assert!(matches!(
            fs.write_path("/big", &too_much),
            Err(Error::Allocation(AllocationError::NoFreeBlock))
        ));
        assert!(!fs.path_exists("/big").unwrap());
        assert_eq!(fs.free_block_count(), free);

        let fits = vec![1u8; 10 * 4096];
        fs.write_path("/big", &fits).unwrap();
        fs.write_path("/big", &fits).unwrap();
        assert_eq!(fs.read_path("/big").unwrap(), fits);
        assert!(matches!(fs.write_path("/", b"x"), Err(Error::IsADirectory)));
    }

    #[test]
    fn state_survives_remount() {
        let mut fs = mounted(1);
        fs.create_path("/docs", true).unwrap();
        fs.write_path("/docs/note", b"persisted").unwrap();
        let mut fs = Filesystem::mount_device(fs.unmount()).unwrap();
        assert_eq!(fs.read_path("/docs/note").unwrap(), b"persisted");
        assert_eq!(fs.allocate_inode(), Some(3));
    }
}
