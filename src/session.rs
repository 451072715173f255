use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Error, PathError};
use crate::filesystem::{self, BlockDevice, Filesystem};

/// Nesting limit for scripts loading other scripts
pub const MAX_SCRIPT_DEPTH: usize = 8;

/// Mounted container and working directory of one shell
#[derive(Debug)]
pub struct Session {
    container: PathBuf,
    filesystem: Option<Filesystem>,
    cwd: String,
    pub(crate) script_depth: usize,
}

/// Collapse `.` and `..` components of an absolute path
pub fn normalize(path: &str) -> String {
    let mut components = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }
    format!("/{}", components.join("/"))
}

impl Session {
    pub fn new(container: impl Into<PathBuf>) -> Self {
        Self {
            container: container.into(),
            filesystem: None,
            cwd: "/".to_owned(),
            script_depth: 0,
        }
    }

    /// Session with the container mounted when it holds a valid filesystem
    pub fn open(container: impl Into<PathBuf>) -> Self {
        let mut session = Self::new(container);
        if let Err(e) = session.mount() {
            warn!(
                "Container {} not mounted: {e}",
                session.container.display()
            );
        }
        session
    }

    pub fn container(&self) -> &Path {
        &self.container
    }

    pub fn mount(&mut self) -> Result<(), Error> {
        if self.filesystem.is_some() {
            return Ok(());
        }
        self.filesystem = Some(Filesystem::mount(&self.container)?);
        self.cwd = "/".to_owned();
        Ok(())
    }

    /// Mount an already opened device instead of the container path
    pub fn mount_device(&mut self, device: Box<dyn BlockDevice>) -> Result<(), Error> {
        self.unmount();
        self.filesystem = Some(Filesystem::mount_device(device)?);
        self.cwd = "/".to_owned();
        Ok(())
    }

    /// Sync and close the container, doing nothing when it is not mounted
    pub fn unmount(&mut self) {
        if let Some(fs) = self.filesystem.take() {
            drop(fs.unmount());
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.filesystem.is_some()
    }

    /// Recreate the container with `size_mb` mebibytes and mount it
    pub fn format(&mut self, size_mb: u32) -> Result<(), Error> {
        self.unmount();
        filesystem::format(&self.container, size_mb)?;
        info!("Container {} formatted", self.container.display());
        self.mount()
    }

    pub fn filesystem(&mut self) -> Result<&mut Filesystem, Error> {
        self.filesystem.as_mut().ok_or(Error::NotMounted)
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Absolute form of `path`, relative paths starting at the working directory
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_owned()
        } else if self.cwd == "/" {
            format!("/{path}")
        } else {
            format!("{}/{path}", self.cwd)
        }
    }

    pub fn change_directory(&mut self, path: &str) -> Result<(), Error> {
        let path = self.absolute(path);
        let fs = self.filesystem()?;
        let index = fs.resolve(&path)?.ok_or(PathError::NotFound)?;
        if !fs.is_directory(index)? {
            return Err(PathError::NotADirectory.into());
        }
        self.cwd = normalize(&path);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().join("fs.vfs"));
        session.format(1).unwrap();
        (dir, session)
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/a/./b/"), "/a/b");
        assert_eq!(normalize("/a/b/../c"), "/a/c");
        assert_eq!(normalize("/../.."), "/");
    }

    #[test]
    fn unmounted_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path().join("none.vfs"));
        assert!(!session.is_mounted());
        assert!(matches!(session.filesystem(), Err(Error::NotMounted)));
        session.unmount();
        session.unmount();
    }

    #[test]
    fn relative_paths_follow_cwd() {
        let (_dir, mut session) = formatted();
        session.filesystem().unwrap().create_path("/a", true).unwrap();
        session.filesystem().unwrap().create_path("/a/b", true).unwrap();
        assert_eq!(session.absolute("x"), "/x");
        session.change_directory("a/b").unwrap();
        assert_eq!(session.cwd(), "/a/b");
        assert_eq!(session.absolute("x"), "/a/b/x");
        session.change_directory("..").unwrap();
        assert_eq!(session.cwd(), "/a");
        assert!(session.change_directory("missing").is_err());
        assert_eq!(session.cwd(), "/a");
    }

    #[test]
    fn remount_keeps_content() {
        let (_dir, mut session) = formatted();
        session
            .filesystem()
            .unwrap()
            .write_path("/f", b"kept")
            .unwrap();
        session.unmount();
        assert!(!session.is_mounted());
        session.mount().unwrap();
        assert_eq!(session.filesystem().unwrap().read_path("/f").unwrap(), b"kept");
    }
}
