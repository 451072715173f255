use super::*;

/// Occupied directory slot as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub name: String,
    pub inode: u32,
    pub is_directory: bool,
}

impl DirectoryEntry {
    pub fn empty() -> Self {
        Self {
            name: [0; NAME_LENGTH],
            inode: NULL_ID,
        }
    }

    /// Entry for a validated name
    pub fn new(name: &str, inode: u32) -> Self {
        let mut raw = [0; NAME_LENGTH];
        let length = name.len().min(NAME_LENGTH);
        raw[..length].copy_from_slice(&name.as_bytes()[..length]);
        Self { name: raw, inode }
    }

    pub fn is_empty(&self) -> bool {
        self.inode == NULL_ID
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LENGTH);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn matches(&self, name: &str) -> bool {
        !self.is_empty() && self.name() == name
    }

    /// `.` and `..` are bookkeeping, not content
    pub fn is_link(&self) -> bool {
        let name = self.name();
        name == "." || name == ".."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_without_terminator() {
        let entry = DirectoryEntry::new("abcdefghijkl", 4);
        assert_eq!(entry.name(), "abcdefghijkl");
        assert!(entry.matches("abcdefghijkl"));
        assert!(!entry.matches("abcdefghijk"));
    }

    #[test]
    fn empty_slot_matches_nothing() {
        let entry = DirectoryEntry::empty();
        assert!(entry.is_empty());
        assert!(!entry.matches(""));
    }

    #[test]
    fn byte_conversion() {
        let entry = DirectoryEntry::new("foo.txt", 420);
        let bytes = bytemuck::bytes_of(&entry).to_vec();
        assert_eq!(bytes.len(), ENTRY_SIZE);
        let decoded: DirectoryEntry = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(decoded.inode, 420);
        assert_eq!(decoded.name(), "foo.txt");
    }
}
