use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vfetch_types::{Hash32, ObjectId, PathComponent};

/// The type of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeEntryType {
    RegularFile,
    Tree,
    ExecutableFile,
    Symlink,
}

impl TreeEntryType {
    /// Returns `true` for subdirectories.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// POSIX permission bits the filesystem presents for this type.
    pub fn initial_mode(&self) -> u32 {
        match self {
            Self::RegularFile => 0o100644,
            Self::Tree => 0o040755,
            Self::ExecutableFile => 0o100755,
            Self::Symlink => 0o120777,
        }
    }
}

impl std::fmt::Display for TreeEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegularFile => write!(f, "file"),
            Self::Tree => write!(f, "tree"),
            Self::ExecutableFile => write!(f, "exec"),
            Self::Symlink => write!(f, "link"),
        }
    }
}

/// One child of a [`Tree`].
///
/// An entry refers to its child by identifier only; the child's contents are
/// fetched separately when the filesystem needs them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub object_id: ObjectId,
    #[serde(rename = "type")]
    pub entry_type: TreeEntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<Hash32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blake3: Option<Hash32>,
}

impl TreeEntry {
    /// An entry with no size or checksums attached.
    pub fn new(object_id: ObjectId, entry_type: TreeEntryType) -> Self {
        Self {
            object_id,
            entry_type,
            size: None,
            content_sha256: None,
            content_blake3: None,
        }
    }
}

/// Directory listing ordered by entry name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    id: ObjectId,
    entries: BTreeMap<PathComponent, TreeEntry>,
}

impl Tree {
    pub fn new(id: ObjectId, entries: BTreeMap<PathComponent, TreeEntry>) -> Self {
        Self { id, entries }
    }

    /// The identifier this tree was imported under.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathComponent, &TreeEntry)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8, entry_type: TreeEntryType) -> TreeEntry {
        TreeEntry::new(ObjectId::from_bytes(vec![byte]), entry_type)
    }

    #[test]
    fn entries_are_name_ordered() {
        let mut entries = BTreeMap::new();
        entries.insert(PathComponent::new("zebra.txt").unwrap(), entry(1, TreeEntryType::RegularFile));
        entries.insert(PathComponent::new("alpha.txt").unwrap(), entry(2, TreeEntryType::RegularFile));
        entries.insert(PathComponent::new("middle").unwrap(), entry(3, TreeEntryType::Tree));
        let tree = Tree::new(ObjectId::from_bytes(b"t".to_vec()), entries);

        let names: Vec<&str> = tree.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["alpha.txt", "middle", "zebra.txt"]);
    }

    #[test]
    fn get_by_name() {
        let mut entries = BTreeMap::new();
        entries.insert(PathComponent::new("a.txt").unwrap(), entry(1, TreeEntryType::Symlink));
        let tree = Tree::new(ObjectId::default(), entries);

        assert_eq!(tree.get("a.txt").unwrap().entry_type, TreeEntryType::Symlink);
        assert!(tree.get("missing").is_none());
        assert_eq!(tree.len(), 1);
        assert!(!tree.is_empty());
    }

    #[test]
    fn entry_type_helpers() {
        assert!(TreeEntryType::Tree.is_tree());
        assert!(!TreeEntryType::ExecutableFile.is_tree());
        assert_eq!(TreeEntryType::ExecutableFile.initial_mode() & 0o111, 0o111);
        assert_eq!(TreeEntryType::Symlink.to_string(), "link");
    }

    #[test]
    fn tree_json_roundtrip() {
        let mut entries = BTreeMap::new();
        let mut file = entry(7, TreeEntryType::RegularFile);
        file.size = Some(12);
        entries.insert(PathComponent::new("README").unwrap(), file);
        let tree = Tree::new(ObjectId::from_bytes(vec![1, 2]), entries);

        let json = serde_json::to_string(&tree).unwrap();
        let parsed: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
    }
}
