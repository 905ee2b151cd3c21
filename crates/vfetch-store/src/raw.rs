use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vfetch_crypto::ContentHasher;
use vfetch_types::{Hash32, NodeId};

/// The kind of record fetched from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Directory listing.
    Tree,
    /// File contents.
    Blob,
    /// Checksums and size of a blob.
    BlobMetadata,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Blob => write!(f, "blob"),
            Self::BlobMetadata => write!(f, "blob metadata"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// Entry type as recorded by the store.
///
/// This is a closed set: the store must never produce anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawEntryType {
    /// Normal file (0o100644).
    RegularFile,
    /// Subtree / directory (0o040000).
    Tree,
    /// Executable file (0o100755).
    ExecutableFile,
    /// Symbolic link (0o120000).
    Symlink,
}

impl RawEntryType {
    /// Octal mode value (for display/serialization).
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::RegularFile => 0o100644,
            Self::Tree => 0o040000,
            Self::ExecutableFile => 0o100755,
            Self::Symlink => 0o120000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o100644 => Some(Self::RegularFile),
            0o040000 => Some(Self::Tree),
            0o100755 => Some(Self::ExecutableFile),
            0o120000 => Some(Self::Symlink),
            _ => None,
        }
    }
}

/// A single child of a [`RawTree`].
///
/// The name is kept exactly as the store returned it; it has not been
/// validated as a path component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTreeEntry {
    pub name: String,
    /// Revision hash of the child.
    pub node: NodeId,
    #[serde(rename = "type")]
    pub entry_type: RawEntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<Hash32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blake3: Option<Hash32>,
}

impl RawTreeEntry {
    /// An entry with no size or checksums attached.
    pub fn new(name: impl Into<String>, node: NodeId, entry_type: RawEntryType) -> Self {
        Self {
            name: name.into(),
            node,
            entry_type,
            size: None,
            content_sha256: None,
            content_blake3: None,
        }
    }
}

/// Directory listing as the store keeps it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTree {
    pub entries: Vec<RawTreeEntry>,
}

impl RawTree {
    pub fn new(entries: Vec<RawTreeEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Revision hash a writer assigns to this listing.
    pub fn compute_node(&self) -> NodeId {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(self.entries.len() * 3);
        for entry in &self.entries {
            parts.push(entry.name.as_bytes().to_vec());
            parts.push(entry.node.as_bytes().to_vec());
            parts.push(entry.entry_type.mode_bits().to_le_bytes().to_vec());
        }
        let borrowed: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        ContentHasher::TREE.hash_parts(&borrowed)
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

/// File contents as the store keeps them.
pub type RawBlob = Bytes;

/// Checksums and size of a blob as the store keeps them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlobMetadata {
    pub content_sha256: Hash32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blake3: Option<Hash32>,
    pub total_size: u64,
}
