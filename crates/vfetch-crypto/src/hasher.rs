use vfetch_types::NodeId;

/// Domain-separated BLAKE3 revision hasher.
///
/// Each hasher carries a domain tag (e.g., `"vfetch-blob-v1"`,
/// `"vfetch-tree-v1"`) that is prepended to every hash computation, so a blob
/// and a tree with identical bytes never share a [`NodeId`]. The 32-byte
/// BLAKE3 output is truncated to the 20-byte node width.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for blob revisions.
    pub const BLOB: Self = Self {
        domain: "vfetch-blob-v1",
    };
    /// Hasher for tree revisions.
    pub const TREE: Self = Self {
        domain: "vfetch-tree-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> NodeId {
        self.hash_parts(&[data])
    }

    /// Hash a sequence of length-prefixed parts with domain separation.
    ///
    /// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` distinct.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> NodeId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut node = [0u8; NodeId::LEN];
        node.copy_from_slice(&digest.as_bytes()[..NodeId::LEN]);
        NodeId::from_array(node)
    }

    /// Verify that data produces the expected node.
    pub fn verify(&self, data: &[u8], expected: &NodeId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_and_tree_nodes_differ() {
        let data = b"same bytes";
        assert_eq!(ContentHasher::BLOB.hash(data), ContentHasher::BLOB.hash(data));
        assert_ne!(ContentHasher::BLOB.hash(data), ContentHasher::TREE.hash(data));
    }

    #[test]
    fn node_is_truncated_blake3() {
        let mut expected = blake3::Hasher::new();
        expected.update(b"vfetch-blob-v1:");
        expected.update(&4u64.to_le_bytes());
        expected.update(b"data");
        let digest = expected.finalize();

        let node = ContentHasher::BLOB.hash(b"data");
        assert_eq!(node.as_bytes(), &digest.as_bytes()[..NodeId::LEN]);
    }

    #[test]
    fn verify_detects_changed_content() {
        let node = ContentHasher::BLOB.hash(b"v1");
        assert!(ContentHasher::BLOB.verify(b"v1", &node));
        assert!(!ContentHasher::BLOB.verify(b"v2", &node));
    }

    #[test]
    fn parts_are_length_prefixed() {
        let a = ContentHasher::TREE.hash_parts(&[b"ab", b"c"]);
        let b = ContentHasher::TREE.hash_parts(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("vfetch-test-v1");
        assert_eq!(hasher.domain(), "vfetch-test-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::BLOB.hash(b"data"));
    }
}
