use std::sync::Arc;

use tracing::debug;
use vfetch_crypto::ContentDigests;
use vfetch_model::{Blob, BlobMetadata, Tree};
use vfetch_store::{BackingStore, FetchMode, ObjectKind};
use vfetch_types::{ObjectId, ProxyHash};

use crate::config::ReloadableConfig;
use crate::convert;
use crate::error::{ImportError, ImportResult};

/// The slower import path that completes requests the backing store could
/// not serve.
pub trait SecondaryImporter: Send + Sync {
    fn import_tree(&self, tree_id: &ObjectId, proxy_hash: &ProxyHash) -> ImportResult<Tree>;

    fn import_blob(&self, proxy_hash: &ProxyHash) -> ImportResult<Blob>;

    fn import_blob_metadata(&self, proxy_hash: &ProxyHash) -> ImportResult<BlobMetadata>;
}

/// A [`SecondaryImporter`] that reads from another backing store.
///
/// Metadata misses are answered by fetching the blob and hashing it.
pub struct BackingStoreImporter {
    store: Arc<dyn BackingStore>,
    config: Arc<ReloadableConfig>,
}

impl BackingStoreImporter {
    pub fn new(store: Arc<dyn BackingStore>, config: Arc<ReloadableConfig>) -> Self {
        Self { store, config }
    }

    fn missing(kind: ObjectKind, proxy_hash: &ProxyHash) -> ImportError {
        ImportError::Secondary {
            kind,
            node: *proxy_hash.node(),
            reason: "not present in secondary store".into(),
        }
    }
}

impl SecondaryImporter for BackingStoreImporter {
    fn import_tree(&self, tree_id: &ObjectId, proxy_hash: &ProxyHash) -> ImportResult<Tree> {
        let raw = self
            .store
            .get_tree(proxy_hash.node(), FetchMode::AllowRemote)
            .ok_or_else(|| Self::missing(ObjectKind::Tree, proxy_hash))?;
        let config = self.config.snapshot();
        Ok(convert::from_raw_tree(raw, tree_id, proxy_hash.path(), &config))
    }

    fn import_blob(&self, proxy_hash: &ProxyHash) -> ImportResult<Blob> {
        self.store
            .get_blob(proxy_hash.node(), FetchMode::AllowRemote)
            .map(convert::from_raw_blob)
            .ok_or_else(|| Self::missing(ObjectKind::Blob, proxy_hash))
    }

    fn import_blob_metadata(&self, proxy_hash: &ProxyHash) -> ImportResult<BlobMetadata> {
        if let Some(raw) = self.store.get_blob_metadata(proxy_hash.node(), FetchMode::AllowRemote) {
            return Ok(convert::from_raw_blob_metadata(raw));
        }
        let blob = self
            .store
            .get_blob(proxy_hash.node(), FetchMode::AllowRemote)
            .ok_or_else(|| Self::missing(ObjectKind::BlobMetadata, proxy_hash))?;
        debug!(node = %proxy_hash.node(), "computing metadata from blob contents");
        let digests = ContentDigests::compute(&blob);
        Ok(BlobMetadata::new(digests.sha256, Some(digests.blake3), digests.size))
    }
}

#[cfg(test)]
mod tests {
    use vfetch_store::{InMemoryBackingStore, RawBlobMetadata, RawEntryType, RawTree, RawTreeEntry, Tier};
    use vfetch_types::{Hash32, NodeId, ObjectIdFormat, RelativePath};

    use super::*;
    use crate::config::ImportConfig;

    fn importer(store: &Arc<InMemoryBackingStore>) -> BackingStoreImporter {
        BackingStoreImporter::new(
            Arc::clone(store) as Arc<dyn BackingStore>,
            Arc::new(ReloadableConfig::new(ImportConfig::default())),
        )
    }

    fn proxy(path: &str, node: NodeId) -> ProxyHash {
        ProxyHash::new(RelativePath::new(path).unwrap(), node)
    }

    #[test]
    fn imports_tree_from_remote() {
        let store = Arc::new(InMemoryBackingStore::new());
        let node = store.insert_tree(
            Tier::Remote,
            RawTree::new(vec![RawTreeEntry::new("x", NodeId::from_array([1; 20]), RawEntryType::Symlink)]),
        );
        let proxy = proxy("dir", node);
        let id = proxy.object_id(ObjectIdFormat::WithPath);

        let tree = importer(&store).import_tree(&id, &proxy).unwrap();
        assert_eq!(tree.id(), &id);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn missing_blob_is_a_secondary_error() {
        let store = Arc::new(InMemoryBackingStore::new());
        let err = importer(&store)
            .import_blob(&proxy("f", NodeId::from_array([9; 20])))
            .unwrap_err();
        assert!(matches!(err, ImportError::Secondary { kind: ObjectKind::Blob, .. }));
    }

    #[test]
    fn metadata_prefers_stored_record() {
        let store = Arc::new(InMemoryBackingStore::new());
        let node = NodeId::from_array([4; 20]);
        let stored = RawBlobMetadata {
            content_sha256: Hash32::from_array([8; 32]),
            content_blake3: None,
            total_size: 99,
        };
        store.insert_blob_metadata(Tier::Remote, node, stored);

        let metadata = importer(&store).import_blob_metadata(&proxy("f", node)).unwrap();
        assert_eq!(metadata.size, 99);
        assert_eq!(metadata.blake3, None);
    }

    #[test]
    fn metadata_computed_from_blob() {
        let node = NodeId::from_array([6; 20]);
        let inner = InMemoryBackingStore::new();
        inner.insert_blob_with_node(Tier::Remote, node, b"payload".to_vec());
        let importer = BackingStoreImporter::new(
            Arc::new(BlobOnly(inner)) as Arc<dyn BackingStore>,
            Arc::new(ReloadableConfig::default()),
        );
        let expected = ContentDigests::compute(b"payload");

        let metadata = importer.import_blob_metadata(&proxy("f", node)).unwrap();
        assert_eq!(metadata.sha256, expected.sha256);
        assert_eq!(metadata.blake3, Some(expected.blake3));
        assert_eq!(metadata.size, 7);
    }

    /// Serves blobs but never metadata.
    struct BlobOnly(InMemoryBackingStore);

    impl BackingStore for BlobOnly {
        fn get_tree(&self, node: &NodeId, mode: FetchMode) -> Option<RawTree> {
            self.0.get_tree(node, mode)
        }

        fn get_blob(&self, node: &NodeId, mode: FetchMode) -> Option<vfetch_store::RawBlob> {
            self.0.get_blob(node, mode)
        }

        fn get_blob_metadata(&self, _node: &NodeId, _mode: FetchMode) -> Option<RawBlobMetadata> {
            None
        }

        fn flush(&self) {
            self.0.flush();
        }
    }
}
