use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use vfetch_store::ObjectKind;

use crate::datapack::DatapackStore;
use crate::kind::{BlobImport, BlobMetadataImport, ImportKind, TreeImport};
use crate::request::ImportRequest;
use crate::secondary::SecondaryImporter;

/// Counts from one pass through an [`ImportPipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub kind: ObjectKind,
    pub requests: usize,
    pub unique_keys: usize,
    /// Requests resolved by the backing store, successfully or not.
    pub primary_resolved: usize,
    /// Requests the backing store failed and the secondary path picked up.
    pub deferred: usize,
    pub secondary_fulfilled: usize,
    pub secondary_failed: usize,
}

/// Batches requests through a [`DatapackStore`] and completes whatever it
/// defers with a [`SecondaryImporter`].
pub struct ImportPipeline {
    datapack: Arc<DatapackStore>,
    secondary: Arc<dyn SecondaryImporter>,
}

impl ImportPipeline {
    pub fn new(datapack: Arc<DatapackStore>, secondary: Arc<dyn SecondaryImporter>) -> Self {
        Self { datapack, secondary }
    }

    pub fn datapack(&self) -> &DatapackStore {
        &self.datapack
    }

    /// Import `requests`, leaving none of them unresolved.
    pub fn import<K: ImportKind>(&self, requests: Vec<ImportRequest<K>>) -> PipelineReport {
        let outcome = self.datapack.import_batch(requests);
        let mut report = PipelineReport {
            kind: K::KIND,
            requests: outcome.requests,
            unique_keys: outcome.unique_keys,
            primary_resolved: outcome.fulfilled + outcome.failed,
            deferred: outcome.deferred.len(),
            secondary_fulfilled: 0,
            secondary_failed: 0,
        };

        if !outcome.is_complete() {
            debug!(kind = %K::KIND, deferred = report.deferred, "running secondary import");
        }
        for request in outcome.into_deferred() {
            match K::import_secondary(self.secondary.as_ref(), &request) {
                Ok(output) => {
                    report.secondary_fulfilled += 1;
                    request.fulfill(Ok(Arc::new(output)));
                }
                Err(err) => {
                    warn!(kind = %K::KIND, node = %request.fingerprint(), error = %err, "secondary import failed");
                    report.secondary_failed += 1;
                    request.fulfill(Err(err));
                }
            }
        }
        report
    }

    pub fn get_tree_batch(&self, requests: Vec<ImportRequest<TreeImport>>) -> PipelineReport {
        self.import(requests)
    }

    pub fn get_blob_batch(&self, requests: Vec<ImportRequest<BlobImport>>) -> PipelineReport {
        self.import(requests)
    }

    pub fn get_blob_metadata_batch(&self, requests: Vec<ImportRequest<BlobMetadataImport>>) -> PipelineReport {
        self.import(requests)
    }
}

#[cfg(test)]
mod tests {
    use vfetch_store::{BackingStore, InMemoryBackingStore, StoreError, Tier};
    use vfetch_types::{NodeId, ObjectId, ProxyHash, RelativePath};

    use super::*;
    use crate::config::{ImportConfig, ReloadableConfig};
    use crate::error::ImportError;
    use crate::request::HandleState;
    use crate::secondary::BackingStoreImporter;

    struct Fixture {
        primary: Arc<InMemoryBackingStore>,
        secondary: Arc<InMemoryBackingStore>,
        pipeline: ImportPipeline,
    }

    fn fixture(config: ImportConfig) -> Fixture {
        let config = Arc::new(ReloadableConfig::new(config));
        let primary = Arc::new(InMemoryBackingStore::new());
        let secondary = Arc::new(InMemoryBackingStore::new());
        let datapack = Arc::new(DatapackStore::new(
            Arc::clone(&primary) as Arc<dyn BackingStore>,
            Arc::clone(&config),
        ));
        let importer = BackingStoreImporter::new(Arc::clone(&secondary) as Arc<dyn BackingStore>, config);
        Fixture {
            primary,
            secondary,
            pipeline: ImportPipeline::new(datapack, Arc::new(importer)),
        }
    }

    fn proxy(path: &str, node: NodeId) -> ProxyHash {
        ProxyHash::new(RelativePath::new(path).unwrap(), node)
    }

    #[tokio::test]
    async fn deferred_requests_complete_through_secondary() {
        let fx = fixture(ImportConfig::default());
        let in_primary = fx.primary.insert_blob(Tier::Local, b"primary".to_vec());
        let in_secondary = fx.secondary.insert_blob(Tier::Remote, b"secondary".to_vec());

        let (a, ha) = ImportRequest::<BlobImport>::new(ObjectId::default(), proxy("a", in_primary));
        let (b, hb) = ImportRequest::<BlobImport>::new(ObjectId::default(), proxy("b", in_secondary));
        let (c, hc) = ImportRequest::<BlobImport>::new(ObjectId::default(), proxy("c", in_secondary));

        let report = fx.pipeline.get_blob_batch(vec![a, b, c]);

        assert_eq!(report.unique_keys, 2);
        assert_eq!(report.primary_resolved, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(report.secondary_fulfilled, 2);
        assert_eq!(ha.wait().await.unwrap().contents().as_ref(), b"primary");
        assert_eq!(hb.wait().await.unwrap().contents().as_ref(), b"secondary");
        assert_eq!(hc.wait().await.unwrap().contents().as_ref(), b"secondary");
    }

    #[tokio::test]
    async fn secondary_failure_reaches_waiter() {
        let fx = fixture(ImportConfig::default());
        let missing = NodeId::from_array([0xdd; 20]);
        let (req, handle) = ImportRequest::<TreeImport>::new(ObjectId::default(), proxy("t", missing));

        let report = fx.pipeline.get_tree_batch(vec![req]);

        assert_eq!(report.secondary_failed, 1);
        assert!(matches!(
            handle.wait().await,
            Err(ImportError::Secondary {
                kind: ObjectKind::Tree,
                ..
            })
        ));
    }

    #[test]
    fn strict_config_never_reaches_secondary() {
        let fx = fixture(ImportConfig::strict());
        let n = fx.secondary.insert_blob(Tier::Remote, b"only here".to_vec());
        fx.primary.fail_node(n, StoreError::Remote("boom".into()));
        let (req, mut handle) = ImportRequest::<BlobMetadataImport>::new(ObjectId::default(), proxy("m", n));

        let report = fx.pipeline.get_blob_metadata_batch(vec![req]);

        assert_eq!(report.deferred, 0);
        assert!(fx.secondary.single_calls().is_empty());
        assert!(matches!(handle.try_take(), HandleState::Ready(Err(ImportError::Store(_)))));
    }

    #[test]
    fn report_serializes() {
        let fx = fixture(ImportConfig::default());
        let report = fx.pipeline.import::<TreeImport>(Vec::new());
        assert_eq!(report.requests, 0);
        assert_eq!(fx.pipeline.datapack().watches(ObjectKind::Tree).completed(), 0);

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["kind"], "tree");
    }
}
