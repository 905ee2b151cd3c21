use vfetch_model::{Blob, BlobMetadata, Tree};
use vfetch_store::{BackingStore, BatchCallback, FetchMode, ObjectKind, RawBlob, RawBlobMetadata, RawTree};
use vfetch_types::NodeId;

use crate::config::ImportConfig;
use crate::convert;
use crate::error::ImportResult;
use crate::request::ImportRequest;
use crate::secondary::SecondaryImporter;

/// One of the three importable object kinds.
///
/// A batch is generic over its kind, so a dispatch can never mix kinds.
pub trait ImportKind: Sized + Send + Sync + 'static {
    const KIND: ObjectKind;

    /// Record type the backing store returns.
    type Raw: Send + Clone;

    /// Object handed to waiters.
    type Output: Send + Sync + 'static;

    /// Issue one batch fetch for `nodes`.
    fn fetch_batch(store: &dyn BackingStore, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, Self::Raw>);

    /// Convert a raw record fetched on behalf of `request`.
    fn convert(raw: Self::Raw, request: &ImportRequest<Self>, config: &ImportConfig) -> Self::Output;

    /// Whether `other` may reuse the object converted for `first`.
    ///
    /// Both requests already share a key. Kinds whose conversion reads the
    /// request's path or object id must compare them here.
    fn shares_conversion(_first: &ImportRequest<Self>, _other: &ImportRequest<Self>) -> bool {
        true
    }

    /// Produce the object through the secondary import path.
    fn import_secondary(importer: &dyn SecondaryImporter, request: &ImportRequest<Self>) -> ImportResult<Self::Output>;
}

/// Directory listings.
#[derive(Clone, Copy, Debug)]
pub struct TreeImport;

/// File contents.
#[derive(Clone, Copy, Debug)]
pub struct BlobImport;

/// Blob checksums and size.
#[derive(Clone, Copy, Debug)]
pub struct BlobMetadataImport;

impl ImportKind for TreeImport {
    const KIND: ObjectKind = ObjectKind::Tree;
    type Raw = RawTree;
    type Output = Tree;

    fn fetch_batch(store: &dyn BackingStore, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawTree>) {
        store.get_tree_batch(nodes, mode, on_result);
    }

    fn convert(raw: RawTree, request: &ImportRequest<Self>, config: &ImportConfig) -> Tree {
        convert::from_raw_tree(raw, request.object_id(), request.proxy_hash().path(), config)
    }

    fn shares_conversion(first: &ImportRequest<Self>, other: &ImportRequest<Self>) -> bool {
        first.object_id() == other.object_id() && first.proxy_hash().path() == other.proxy_hash().path()
    }

    fn import_secondary(importer: &dyn SecondaryImporter, request: &ImportRequest<Self>) -> ImportResult<Tree> {
        importer.import_tree(request.object_id(), request.proxy_hash())
    }
}

impl ImportKind for BlobImport {
    const KIND: ObjectKind = ObjectKind::Blob;
    type Raw = RawBlob;
    type Output = Blob;

    fn fetch_batch(store: &dyn BackingStore, nodes: &[NodeId], mode: FetchMode, on_result: BatchCallback<'_, RawBlob>) {
        store.get_blob_batch(nodes, mode, on_result);
    }

    fn convert(raw: RawBlob, _request: &ImportRequest<Self>, _config: &ImportConfig) -> Blob {
        convert::from_raw_blob(raw)
    }

    fn import_secondary(importer: &dyn SecondaryImporter, request: &ImportRequest<Self>) -> ImportResult<Blob> {
        importer.import_blob(request.proxy_hash())
    }
}

impl ImportKind for BlobMetadataImport {
    const KIND: ObjectKind = ObjectKind::BlobMetadata;
    type Raw = RawBlobMetadata;
    type Output = BlobMetadata;

    fn fetch_batch(
        store: &dyn BackingStore,
        nodes: &[NodeId],
        mode: FetchMode,
        on_result: BatchCallback<'_, RawBlobMetadata>,
    ) {
        store.get_blob_metadata_batch(nodes, mode, on_result);
    }

    fn convert(raw: RawBlobMetadata, _request: &ImportRequest<Self>, _config: &ImportConfig) -> BlobMetadata {
        convert::from_raw_blob_metadata(raw)
    }

    fn import_secondary(importer: &dyn SecondaryImporter, request: &ImportRequest<Self>) -> ImportResult<BlobMetadata> {
        importer.import_blob_metadata(request.proxy_hash())
    }
}
