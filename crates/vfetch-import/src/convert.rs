//! Translation of raw backing-store records into the filesystem object model.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{trace, warn};
use vfetch_model::{Blob, BlobMetadata, Tree, TreeEntry, TreeEntryType};
use vfetch_store::{RawBlob, RawBlobMetadata, RawEntryType, RawTree, RawTreeEntry};
use vfetch_types::{ObjectId, ObjectIdFormat, PathComponent, ProxyHash, RelativePath, TypeError};

use crate::config::ImportConfig;

/// Classify a raw entry type.
pub fn from_raw_entry_type(entry_type: RawEntryType) -> TreeEntryType {
    match entry_type {
        RawEntryType::RegularFile => TreeEntryType::RegularFile,
        RawEntryType::Tree => TreeEntryType::Tree,
        RawEntryType::ExecutableFile => TreeEntryType::ExecutableFile,
        RawEntryType::Symlink => TreeEntryType::Symlink,
    }
}

/// Convert one raw entry of the tree at `parent`.
///
/// Fails if the entry's name is not a valid path component.
pub fn from_raw_tree_entry(
    mut raw: RawTreeEntry,
    parent: &RelativePath,
    format: ObjectIdFormat,
) -> Result<(PathComponent, TreeEntry), TypeError> {
    let name = PathComponent::new(std::mem::take(&mut raw.name))?;
    let entry = tree_entry(raw, &parent.join(&name), format);
    Ok((name, entry))
}

fn tree_entry(raw: RawTreeEntry, full_path: &RelativePath, format: ObjectIdFormat) -> TreeEntry {
    TreeEntry {
        object_id: ProxyHash::store(full_path, &raw.node, format),
        entry_type: from_raw_entry_type(raw.entry_type),
        size: raw.size,
        content_sha256: raw.content_sha256,
        content_blake3: raw.content_blake3,
    }
}

/// Convert a raw tree fetched for `path` into a [`Tree`] identified by
/// `tree_id`.
///
/// Entries with invalid names are dropped with a warning. Entries whose full
/// path is filtered are left out; their subtrees are never visited.
pub fn from_raw_tree(raw: RawTree, tree_id: &ObjectId, path: &RelativePath, config: &ImportConfig) -> Tree {
    let mut entries = BTreeMap::new();
    for mut raw_entry in raw.entries {
        let name = match PathComponent::new(std::mem::take(&mut raw_entry.name)) {
            Ok(name) => name,
            Err(err) => {
                warn!(tree = %tree_id, path = %path, error = %err, "dropping tree entry with invalid name");
                continue;
            }
        };

        let full_path = path.join(&name);
        if config.is_filtered(&full_path) {
            trace!(path = %full_path, "skipping filtered entry");
            continue;
        }

        let entry = tree_entry(raw_entry, &full_path, config.object_id_format);
        match entries.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(slot) => {
                warn!(tree = %tree_id, name = %slot.key(), "dropping duplicate tree entry");
            }
        }
    }
    Tree::new(tree_id.clone(), entries)
}

pub fn from_raw_blob(raw: RawBlob) -> Blob {
    Blob::new(raw)
}

pub fn from_raw_blob_metadata(raw: RawBlobMetadata) -> BlobMetadata {
    BlobMetadata::new(raw.content_sha256, raw.content_blake3, raw.total_size)
}
