use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use vfetch_store::{InMemoryBackingStore, RawTree, RawTreeEntry, StoreError, Tier};
use vfetch_types::NodeId;

/// On-disk description of a primary store and an optional secondary store.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Fixture {
    pub primary: StoreFixture,
    pub secondary: Option<StoreFixture>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreFixture {
    pub trees: Vec<TreeRecord>,
    pub blobs: Vec<BlobRecord>,
    pub failures: Vec<FailureRecord>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixtureTier {
    #[default]
    Local,
    Remote,
    Unflushed,
}

impl From<FixtureTier> for Tier {
    fn from(tier: FixtureTier) -> Self {
        match tier {
            FixtureTier::Local => Tier::Local,
            FixtureTier::Remote => Tier::Remote,
            FixtureTier::Unflushed => Tier::Unflushed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeRecord {
    #[serde(default)]
    pub tier: FixtureTier,
    /// Defaults to the node a writer would assign.
    pub node: Option<NodeId>,
    pub entries: Vec<RawTreeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlobRecord {
    #[serde(default)]
    pub tier: FixtureTier,
    pub node: Option<NodeId>,
    pub contents: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureRecord {
    pub node: NodeId,
    pub reason: String,
}

impl Fixture {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid fixture {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl StoreFixture {
    /// Populate a fresh in-memory store.
    pub fn build(&self) -> InMemoryBackingStore {
        let store = InMemoryBackingStore::new();
        for tree in &self.trees {
            let raw = RawTree::new(tree.entries.clone());
            match tree.node {
                Some(node) => store.insert_tree_with_node(tree.tier.into(), node, raw),
                None => {
                    store.insert_tree(tree.tier.into(), raw);
                }
            }
        }
        for blob in &self.blobs {
            let data = blob.contents.clone().into_bytes();
            match blob.node {
                Some(node) => store.insert_blob_with_node(blob.tier.into(), node, data),
                None => {
                    store.insert_blob(blob.tier.into(), data);
                }
            }
        }
        for failure in &self.failures {
            store.fail_node(failure.node, StoreError::Remote(failure.reason.clone()));
        }
        tracing::debug!(
            trees = self.trees.len(),
            blobs = self.blobs.len(),
            failures = self.failures.len(),
            "loaded store fixture"
        );
        store
    }
}
