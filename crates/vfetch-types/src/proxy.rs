//! Mapping between filesystem object identifiers and backing-store keys.
//!
//! The filesystem names objects with an opaque [`ObjectId`]; the backing
//! store is keyed by a [`NodeId`]. A [`ProxyHash`] is the (path, node) pair
//! that sits between them. Depending on [`ObjectIdFormat`], the path is
//! either embedded in the object id or dropped from it.
//!
//! Encoding:
//!
//! | format      | bytes                         |
//! |-------------|-------------------------------|
//! | `WithPath`  | `0x01` ‖ node (20) ‖ path     |
//! | `HashOnly`  | `0x02` ‖ node (20)            |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::NodeId;
use crate::object::ObjectId;
use crate::path::RelativePath;

const TYPE_WITH_PATH: u8 = 0x01;
const TYPE_HASH_ONLY: u8 = 0x02;

/// How object identifiers are derived from a (path, node) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectIdFormat {
    /// Embed the full path in the identifier.
    #[default]
    WithPath,
    /// Identify by node only; the path is not recoverable from the id.
    HashOnly,
}

impl fmt::Display for ObjectIdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithPath => write!(f, "with-path"),
            Self::HashOnly => write!(f, "hash-only"),
        }
    }
}

/// A repository path paired with the revision hash of the object at that
/// path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyHash {
    path: RelativePath,
    node: NodeId,
}

impl ProxyHash {
    pub fn new(path: RelativePath, node: NodeId) -> Self {
        Self { path, node }
    }

    /// Build the filesystem identifier for `(path, node)` in `format`.
    pub fn store(path: &RelativePath, node: &NodeId, format: ObjectIdFormat) -> ObjectId {
        match format {
            ObjectIdFormat::WithPath => {
                let path = path.as_str().as_bytes();
                let mut bytes = Vec::with_capacity(1 + NodeId::LEN + path.len());
                bytes.push(TYPE_WITH_PATH);
                bytes.extend_from_slice(node.as_bytes());
                bytes.extend_from_slice(path);
                ObjectId::from_bytes(bytes)
            }
            ObjectIdFormat::HashOnly => {
                let mut bytes = Vec::with_capacity(1 + NodeId::LEN);
                bytes.push(TYPE_HASH_ONLY);
                bytes.extend_from_slice(node.as_bytes());
                ObjectId::from_bytes(bytes)
            }
        }
    }

    /// Parse an identifier produced by [`ProxyHash::store`].
    ///
    /// Hash-only identifiers carry no path and load with the root path.
    pub fn load(id: &ObjectId) -> Result<Self, TypeError> {
        let bytes = id.as_bytes();
        let (&type_byte, rest) = bytes
            .split_first()
            .ok_or_else(|| TypeError::MalformedObjectId("empty object id".into()))?;
        if rest.len() < NodeId::LEN {
            return Err(TypeError::MalformedObjectId(format!(
                "expected at least {} node bytes, got {}",
                NodeId::LEN,
                rest.len()
            )));
        }
        let (node_bytes, path_bytes) = rest.split_at(NodeId::LEN);
        let node = NodeId::from_slice(node_bytes)?;
        match type_byte {
            TYPE_WITH_PATH => {
                let path = std::str::from_utf8(path_bytes)
                    .map_err(|e| TypeError::MalformedObjectId(e.to_string()))?;
                Ok(Self::new(RelativePath::new(path)?, node))
            }
            TYPE_HASH_ONLY => {
                if !path_bytes.is_empty() {
                    return Err(TypeError::MalformedObjectId(
                        "trailing bytes after hash-only id".into(),
                    ));
                }
                Ok(Self::new(RelativePath::root(), node))
            }
            other => Err(TypeError::UnknownObjectIdType(other)),
        }
    }

    /// The identifier for this pair in `format`.
    pub fn object_id(&self, format: ObjectIdFormat) -> ObjectId {
        Self::store(&self.path, &self.node, format)
    }

    pub fn path(&self) -> &RelativePath {
        &self.path
    }

    /// The revision hash, which is also the backing-store key.
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}

impl fmt::Display for ProxyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node.short_hex(), self.path)
    }
}
