use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vfetch_types::Hash32;

/// File contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    contents: Bytes,
}

impl Blob {
    pub fn new(contents: impl Into<Bytes>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

/// Content checksums and size of a blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub sha256: Hash32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<Hash32>,
    pub size: u64,
}

impl BlobMetadata {
    pub fn new(sha256: Hash32, blake3: Option<Hash32>, size: u64) -> Self {
        Self {
            sha256,
            blake3,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_size() {
        let blob = Blob::new(b"hello".to_vec());
        assert_eq!(blob.size(), 5);
        assert_eq!(blob.contents().as_ref(), b"hello");
    }

    #[test]
    fn metadata_json_omits_missing_blake3() {
        let metadata = BlobMetadata::new(Hash32::from_array([1; 32]), None, 3);
        let json = serde_json::to_value(metadata).unwrap();
        assert!(json.get("blake3").is_none());
        assert_eq!(json["size"], 3);
    }
}
