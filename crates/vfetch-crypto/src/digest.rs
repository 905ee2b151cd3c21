use sha2::{Digest, Sha256};
use vfetch_types::Hash32;

/// The checksums and size recorded for a blob's content.
///
/// Store writers compute these when a blob is written. The batch and
/// single-key import paths only copy them from store records; hashing blob
/// bytes is left to the secondary import path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentDigests {
    pub sha256: Hash32,
    pub blake3: Hash32,
    pub size: u64,
}

impl ContentDigests {
    pub fn compute(data: &[u8]) -> Self {
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&Sha256::digest(data));
        Self {
            sha256: Hash32::from_array(sha256),
            blake3: Hash32::from_array(*blake3::hash(data).as_bytes()),
            size: data.len() as u64,
        }
    }
}
