use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Defines a fixed-width hash newtype with hex parsing, hex display, and a
/// hex-string serde representation.
macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width of the hash in bytes.
            pub const LEN: usize = $len;

            /// Wrap a pre-computed hash.
            pub const fn from_array(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Copy a hash out of a byte slice of exactly the right length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            /// The all-zero hash.
            pub const fn null() -> Self {
                Self([0u8; $len])
            }

            /// Returns `true` if every byte is zero.
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; $len]
            }

            /// The raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Hex-encoded string representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex representation (first 8 characters).
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(
    /// Revision hash naming a record in the backing store.
    ///
    /// A `NodeId` is what the backing store is keyed by. Two distinct paths
    /// whose content and history coincide share a `NodeId`, which is why the
    /// import engine deduplicates on it.
    NodeId,
    20
);

fixed_hash!(
    /// 32-byte content digest (SHA-256 or BLAKE3).
    Hash32,
    32
);
