//! Resource fingerprinting.
//!
//! A fingerprint is the SHA-256 digest of a canonical encoding of a resource
//! mapping: entries in key order, every key and value length-prefixed and
//! every value tagged with its type, so `{"a": "1"}` and `{"a": 1}` (or a
//! key/value boundary shifted by one byte) never encode the same way.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{AttributeValue, Attributes};

/// Grouping key identifying records that share a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceFingerprint([u8; 32]);

impl ResourceFingerprint {
    /// Fingerprints a resource mapping.
    pub fn of(resource: &Attributes) -> Self {
        let mut hasher = Sha256::new();
        encode_map(&mut hasher, resource);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Short hex form (first 8 bytes), enough to tell groups apart in logs.
impl fmt::Display for ResourceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

fn encode_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

fn encode_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    encode_len(hasher, bytes.len());
    hasher.update(bytes);
}

fn encode_map(hasher: &mut Sha256, map: &Attributes) {
    encode_len(hasher, map.len());
    // BTreeMap iteration is key-sorted, which makes the encoding independent
    // of insertion order.
    for (key, value) in map {
        encode_bytes(hasher, key.as_bytes());
        encode_value(hasher, value);
    }
}

fn encode_value(hasher: &mut Sha256, value: &AttributeValue) {
    match value {
        AttributeValue::Bool(b) => {
            hasher.update([0u8, *b as u8]);
        }
        AttributeValue::Int(i) => {
            hasher.update([1u8]);
            hasher.update(i.to_le_bytes());
        }
        AttributeValue::Double(d) => {
            hasher.update([2u8]);
            // -0.0 == 0.0, so both must hash alike
            let normalized = if *d == 0.0 { 0.0f64 } else { *d };
            hasher.update(normalized.to_bits().to_le_bytes());
        }
        AttributeValue::String(s) => {
            hasher.update([3u8]);
            encode_bytes(hasher, s.as_bytes());
        }
        AttributeValue::Bytes(b) => {
            hasher.update([4u8]);
            encode_bytes(hasher, b);
        }
        AttributeValue::Array(items) => {
            hasher.update([5u8]);
            encode_len(hasher, items.len());
            for item in items {
                encode_value(hasher, item);
            }
        }
        AttributeValue::Map(map) => {
            hasher.update([6u8]);
            encode_map(hasher, map);
        }
    }
}
