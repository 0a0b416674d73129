//! Canonical structural hashing.
//!
//! Every value that takes part in deduplication or caching is fed through a
//! [`StableHasher`]: fields are tagged and length-prefixed so that no two
//! distinct structures can produce the same byte stream.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex SHA-256 digest identifying a structural value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character fan-out directory used by on-disk stores.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// Leading bytes of the digest.
    pub fn bytes(&self, n: usize) -> Vec<u8> {
        hex::decode(&self.0)
            .map(|mut b| {
                b.truncate(n);
                b
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct StableHasher {
    inner: Sha256,
}

impl StableHasher {
    /// Starts a hash in the given domain; keys from different domains never collide.
    pub fn new(domain: &str) -> Self {
        let mut hasher = StableHasher {
            inner: Sha256::new(),
        };
        hasher.tag(domain);
        hasher
    }

    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.inner.update([0x01]);
        self.write_len_prefixed(tag.as_bytes());
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.inner.update([0x02]);
        self.write_len_prefixed(value.as_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.inner.update([0x03]);
        self.write_len_prefixed(value);
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.inner.update([0x04]);
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.inner.update([0x05]);
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.inner.update([0x06, value as u8]);
        self
    }

    pub fn none(&mut self) -> &mut Self {
        self.inner.update([0x07]);
        self
    }

    /// Feeds any [`StableHash`] value.
    pub fn value<T: StableHash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.stable_hash(self);
        self
    }

    pub fn finish(self) -> ContentKey {
        ContentKey(hex::encode(self.inner.finalize()))
    }

    fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }
}

/// Hashes a single value in `domain`.
pub fn content_key<T: StableHash + ?Sized>(domain: &str, value: &T) -> ContentKey {
    let mut hasher = StableHasher::new(domain);
    value.stable_hash(&mut hasher);
    hasher.finish()
}

pub fn hash_bytes(domain: &str, bytes: &[u8]) -> ContentKey {
    let mut hasher = StableHasher::new(domain);
    hasher.bytes(bytes);
    hasher.finish()
}

/// Canonical structural hash of a value.
pub trait StableHash {
    fn stable_hash(&self, hasher: &mut StableHasher);
}

impl StableHash for str {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.str(self);
    }
}

impl StableHash for String {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.str(self);
    }
}

impl StableHash for bool {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.bool(*self);
    }
}

impl StableHash for u8 {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.u64(*self as u64);
    }
}

impl StableHash for u32 {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.u64(*self as u64);
    }
}

impl StableHash for usize {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.u64(*self as u64);
    }
}

impl<T: StableHash> StableHash for Option<T> {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        match self {
            Some(value) => {
                hasher.tag("some");
                value.stable_hash(hasher);
            }
            None => {
                hasher.none();
            }
        }
    }
}

impl<T: StableHash> StableHash for [T] {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.tag("seq").u64(self.len() as u64);
        for item in self {
            item.stable_hash(hasher);
        }
    }
}

impl<T: StableHash> StableHash for Vec<T> {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.as_slice().stable_hash(hasher);
    }
}

impl<T: StableHash, const N: usize> StableHash for [T; N] {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        self.as_slice().stable_hash(hasher);
    }
}

impl<V: StableHash> StableHash for BTreeMap<String, V> {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.tag("map").u64(self.len() as u64);
        for (key, value) in self {
            hasher.str(key);
            value.stable_hash(hasher);
        }
    }
}

/// JSON values hash with object keys in sorted order regardless of how the
/// map preserves insertion order.
impl StableHash for Value {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        match self {
            Value::Null => {
                hasher.tag("null");
            }
            Value::Bool(b) => {
                hasher.bool(*b);
            }
            Value::Number(n) => {
                hasher.tag("num").str(&n.to_string());
            }
            Value::String(s) => {
                hasher.str(s);
            }
            Value::Array(items) => items.stable_hash(hasher),
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                hasher.tag("obj").u64(keys.len() as u64);
                for key in keys {
                    hasher.str(key);
                    map[key].stable_hash(hasher);
                }
            }
        }
    }
}
