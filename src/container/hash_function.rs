use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3;

/// Hashes a key to the 32 bits consumed by the header and directory routing
/// logic. Fixed at index construction.
pub trait KeyHasher<K>: Send + Sync {
    fn hash_key(&self, key: &K) -> u32;
}

/// Production hasher: xxh3 folded down to 32 bits.
#[derive(Default, Clone, Copy)]
pub struct XxHashFunction;

impl<K: Hash> KeyHasher<K> for XxHashFunction {
    fn hash_key(&self, key: &K) -> u32 {
        let mut hasher = xxh3::Xxh3::new();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }
}

/// Hasher mapping an integer key to itself. Deterministic routing makes
/// split and merge behavior reproducible in tests and debugging sessions.
#[derive(Default, Clone, Copy)]
pub struct IdentityHashFunction;

impl KeyHasher<i32> for IdentityHashFunction {
    fn hash_key(&self, key: &i32) -> u32 {
        *key as u32
    }
}

impl KeyHasher<u32> for IdentityHashFunction {
    fn hash_key(&self, key: &u32) -> u32 {
        *key
    }
}

impl KeyHasher<i64> for IdentityHashFunction {
    fn hash_key(&self, key: &i64) -> u32 {
        *key as u32
    }
}
