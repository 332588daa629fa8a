use std::cmp::Ordering;
use std::marker::PhantomData;

/// Three-way comparison over keys, fixed at index construction.
///
/// Indexes carry a comparator value rather than bounding keys with `Ord`
/// directly, so that the same key type can be ordered differently per index
/// (collation, sign handling, composite key prefixes).
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

/// Comparator delegating to the key's natural `Ord`.
pub struct OrdComparator<K> {
    _marker: PhantomData<fn(&K)>,
}

impl<K> Default for OrdComparator<K> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K: Ord + Send + Sync> KeyComparator<K> for OrdComparator<K> {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}
