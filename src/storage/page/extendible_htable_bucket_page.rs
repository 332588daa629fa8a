use crate::common::config::DB_PAGE_SIZE;
use crate::container::comparator::KeyComparator;
use crate::storage::codec::FixedWidthCodec;
use crate::storage::page::page::PageLayout;

/// Bytes reserved for `size` and `max_size` at the front of a bucket page.
pub const HTABLE_BUCKET_PAGE_METADATA_SIZE: usize = 8;

/// Largest number of entries a bucket page can hold for a given record
/// width.
pub const fn htable_bucket_array_size(mapping_type_size: usize) -> usize {
    (DB_PAGE_SIZE - HTABLE_BUCKET_PAGE_METADATA_SIZE) / mapping_type_size
}

/// Leaf level of the extendible hash table: an unordered, fixed-capacity
/// array of (key, value) entries. No two entries compare equal under the
/// caller's comparator.
///
/// On-page layout (little-endian): `size: u32`, `max_size: u32`, then `size`
/// fixed-width (key, value) records.
#[derive(Debug)]
pub struct ExtendibleHTableBucketPage<K, V> {
    max_size: u32,
    array: Vec<(K, V)>,
}

impl<K, V> ExtendibleHTableBucketPage<K, V>
where
    K: FixedWidthCodec,
    V: FixedWidthCodec,
{
    pub fn new(max_size: u32) -> Self {
        assert!(max_size > 0, "bucket capacity must be positive");
        assert!(
            max_size as usize <= htable_bucket_array_size(K::WIDTH + V::WIDTH),
            "bucket capacity {} does not fit in a page",
            max_size
        );
        Self {
            max_size,
            array: Vec::with_capacity(max_size as usize),
        }
    }

    /// Returns the value stored under `key`, if any. First match wins.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Option<V> {
        self.array
            .iter()
            .find(|(k, _)| cmp.compare(k, key).is_eq())
            .map(|(_, v)| *v)
    }

    /// Appends an entry. Fails when the bucket is full or the key is already
    /// present.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: K, value: V, cmp: &C) -> bool {
        if self.is_full() {
            return false;
        }
        if self.lookup(&key, cmp).is_some() {
            return false;
        }
        self.array.push((key, value));
        true
    }

    /// Removes the entry stored under `key`. Returns whether it was present.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> bool {
        match self.array.iter().position(|(k, _)| cmp.compare(k, key).is_eq()) {
            Some(bucket_idx) => {
                self.remove_at(bucket_idx);
                true
            }
            None => false,
        }
    }

    /// Removes the entry at `bucket_idx`, shifting the tail left by one.
    pub fn remove_at(&mut self, bucket_idx: usize) {
        assert!(
            bucket_idx < self.array.len(),
            "bucket index {} out of bounds (size {})",
            bucket_idx,
            self.array.len()
        );
        self.array.remove(bucket_idx);
    }

    pub fn key_at(&self, bucket_idx: usize) -> &K {
        &self.entry_at(bucket_idx).0
    }

    pub fn value_at(&self, bucket_idx: usize) -> &V {
        &self.entry_at(bucket_idx).1
    }

    pub fn entry_at(&self, bucket_idx: usize) -> &(K, V) {
        assert!(
            bucket_idx < self.array.len(),
            "bucket index {} out of bounds (size {})",
            bucket_idx,
            self.array.len()
        );
        &self.array[bucket_idx]
    }

    /// Removes and returns every entry, leaving the bucket empty. Used when
    /// a split redistributes a full bucket.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.array)
    }

    pub fn size(&self) -> u32 {
        self.array.len() as u32
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.array.len() >= self.max_size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }
}

impl<K, V> PageLayout for ExtendibleHTableBucketPage<K, V>
where
    K: FixedWidthCodec,
    V: FixedWidthCodec,
{
    fn load(data: &[u8]) -> Self {
        let size = u32::decode_from(&data[0..4]) as usize;
        let max_size = u32::decode_from(&data[4..8]);

        let record_width = K::WIDTH + V::WIDTH;
        let mut array = Vec::with_capacity(max_size as usize);
        for i in 0..size {
            let base = HTABLE_BUCKET_PAGE_METADATA_SIZE + i * record_width;
            let key = K::decode_from(&data[base..]);
            let value = V::decode_from(&data[base + K::WIDTH..]);
            array.push((key, value));
        }

        Self { max_size, array }
    }

    fn store(&self, data: &mut [u8]) {
        self.size().encode_to(&mut data[0..4]);
        self.max_size.encode_to(&mut data[4..8]);

        let record_width = K::WIDTH + V::WIDTH;
        for (i, (key, value)) in self.array.iter().enumerate() {
            let base = HTABLE_BUCKET_PAGE_METADATA_SIZE + i * record_width;
            key.encode_to(&mut data[base..]);
            value.encode_to(&mut data[base + K::WIDTH..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::rid::Rid;
    use crate::container::comparator::OrdComparator;

    #[test]
    fn test_insert_lookup_remove() {
        let cmp = OrdComparator::default();
        let mut bucket = ExtendibleHTableBucketPage::<i64, Rid>::new(10);

        for i in 0..10 {
            assert!(bucket.insert(i, Rid::new(i as u32, i as u32), &cmp));
        }
        assert!(bucket.is_full());
        assert!(!bucket.insert(11, Rid::new(11, 11), &cmp));

        for i in 0..10 {
            assert_eq!(bucket.lookup(&i, &cmp), Some(Rid::new(i as u32, i as u32)));
        }

        for i in 0..10 {
            if i % 2 == 1 {
                assert!(bucket.remove(&i, &cmp));
            }
        }
        for i in 0..10 {
            if i % 2 == 1 {
                assert!(!bucket.remove(&i, &cmp));
            } else {
                assert!(bucket.remove(&i, &cmp));
            }
        }
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let cmp = OrdComparator::default();
        let mut bucket = ExtendibleHTableBucketPage::<i32, u32>::new(4);
        assert!(bucket.insert(1, 10, &cmp));
        assert!(!bucket.insert(1, 20, &cmp));
        assert_eq!(bucket.lookup(&1, &cmp), Some(10));
        assert_eq!(bucket.size(), 1);
    }

    #[test]
    fn test_remove_at_preserves_order() {
        let cmp = OrdComparator::default();
        let mut bucket = ExtendibleHTableBucketPage::<i32, u32>::new(4);
        for i in 0..4 {
            assert!(bucket.insert(i, i as u32, &cmp));
        }
        bucket.remove_at(1);
        assert_eq!(*bucket.key_at(0), 0);
        assert_eq!(*bucket.key_at(1), 2);
        assert_eq!(*bucket.key_at(2), 3);
        assert_eq!(bucket.size(), 3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_remove_at_out_of_range_panics() {
        let mut bucket = ExtendibleHTableBucketPage::<i32, u32>::new(4);
        bucket.remove_at(0);
    }

    #[test]
    fn test_layout_round_trip() {
        let cmp = OrdComparator::default();
        let mut bucket = ExtendibleHTableBucketPage::<i64, Rid>::new(8);
        for i in 0..5 {
            assert!(bucket.insert(i * 3, Rid::new(i as u32, 0), &cmp));
        }

        let mut data = [0u8; DB_PAGE_SIZE];
        bucket.store(&mut data);

        let restored = ExtendibleHTableBucketPage::<i64, Rid>::load(&data);
        assert_eq!(restored.size(), 5);
        assert_eq!(restored.max_size(), 8);
        for i in 0..5 {
            assert_eq!(restored.lookup(&(i * 3), &cmp), Some(Rid::new(i as u32, 0)));
        }
    }

    #[test]
    fn test_capacity_bound() {
        // (4096 - 8) / (8 + 8) = 255 entries of (i64, Rid).
        assert_eq!(htable_bucket_array_size(16), 255);
    }
}
