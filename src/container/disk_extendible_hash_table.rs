use std::sync::Arc;

use log::{debug, info};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{INVALID_PAGE_ID, PageId};
use crate::common::error::StorageError;
use crate::container::comparator::KeyComparator;
use crate::container::hash_function::KeyHasher;
use crate::storage::codec::FixedWidthCodec;
use crate::storage::page::extendible_htable_bucket_page::ExtendibleHTableBucketPage;
use crate::storage::page::extendible_htable_directory_page::ExtendibleHTableDirectoryPage;
use crate::storage::page::extendible_htable_header_page::ExtendibleHTableHeaderPage;

/// A disk-resident extendible hash table built on buffer-pool pages.
///
/// Three page levels: a header routes the top hash bits to a directory, the
/// directory routes the low `global_depth` bits to a bucket, and buckets
/// hold the entries. Directories and buckets are created lazily on first
/// write and grow by splitting; removals fold empty buckets back into their
/// split images and shrink the directory when every slot permits it.
///
/// Traversals crab-latch: each level's latch is released as soon as the next
/// level's page id has been read. Structural changes (split, merge) happen
/// under the directory's exclusive latch; after a split the insert retries
/// from the top under fresh latches.
pub struct DiskExtendibleHashTable<K, V, C, H> {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    cmp: C,
    hash_fn: H,
    directory_max_depth: u32,
    bucket_max_size: u32,
    header_page_id: PageId,
    _marker: std::marker::PhantomData<(K, V)>,
}

impl<K, V, C, H> DiskExtendibleHashTable<K, V, C, H>
where
    K: FixedWidthCodec,
    V: FixedWidthCodec,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
{
    /// Creates the table and its header page.
    ///
    /// `header_max_depth` and `directory_max_depth` bound how far the
    /// routing structures can grow; `bucket_max_size` is the entry capacity
    /// of each bucket page. All three are fixed for the table's lifetime.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        cmp: C,
        hash_fn: H,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Result<Self, StorageError> {
        let index_name = name.into();

        let mut header_guard = bpm
            .new_page()
            .ok_or(StorageError::PoolExhausted("hash table header"))?;
        let header = ExtendibleHTableHeaderPage::new(header_max_depth);
        header_guard.set_page(&header);
        let header_page_id = header_guard.page_id();

        info!(
            "Created extendible hash table '{}' (header page {}, header depth {}, directory depth {}, bucket size {})",
            index_name, header_page_id, header_max_depth, directory_max_depth, bucket_max_size
        );

        Ok(Self {
            index_name,
            bpm,
            cmp,
            hash_fn,
            directory_max_depth,
            bucket_max_size,
            header_page_id,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    fn hash(&self, key: &K) -> u32 {
        self.hash_fn.hash_key(key)
    }

    /// Looks up the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);

        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header: ExtendibleHTableHeaderPage = header_guard.as_page();
        let directory_idx = header.hash_to_directory_index(hash);
        let directory_page_id = header.get_directory_page_id(directory_idx);
        drop(header_guard);

        if directory_page_id == INVALID_PAGE_ID {
            return None;
        }

        let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
        let directory: ExtendibleHTableDirectoryPage = directory_guard.as_page();
        let bucket_idx = directory.hash_to_bucket_index(hash);
        let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
        drop(directory_guard);

        if bucket_page_id == INVALID_PAGE_ID {
            return None;
        }

        let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
        let bucket: ExtendibleHTableBucketPage<K, V> = bucket_guard.as_page();
        bucket.lookup(key, &self.cmp)
    }

    /// Inserts a (key, value) entry. Fails on duplicate keys and when the
    /// structure cannot grow any further (directory at max depth, or no
    /// frame available for a new page).
    pub fn insert(&self, key: K, value: V) -> bool {
        let hash = self.hash(&key);

        let Some(mut header_guard) = self.bpm.fetch_page_write(self.header_page_id) else {
            return false;
        };
        let mut header: ExtendibleHTableHeaderPage = header_guard.as_page();
        let directory_idx = header.hash_to_directory_index(hash);
        let mut directory_page_id = header.get_directory_page_id(directory_idx);

        if directory_page_id == INVALID_PAGE_ID {
            // First write under this hash prefix: create its directory.
            let Some(mut directory_guard) = self.bpm.new_page() else {
                return false;
            };
            let directory = ExtendibleHTableDirectoryPage::new(self.directory_max_depth);
            directory_guard.set_page(&directory);
            directory_page_id = directory_guard.page_id();
            header.set_directory_page_id(directory_idx, directory_page_id);
            header_guard.set_page(&header);
            debug!(
                "table '{}': created directory page {} for prefix {}",
                self.index_name, directory_page_id, directory_idx
            );
        }
        drop(header_guard);

        let Some(mut directory_guard) = self.bpm.fetch_page_write(directory_page_id) else {
            return false;
        };
        let mut directory: ExtendibleHTableDirectoryPage = directory_guard.as_page();
        let bucket_idx = directory.hash_to_bucket_index(hash);
        let mut bucket_page_id = directory.get_bucket_page_id(bucket_idx);

        if bucket_page_id == INVALID_PAGE_ID {
            // First write into this directory slot: create its bucket.
            let Some(mut bucket_guard) = self.bpm.new_page() else {
                return false;
            };
            let bucket = ExtendibleHTableBucketPage::<K, V>::new(self.bucket_max_size);
            bucket_guard.set_page(&bucket);
            bucket_page_id = bucket_guard.page_id();
            directory.set_bucket_page_id(bucket_idx, bucket_page_id);
            directory.set_local_depth(bucket_idx, 0);
            directory_guard.set_page(&directory);
            debug!(
                "table '{}': created bucket page {} at slot {}",
                self.index_name, bucket_page_id, bucket_idx
            );
        }

        let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id) else {
            return false;
        };
        let mut bucket: ExtendibleHTableBucketPage<K, V> = bucket_guard.as_page();

        if bucket.lookup(&key, &self.cmp).is_some() {
            return false;
        }

        if !bucket.is_full() {
            let inserted = bucket.insert(key, value, &self.cmp);
            if inserted {
                bucket_guard.set_page(&bucket);
            }
            return inserted;
        }

        // The bucket is full. Grow the directory if this bucket is at the
        // global depth already, split, then retry from the top so the new
        // routing is picked up under fresh latches.
        if directory.get_local_depth(bucket_idx) == directory.get_global_depth() {
            if directory.get_global_depth() == directory.get_max_depth() {
                debug!(
                    "table '{}': insert failed, directory at max depth {}",
                    self.index_name,
                    directory.get_max_depth()
                );
                return false;
            }
            directory.incr_global_depth();
        }

        if !self.split(&mut directory, &mut bucket, bucket_idx) {
            return false;
        }

        directory_guard.set_page(&directory);
        bucket_guard.set_page(&bucket);
        drop(bucket_guard);
        drop(directory_guard);

        self.insert(key, value)
    }

    /// Splits the full bucket at `bucket_idx` into itself and a freshly
    /// allocated split image, one local depth deeper.
    ///
    /// Every directory slot that routed to the old bucket is re-routed by
    /// the new distinguishing bit and stamped with the new local depth, so
    /// aliases beyond the canonical pair stay consistent. Entries are then
    /// rehashed across the pair.
    ///
    /// Until the caller stores `directory` and `bucket` back through their
    /// guards, no persistent state has changed; a failed split is therefore
    /// side-effect free apart from the allocated page.
    fn split(
        &self,
        directory: &mut ExtendibleHTableDirectoryPage,
        bucket: &mut ExtendibleHTableBucketPage<K, V>,
        bucket_idx: u32,
    ) -> bool {
        let old_page_id = directory.get_bucket_page_id(bucket_idx);
        let new_depth = directory.get_local_depth(bucket_idx) + 1;
        debug_assert!(new_depth <= directory.get_global_depth());

        let Some(mut new_bucket_guard) = self.bpm.new_page() else {
            return false;
        };
        let new_page_id = new_bucket_guard.page_id();
        let mut new_bucket = ExtendibleHTableBucketPage::<K, V>::new(self.bucket_max_size);

        let distinguishing_bit = 1u32 << (new_depth - 1);
        let keep_group = bucket_idx & distinguishing_bit;
        for i in 0..directory.size() {
            if directory.get_bucket_page_id(i) != old_page_id {
                continue;
            }
            directory.set_local_depth(i, new_depth as u8);
            if i & distinguishing_bit != keep_group {
                directory.set_bucket_page_id(i, new_page_id);
            }
        }

        for (key, value) in bucket.drain() {
            let target_idx = directory.hash_to_bucket_index(self.hash(&key));
            let target_page_id = directory.get_bucket_page_id(target_idx);
            let inserted = if target_page_id == old_page_id {
                bucket.insert(key, value, &self.cmp)
            } else {
                debug_assert_eq!(target_page_id, new_page_id);
                new_bucket.insert(key, value, &self.cmp)
            };
            if !inserted {
                return false;
            }
        }

        new_bucket_guard.set_page(&new_bucket);
        debug!(
            "table '{}': split bucket page {} into {} at local depth {}",
            self.index_name, old_page_id, new_page_id, new_depth
        );
        true
    }

    /// Removes the entry stored under `key`. Returns whether it was
    /// present. A removal that empties the bucket triggers an iterative
    /// merge with its split images.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);

        let Some(header_guard) = self.bpm.fetch_page_write(self.header_page_id) else {
            return false;
        };
        let header: ExtendibleHTableHeaderPage = header_guard.as_page();
        let directory_idx = header.hash_to_directory_index(hash);
        let directory_page_id = header.get_directory_page_id(directory_idx);
        drop(header_guard);

        if directory_page_id == INVALID_PAGE_ID {
            return false;
        }

        let Some(mut directory_guard) = self.bpm.fetch_page_write(directory_page_id) else {
            return false;
        };
        let mut directory: ExtendibleHTableDirectoryPage = directory_guard.as_page();
        let bucket_idx = directory.hash_to_bucket_index(hash);
        let bucket_page_id = directory.get_bucket_page_id(bucket_idx);

        if bucket_page_id == INVALID_PAGE_ID {
            return false;
        }

        let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id) else {
            return false;
        };
        let mut bucket: ExtendibleHTableBucketPage<K, V> = bucket_guard.as_page();

        if !bucket.remove(key, &self.cmp) {
            return false;
        }
        bucket_guard.set_page(&bucket);
        let now_empty = bucket.is_empty();
        drop(bucket_guard);

        if now_empty {
            self.merge(&mut directory, bucket_idx);
            directory_guard.set_page(&directory);
        }
        true
    }

    /// Folds the (now empty) bucket at `bucket_idx` into its split image,
    /// repeating up the depth chain while one side of each pair is empty.
    ///
    /// Merging a pair requires equal local depths; the non-empty side
    /// survives (the smaller index when both are empty). Every directory
    /// slot still naming the dead page is redirected, the dead page is
    /// returned to the pool, and the directory shrinks whenever all live
    /// slots allow it.
    fn merge(&self, directory: &mut ExtendibleHTableDirectoryPage, mut bucket_idx: u32) {
        loop {
            if directory.get_local_depth(bucket_idx) == 0 {
                break;
            }

            let split_idx = directory.get_split_image_index(bucket_idx);
            if directory.get_local_depth(split_idx) != directory.get_local_depth(bucket_idx) {
                break;
            }

            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
            let split_page_id = directory.get_bucket_page_id(split_idx);

            let Some(bucket_guard) = self.bpm.fetch_page_write(bucket_page_id) else {
                break;
            };
            let Some(split_guard) = self.bpm.fetch_page_write(split_page_id) else {
                break;
            };
            let bucket: ExtendibleHTableBucketPage<K, V> = bucket_guard.as_page();
            let split_bucket: ExtendibleHTableBucketPage<K, V> = split_guard.as_page();

            if !bucket.is_empty() && !split_bucket.is_empty() {
                break;
            }

            let merge_idx = bucket_idx.min(split_idx);
            let (survivor_page_id, dead_page_id) = if bucket.is_empty() && split_bucket.is_empty() {
                let dead_idx = bucket_idx.max(split_idx);
                (
                    directory.get_bucket_page_id(merge_idx),
                    directory.get_bucket_page_id(dead_idx),
                )
            } else if bucket.is_empty() {
                (split_page_id, bucket_page_id)
            } else {
                (bucket_page_id, split_page_id)
            };
            drop(split_guard);
            drop(bucket_guard);

            directory.decr_local_depth(bucket_idx);
            directory.decr_local_depth(split_idx);
            directory.set_bucket_page_id(bucket_idx, survivor_page_id);
            directory.set_bucket_page_id(split_idx, survivor_page_id);

            // Aliases outside the canonical pair may still name the dead page.
            let merged_depth = directory.get_local_depth(bucket_idx) as u8;
            for i in 0..directory.size() {
                if directory.get_bucket_page_id(i) == dead_page_id {
                    directory.set_bucket_page_id(i, survivor_page_id);
                    directory.set_local_depth(i, merged_depth);
                }
            }

            if dead_page_id != survivor_page_id {
                self.bpm.delete_page(dead_page_id);
                debug!(
                    "table '{}': merged bucket page {} into {}",
                    self.index_name, dead_page_id, survivor_page_id
                );
            }

            if directory.can_shrink() {
                directory.decr_global_depth();
            }

            // Continue from the survivor; mask the index back into the live
            // region in case the directory just shrank.
            bucket_idx = merge_idx & directory.get_global_depth_mask();
        }
    }

    /// Walks the header and asserts the structural invariants of every
    /// reachable directory. Test and debugging aid.
    pub fn verify_integrity(&self) {
        let header_guard = self
            .bpm
            .fetch_page_read(self.header_page_id)
            .expect("header page must be fetchable");
        let header: ExtendibleHTableHeaderPage = header_guard.as_page();
        drop(header_guard);

        for directory_idx in 0..header.max_size() {
            let directory_page_id = header.get_directory_page_id(directory_idx);
            if directory_page_id == INVALID_PAGE_ID {
                continue;
            }
            let directory_guard = self
                .bpm
                .fetch_page_read(directory_page_id)
                .expect("directory page must be fetchable");
            let directory: ExtendibleHTableDirectoryPage = directory_guard.as_page();
            directory.verify_integrity();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::buffer_pool_manager::BufferPoolManager;
    use crate::common::logger::initialize_logger;
    use crate::common::rid::Rid;
    use crate::container::comparator::OrdComparator;
    use crate::container::hash_function::XxHashFunction;
    use crate::storage::disk::disk_manager::MemoryDiskManager;

    const BUFFER_POOL_SIZE: usize = 50;
    const K: usize = 2;

    fn make_bpm() -> Arc<BufferPoolManager> {
        initialize_logger();
        let disk_manager = Arc::new(MemoryDiskManager::new());
        Arc::new(BufferPoolManager::new(BUFFER_POOL_SIZE, disk_manager, K))
    }

    #[test]
    fn test_insert_and_get() {
        let bpm = make_bpm();
        let ht = DiskExtendibleHashTable::<i64, Rid, _, _>::new(
            "test_table",
            bpm,
            OrdComparator::default(),
            XxHashFunction,
            4,
            4,
            4,
        )
        .unwrap();

        let rid1 = Rid::new(1, 0);
        let rid2 = Rid::new(2, 0);

        assert!(ht.insert(1, rid1));
        assert!(ht.insert(2, rid2));

        assert_eq!(ht.get(&1), Some(rid1));
        assert_eq!(ht.get(&2), Some(rid2));
        assert_eq!(ht.get(&3), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let bpm = make_bpm();
        let ht = DiskExtendibleHashTable::<i64, Rid, _, _>::new(
            "test_table",
            bpm,
            OrdComparator::default(),
            XxHashFunction,
            4,
            4,
            4,
        )
        .unwrap();

        assert!(ht.insert(7, Rid::new(7, 0)));
        assert!(!ht.insert(7, Rid::new(7, 1)));
        assert_eq!(ht.get(&7), Some(Rid::new(7, 0)));
    }

    #[test]
    fn test_remove() {
        let bpm = make_bpm();
        let ht = DiskExtendibleHashTable::<i64, Rid, _, _>::new(
            "test_table",
            bpm,
            OrdComparator::default(),
            XxHashFunction,
            4,
            4,
            4,
        )
        .unwrap();

        assert!(ht.insert(1, Rid::new(1, 1)));
        assert!(ht.remove(&1));
        assert_eq!(ht.get(&1), None);
        assert!(!ht.remove(&1));
    }

    #[test]
    fn test_bucket_splits_preserve_entries() {
        let bpm = make_bpm();
        // Bucket size 2 forces splits almost immediately.
        let ht = DiskExtendibleHashTable::<i64, Rid, _, _>::new(
            "test_table",
            bpm,
            OrdComparator::default(),
            XxHashFunction,
            4,
            4,
            2,
        )
        .unwrap();

        for i in 0..32 {
            assert!(ht.insert(i, Rid::new(i as u32, 0)), "failed to insert {}", i);
        }
        ht.verify_integrity();
        for i in 0..32 {
            assert_eq!(ht.get(&i), Some(Rid::new(i as u32, 0)), "failed to read {}", i);
        }
    }
}
