use std::collections::HashMap;
use std::fmt;

use crate::common::config::{DB_PAGE_SIZE, INVALID_PAGE_ID, PageId};
use crate::storage::codec::FixedWidthCodec;
use crate::storage::page::page::PageLayout;

/// Largest supported directory depth; bounds both parallel arrays so the
/// page always fits in `DB_PAGE_SIZE`.
pub const HTABLE_DIRECTORY_MAX_DEPTH: u32 = 9;
pub const HTABLE_DIRECTORY_ARRAY_SIZE: usize = 1 << HTABLE_DIRECTORY_MAX_DEPTH;

const _: () = assert!(8 + HTABLE_DIRECTORY_ARRAY_SIZE * (1 + 4) <= DB_PAGE_SIZE);

/// Middle level of the extendible hash table: maps a `global_depth`-bit hash
/// suffix to a bucket page id, and tracks per-slot local depths.
///
/// Only the first `1 << global_depth` slots are live. Every slot sharing a
/// bucket page shares that bucket's local depth.
///
/// On-page layout (little-endian): `max_depth: u32`, `global_depth: u32`,
/// `1 << max_depth` one-byte local depths, `1 << max_depth` 4-byte bucket
/// page ids.
pub struct ExtendibleHTableDirectoryPage {
    max_depth: u32,
    global_depth: u32,
    local_depths: Vec<u8>,
    bucket_page_ids: Vec<PageId>,
}

impl ExtendibleHTableDirectoryPage {
    pub fn new(max_depth: u32) -> Self {
        assert!(
            max_depth <= HTABLE_DIRECTORY_MAX_DEPTH,
            "directory max depth {} exceeds limit {}",
            max_depth,
            HTABLE_DIRECTORY_MAX_DEPTH
        );
        Self {
            max_depth,
            global_depth: 0,
            local_depths: vec![0; 1 << max_depth],
            bucket_page_ids: vec![INVALID_PAGE_ID; 1 << max_depth],
        }
    }

    /// Returns the bucket slot the hash routes to: the low `global_depth`
    /// bits.
    pub fn hash_to_bucket_index(&self, hash: u32) -> u32 {
        hash & self.get_global_depth_mask()
    }

    pub fn get_bucket_page_id(&self, bucket_idx: u32) -> PageId {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        self.bucket_page_ids[bucket_idx as usize]
    }

    pub fn set_bucket_page_id(&mut self, bucket_idx: u32, bucket_page_id: PageId) {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        self.bucket_page_ids[bucket_idx as usize] = bucket_page_id;
    }

    /// Returns the slot paired with `bucket_idx` at its current local depth:
    /// the index with bit `local_depth - 1` toggled.
    ///
    /// The local depth must be at least 1; at depth 0 a slot has no image.
    pub fn get_split_image_index(&self, bucket_idx: u32) -> u32 {
        let local_depth = self.get_local_depth(bucket_idx);
        assert!(local_depth >= 1, "split image undefined at local depth 0");
        bucket_idx ^ (1 << (local_depth - 1))
    }

    pub fn get_global_depth_mask(&self) -> u32 {
        (1 << self.global_depth) - 1
    }

    pub fn get_local_depth_mask(&self, bucket_idx: u32) -> u32 {
        (1 << self.get_local_depth(bucket_idx)) - 1
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn get_max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Doubles the live region. The upper half of both arrays becomes a copy
    /// of the lower half, so every existing bucket is reachable through both
    /// of its new aliases.
    pub fn incr_global_depth(&mut self) {
        assert!(
            self.global_depth < self.max_depth,
            "directory is already at max depth {}",
            self.max_depth
        );
        let old_size = self.size() as usize;
        self.global_depth += 1;
        for i in 0..old_size {
            self.local_depths[old_size + i] = self.local_depths[i];
            self.bucket_page_ids[old_size + i] = self.bucket_page_ids[i];
        }
    }

    pub fn decr_global_depth(&mut self) {
        assert!(self.can_shrink(), "directory cannot shrink");
        self.global_depth -= 1;
    }

    /// True when halving the live region loses no routing information, i.e.
    /// every live slot has a local depth strictly below the global depth.
    pub fn can_shrink(&self) -> bool {
        if self.global_depth == 0 {
            return false;
        }
        self.local_depths[..self.size() as usize]
            .iter()
            .all(|&local_depth| (local_depth as u32) < self.global_depth)
    }

    pub fn size(&self) -> u32 {
        1 << self.global_depth
    }

    pub fn max_size(&self) -> u32 {
        1 << self.max_depth
    }

    pub fn get_local_depth(&self, bucket_idx: u32) -> u32 {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        self.local_depths[bucket_idx as usize] as u32
    }

    pub fn set_local_depth(&mut self, bucket_idx: u32, local_depth: u8) {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        assert!(
            local_depth as u32 <= self.max_depth,
            "local depth {} exceeds max depth {}",
            local_depth,
            self.max_depth
        );
        self.local_depths[bucket_idx as usize] = local_depth;
    }

    /// Increments the slot's local depth, bounded by the global depth.
    pub fn incr_local_depth(&mut self, bucket_idx: u32) {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        let depth = self.local_depths[bucket_idx as usize] as u32;
        if depth < self.global_depth && depth < self.max_depth {
            self.local_depths[bucket_idx as usize] += 1;
        }
    }

    pub fn decr_local_depth(&mut self, bucket_idx: u32) {
        assert!(bucket_idx < self.size(), "bucket index {} out of bounds", bucket_idx);
        if self.local_depths[bucket_idx as usize] > 0 {
            self.local_depths[bucket_idx as usize] -= 1;
        }
    }

    /// Asserts the structural invariants of the live region:
    ///
    /// 1. every local depth is at most the global depth;
    /// 2. each bucket page is referenced by exactly
    ///    `2^(global_depth - local_depth)` slots;
    /// 3. slots sharing a bucket page agree on its local depth.
    pub fn verify_integrity(&self) {
        let mut pointer_counts: HashMap<PageId, u32> = HashMap::new();
        let mut depths: HashMap<PageId, u32> = HashMap::new();

        for bucket_idx in 0..self.size() {
            let local_depth = self.get_local_depth(bucket_idx);
            assert!(
                local_depth <= self.global_depth,
                "local depth {} at slot {} exceeds global depth {}",
                local_depth,
                bucket_idx,
                self.global_depth
            );

            let page_id = self.get_bucket_page_id(bucket_idx);
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            *pointer_counts.entry(page_id).or_insert(0) += 1;
            match depths.get(&page_id) {
                Some(&depth) => assert_eq!(
                    depth, local_depth,
                    "slots sharing bucket page {} disagree on local depth",
                    page_id
                ),
                None => {
                    depths.insert(page_id, local_depth);
                }
            }
        }

        for (page_id, count) in pointer_counts {
            let expected = 1u32 << (self.global_depth - depths[&page_id]);
            assert_eq!(
                count, expected,
                "bucket page {} is referenced by {} slots, expected {}",
                page_id, count, expected
            );
        }
    }
}

impl fmt::Display for ExtendibleHTableDirectoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======== DIRECTORY (global_depth: {}) ========", self.global_depth)?;
        writeln!(f, "| bucket_idx | page_id | local_depth |")?;
        for bucket_idx in 0..self.size() as usize {
            writeln!(
                f,
                "| {} | {} | {} |",
                bucket_idx, self.bucket_page_ids[bucket_idx], self.local_depths[bucket_idx]
            )?;
        }
        write!(f, "================ END DIRECTORY ================")
    }
}

impl PageLayout for ExtendibleHTableDirectoryPage {
    fn load(data: &[u8]) -> Self {
        let max_depth = u32::decode_from(&data[0..4]);
        assert!(
            max_depth <= HTABLE_DIRECTORY_MAX_DEPTH,
            "corrupt directory page: max depth {}",
            max_depth
        );
        let global_depth = u32::decode_from(&data[4..8]);
        assert!(
            global_depth <= max_depth,
            "corrupt directory page: global depth {} exceeds max depth {}",
            global_depth,
            max_depth
        );

        let count = 1usize << max_depth;
        let depths_base = 8;
        let ids_base = depths_base + count;

        let local_depths = data[depths_base..ids_base].to_vec();
        let mut bucket_page_ids = Vec::with_capacity(count);
        for i in 0..count {
            bucket_page_ids.push(PageId::decode_from(&data[ids_base + i * 4..]));
        }

        Self {
            max_depth,
            global_depth,
            local_depths,
            bucket_page_ids,
        }
    }

    fn store(&self, data: &mut [u8]) {
        self.max_depth.encode_to(&mut data[0..4]);
        self.global_depth.encode_to(&mut data[4..8]);

        let count = 1usize << self.max_depth;
        let depths_base = 8;
        let ids_base = depths_base + count;

        data[depths_base..ids_base].copy_from_slice(&self.local_depths);
        for (i, page_id) in self.bucket_page_ids.iter().enumerate() {
            page_id.encode_to(&mut data[ids_base + i * 4..]);
        }
    }
}
