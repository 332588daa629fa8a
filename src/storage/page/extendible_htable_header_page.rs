use crate::common::config::{DB_PAGE_SIZE, INVALID_PAGE_ID, PageId};
use crate::storage::codec::FixedWidthCodec;
use crate::storage::page::page::PageLayout;

/// Largest supported header depth; bounds the directory-page-id array so the
/// page always fits in `DB_PAGE_SIZE`.
pub const HTABLE_HEADER_MAX_DEPTH: u32 = 9;
pub const HTABLE_HEADER_ARRAY_SIZE: usize = 1 << HTABLE_HEADER_MAX_DEPTH;

const _: () = assert!(4 + HTABLE_HEADER_ARRAY_SIZE * 4 <= DB_PAGE_SIZE);

/// Top level of the extendible hash table: routes the upper `max_depth` bits
/// of a hash to a directory page.
///
/// On-page layout (little-endian): `max_depth: u32`, then `1 << max_depth`
/// 4-byte directory page ids.
pub struct ExtendibleHTableHeaderPage {
    max_depth: u32,
    directory_page_ids: Vec<PageId>,
}

impl ExtendibleHTableHeaderPage {
    pub fn new(max_depth: u32) -> Self {
        assert!(
            max_depth <= HTABLE_HEADER_MAX_DEPTH,
            "header max depth {} exceeds limit {}",
            max_depth,
            HTABLE_HEADER_MAX_DEPTH
        );
        Self {
            max_depth,
            directory_page_ids: vec![INVALID_PAGE_ID; 1 << max_depth],
        }
    }

    /// Returns the directory index the hash routes to: the top `max_depth`
    /// bits of the 32-bit hash. A zero-depth header routes everything to
    /// index 0.
    pub fn hash_to_directory_index(&self, hash: u32) -> u32 {
        if self.max_depth == 0 {
            return 0;
        }
        hash >> (32 - self.max_depth)
    }

    pub fn get_directory_page_id(&self, directory_idx: u32) -> PageId {
        self.directory_page_ids[directory_idx as usize]
    }

    pub fn set_directory_page_id(&mut self, directory_idx: u32, directory_page_id: PageId) {
        self.directory_page_ids[directory_idx as usize] = directory_page_id;
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of directory slots this header can address.
    pub fn max_size(&self) -> u32 {
        1 << self.max_depth
    }
}

impl PageLayout for ExtendibleHTableHeaderPage {
    fn load(data: &[u8]) -> Self {
        let max_depth = u32::decode_from(&data[0..4]);
        assert!(
            max_depth <= HTABLE_HEADER_MAX_DEPTH,
            "corrupt header page: max depth {}",
            max_depth
        );
        let count = 1usize << max_depth;
        let mut directory_page_ids = Vec::with_capacity(count);
        for i in 0..count {
            directory_page_ids.push(PageId::decode_from(&data[4 + i * 4..]));
        }
        Self {
            max_depth,
            directory_page_ids,
        }
    }

    fn store(&self, data: &mut [u8]) {
        self.max_depth.encode_to(&mut data[0..4]);
        for (i, page_id) in self.directory_page_ids.iter().enumerate() {
            page_id.encode_to(&mut data[4 + i * 4..]);
        }
    }
}
