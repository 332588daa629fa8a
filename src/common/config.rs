/// Logical identifier of a page on disk.
pub type PageId = u32;

/// Index of an in-memory frame in the buffer pool, in `[0, pool_size)`.
pub type FrameId = usize;

/// Sentinel page id meaning "no page".
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// Size of a data page in bytes.
pub const DB_PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool.
pub const BUFFER_POOL_SIZE: usize = 10;

/// Default lookback window for the LRU-K replacer.
pub const LRUK_REPLACER_K: usize = 10;

/// Default capacity of an extendible hash bucket page, in entries.
pub const BUCKET_SIZE: usize = 50;
