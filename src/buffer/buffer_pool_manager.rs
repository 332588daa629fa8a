use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::buffer::lru_k_replacer::LruKReplacer;
use crate::common::config::{FrameId, INVALID_PAGE_ID, PageId};
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::disk::disk_scheduler::{DiskRequest, DiskScheduler};
use crate::storage::page::page::Page;
use crate::storage::page::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};

/// Residency metadata for one frame. Lives under the pool latch, separate
/// from the frame's byte contents, so pins can change while a guard holds
/// the content latch.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl FrameMeta {
    fn new() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

struct PoolState {
    frames: Vec<FrameMeta>,
    /// Single source of truth for residency: page id -> frame holding it.
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// Mediates between logical disk pages and a fixed pool of in-memory
/// frames.
///
/// Pages are handed out through guards that own one pin each; a page cannot
/// be evicted while pinned. Frame selection prefers the free list and falls
/// back to the LRU-K replacer. Dirty victims are written back through the
/// disk scheduler before their frame is reused.
pub struct BufferPoolManager {
    pool_size: usize,
    next_page_id: AtomicU32,
    /// Per-frame byte buffers behind their content latches. Guards latch
    /// these; the pool itself only touches a frame's bytes while the frame
    /// is unpinned or being loaded.
    frame_data: Vec<Arc<RwLock<Page>>>,
    state: Mutex<PoolState>,
    replacer: Mutex<LruKReplacer>,
    disk_scheduler: DiskScheduler,
    disk_manager: Arc<dyn DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>, replacer_k: usize) -> Self {
        let frame_data = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Page::new())))
            .collect();
        let state = PoolState {
            frames: (0..pool_size).map(|_| FrameMeta::new()).collect(),
            page_table: HashMap::new(),
            free_list: (0..pool_size).collect(),
        };

        Self {
            pool_size,
            next_page_id: AtomicU32::new(0),
            frame_data,
            state: Mutex::new(state),
            replacer: Mutex::new(LruKReplacer::new(pool_size, replacer_k)),
            disk_scheduler: DiskScheduler::new(Arc::clone(&disk_manager)),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Allocates a fresh page id and pins it into a frame, zeroed. Returns
    /// `None` when every frame is pinned.
    pub fn new_page(self: &Arc<Self>) -> Option<BasicPageGuard> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.allocate_page();

        let meta = &mut state.frames[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        state.page_table.insert(page_id, frame_id);

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        // The frame is not yet visible to any guard, so this cannot block.
        self.frame_data[frame_id].write().reset_memory();

        debug!("Created page {} in frame {}", page_id, frame_id);
        Some(BasicPageGuard::new(
            Arc::clone(self),
            Arc::clone(&self.frame_data[frame_id]),
            page_id,
        ))
    }

    /// Pins `page_id` into the pool, reading it from disk when it is not
    /// already resident. Returns `None` when every frame is pinned.
    pub fn fetch_page(self: &Arc<Self>, page_id: PageId) -> Option<BasicPageGuard> {
        if page_id == INVALID_PAGE_ID {
            return None;
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.frames[frame_id].pin_count += 1;
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
            return Some(BasicPageGuard::new(
                Arc::clone(self),
                Arc::clone(&self.frame_data[frame_id]),
                page_id,
            ));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        if !self.run_disk_request(false, frame_id, page_id) {
            panic!("disk read failed for page {}", page_id);
        }

        let meta = &mut state.frames[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        state.page_table.insert(page_id, frame_id);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);

        debug!("Fetched page {} into frame {}", page_id, frame_id);
        Some(BasicPageGuard::new(
            Arc::clone(self),
            Arc::clone(&self.frame_data[frame_id]),
            page_id,
        ))
    }

    /// Fetches a page and acquires its shared content latch.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Option<ReadPageGuard> {
        Some(self.fetch_page(page_id)?.upgrade_read())
    }

    /// Fetches a page and acquires its exclusive content latch.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Option<WritePageGuard> {
        Some(self.fetch_page(page_id)?.upgrade_write())
    }

    /// Releases one pin on a resident page, folding in the caller's dirty
    /// flag. The frame becomes evictable when its last pin is released.
    ///
    /// Returns false when the page is not resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let meta = &mut state.frames[frame_id];
        if meta.pin_count == 0 {
            return false;
        }

        meta.is_dirty |= is_dirty;
        meta.pin_count -= 1;
        if meta.pin_count == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a resident page to disk and clears its dirty bit. Returns
    /// false when the page is not resident.
    ///
    /// The write waits for a shared latch on the frame contents, with the
    /// pool latch held. Flush is meant for quiesced pages: the caller must
    /// not hold this page's write latch, and no other thread may sit on
    /// that latch while blocked on the pool.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        if page_id == INVALID_PAGE_ID {
            return false;
        }

        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        if !self.run_disk_request(true, frame_id, page_id) {
            panic!("disk write failed for page {}", page_id);
        }
        state.frames[frame_id].is_dirty = false;
        true
    }

    /// Writes every resident page to disk.
    pub fn flush_all_pages(&self) {
        let mut state = self.state.lock();
        let resident: Vec<(PageId, FrameId)> =
            state.page_table.iter().map(|(&p, &f)| (p, f)).collect();

        for (page_id, frame_id) in resident {
            if !self.run_disk_request(true, frame_id, page_id) {
                panic!("disk write failed for page {}", page_id);
            }
            state.frames[frame_id].is_dirty = false;
        }
    }

    /// Drops a page from the pool and tells the disk manager to reclaim it.
    ///
    /// Deleting a page that is not resident succeeds trivially; deleting a
    /// pinned page fails.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        if page_id == INVALID_PAGE_ID {
            return true;
        }

        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };

        if state.frames[frame_id].pin_count > 0 {
            return false;
        }

        state.page_table.remove(&page_id);
        state.frames[frame_id] = FrameMeta::new();
        state.free_list.push_back(frame_id);
        self.replacer.lock().remove(frame_id);
        self.frame_data[frame_id].write().reset_memory();
        self.disk_manager.deallocate_page(page_id);

        debug!("Deleted page {} from frame {}", page_id, frame_id);
        true
    }

    /// Current pin count of a resident page; `None` when not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = *state.page_table.get(&page_id)?;
        Some(state.frames[frame_id].pin_count)
    }

    fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Finds a frame for a new resident page: the free list first, then an
    /// eviction victim. A dirty victim is written back (blocking on the
    /// scheduler) before its page-table entry is removed.
    fn acquire_frame(&self, state: &mut MutexGuard<'_, PoolState>) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = self.replacer.lock().evict()?;
        let meta = &state.frames[frame_id];
        debug_assert_eq!(meta.pin_count, 0, "evicted a pinned frame");

        let old_page_id = meta.page_id;
        if meta.is_dirty {
            if !self.run_disk_request(true, frame_id, old_page_id) {
                panic!("disk write failed for evicted page {}", old_page_id);
            }
            state.frames[frame_id].is_dirty = false;
        }

        state.page_table.remove(&old_page_id);
        state.frames[frame_id].page_id = INVALID_PAGE_ID;
        debug!("Evicted page {} from frame {}", old_page_id, frame_id);
        Some(frame_id)
    }

    /// Schedules one request against the frame's buffer and blocks on its
    /// completion.
    fn run_disk_request(&self, is_write: bool, frame_id: FrameId, page_id: PageId) -> bool {
        let (callback, receiver) = DiskScheduler::create_promise();
        self.disk_scheduler.schedule(DiskRequest {
            is_write,
            data: Arc::clone(&self.frame_data[frame_id]),
            page_id,
            callback,
        });
        receiver.blocking_recv().unwrap_or(false)
    }
}
