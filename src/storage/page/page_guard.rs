use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{DB_PAGE_SIZE, PageId};
use crate::storage::page::page::{Page, PageLayout};

type FrameRef = Arc<RwLock<Page>>;
type ReadLatch = ArcRwLockReadGuard<RawRwLock, Page>;
type WriteLatch = ArcRwLockWriteGuard<RawRwLock, Page>;

/// Scoped ownership of exactly one pin on a buffer-pool frame.
///
/// Dropping the guard unpins the page, passing along whether this guard
/// dirtied it. Guards are move-only; upgrading transfers the pin into a
/// latched guard and leaves this one empty, so the pin is released exactly
/// once on every exit path.
pub struct BasicPageGuard {
    bpm: Option<Arc<BufferPoolManager>>,
    frame: Option<FrameRef>,
    page_id: PageId,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, frame: FrameRef, page_id: PageId) -> Self {
        Self {
            bpm: Some(bpm),
            frame: Some(frame),
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    fn frame(&self) -> &FrameRef {
        self.frame.as_ref().expect("page guard already released")
    }

    /// Runs `f` over the page bytes under a transient shared latch.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8; DB_PAGE_SIZE]) -> R) -> R {
        let page = self.frame().read();
        f(page.data())
    }

    /// Runs `f` over the page bytes under a transient exclusive latch and
    /// marks the page dirty.
    pub fn with_data_mut<R>(&mut self, f: impl FnOnce(&mut [u8; DB_PAGE_SIZE]) -> R) -> R {
        self.is_dirty = true;
        let frame = self.frame.as_ref().expect("page guard already released");
        let mut page = frame.write();
        f(page.data_mut())
    }

    /// Materializes the page as a typed structure.
    pub fn as_page<T: PageLayout>(&self) -> T {
        self.with_data(|data| T::load(data))
    }

    /// Stores a typed structure back into the page and marks it dirty.
    pub fn set_page<T: PageLayout>(&mut self, page: &T) {
        self.with_data_mut(|data| page.store(data));
    }

    /// Consumes the guard, additionally acquiring the frame's shared latch.
    /// The pin moves into the returned guard.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let bpm = self.bpm.take();
        let frame = self.frame.take();
        let latch = frame.as_ref().map(|frame| frame.read_arc());
        ReadPageGuard {
            latch,
            guard: BasicPageGuard {
                bpm,
                frame,
                page_id: self.page_id,
                is_dirty: self.is_dirty,
            },
        }
    }

    /// Consumes the guard, additionally acquiring the frame's exclusive
    /// latch. The pin moves into the returned guard.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let bpm = self.bpm.take();
        let frame = self.frame.take();
        let latch = frame.as_ref().map(|frame| frame.write_arc());
        WritePageGuard {
            latch,
            guard: BasicPageGuard {
                bpm,
                frame,
                page_id: self.page_id,
                is_dirty: self.is_dirty,
            },
        }
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let (Some(bpm), Some(_frame)) = (self.bpm.take(), self.frame.take()) {
            bpm.unpin_page(self.page_id, self.is_dirty);
        }
    }
}

/// A pinned page held under its frame's shared latch.
pub struct ReadPageGuard {
    // Declared before `guard`: the latch must release before the pin does.
    latch: Option<ReadLatch>,
    guard: BasicPageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; DB_PAGE_SIZE] {
        self.latch
            .as_ref()
            .expect("read guard already released")
            .data()
    }

    pub fn as_page<T: PageLayout>(&self) -> T {
        T::load(self.data())
    }
}

/// A pinned page held under its frame's exclusive latch.
pub struct WritePageGuard {
    // Declared before `guard`: the latch must release before the pin does.
    latch: Option<WriteLatch>,
    guard: BasicPageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8; DB_PAGE_SIZE] {
        self.latch
            .as_ref()
            .expect("write guard already released")
            .data()
    }

    pub fn data_mut(&mut self) -> &mut [u8; DB_PAGE_SIZE] {
        self.guard.is_dirty = true;
        self.latch
            .as_mut()
            .expect("write guard already released")
            .data_mut()
    }

    pub fn as_page<T: PageLayout>(&self) -> T {
        T::load(self.data())
    }

    pub fn set_page<T: PageLayout>(&mut self, page: &T) {
        page.store(self.data_mut());
    }
}
