use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Result as IoResult;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info, trace};
use parking_lot::Mutex;

use crate::common::config::{DB_PAGE_SIZE, PageId};
use crate::common::error::StorageError;

/// Synchronous page-granular disk I/O, as consumed by the disk scheduler.
///
/// A page lives at byte offset `page_id * DB_PAGE_SIZE`. Reading a page that
/// was never written yields zeroes.
pub trait DiskManager: Send + Sync {
    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> IoResult<()>;
    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> IoResult<()>;

    /// Hint that a page is no longer referenced and its slot may be reused.
    fn deallocate_page(&self, page_id: PageId);
}

/// File-backed disk manager. All pages live in a single database file.
pub struct FileDiskManager {
    file_name: PathBuf,
    db_io: Mutex<File>,
    num_writes: AtomicU32,
    num_flushes: AtomicU32,
    num_deallocs: AtomicU32,
}

impl FileDiskManager {
    pub fn new(db_file: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_file = db_file.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_file)?;
        info!("Opened database file {}", db_file.display());

        Ok(Self {
            file_name: db_file.to_path_buf(),
            db_io: Mutex::new(file),
            num_writes: AtomicU32::new(0),
            num_flushes: AtomicU32::new(0),
            num_deallocs: AtomicU32::new(0),
        })
    }

    /// Flushes buffered data to the underlying file.
    pub fn shut_down(&self) -> IoResult<()> {
        self.db_io.lock().sync_all()?;
        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        debug!("Shut down disk manager for {}", self.file_name.display());
        Ok(())
    }

    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn get_num_flushes(&self) -> u32 {
        self.num_flushes.load(Ordering::SeqCst)
    }

    pub fn get_num_deallocs(&self) -> u32 {
        self.num_deallocs.load(Ordering::SeqCst)
    }

    pub fn get_file_size(&self) -> IoResult<u64> {
        Ok(self.file_name.metadata()?.len())
    }
}

impl DiskManager for FileDiskManager {
    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> IoResult<()> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        trace!("Writing page {} at offset {}", page_id, offset);

        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(offset))?;
        db_io.write_all(page_data)?;
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> IoResult<()> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        trace!("Reading page {} at offset {}", page_id, offset);

        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < DB_PAGE_SIZE {
            let n = db_io.read(&mut page_data[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        // A page past the current end of file reads back as zeroes.
        page_data[total..].fill(0);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        // Space is not reclaimed; the slot is simply forgotten.
        debug!("Deallocated page {}", page_id);
        self.num_deallocs.fetch_add(1, Ordering::SeqCst);
    }
}

/// Disk manager keeping every page in memory. Used by tests and tools that
/// do not care about durability.
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8; DB_PAGE_SIZE]>>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> IoResult<()> {
        let mut pages = self.pages.lock();
        pages.insert(page_id, Box::new(*page_data));
        Ok(())
    }

    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> IoResult<()> {
        let pages = self.pages.lock();
        match pages.get(&page_id) {
            Some(stored) => page_data.copy_from_slice(&stored[..]),
            None => page_data.fill(0),
        }
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
    }
}
