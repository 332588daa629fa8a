#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use hematite::buffer::buffer_pool_manager::BufferPoolManager;
use hematite::common::logger::initialize_logger;
use hematite::storage::disk::disk_manager::{DiskManager, FileDiskManager};

/// Shared harness: a database file on a temp dir, a disk manager, and a
/// buffer pool. The temp dir (and with it the file) is removed on drop.
pub struct TestContext {
    pub disk_manager: Arc<FileDiskManager>,
    pub bpm: Arc<BufferPoolManager>,
    _temp_dir: TempDir,
}

impl TestContext {
    pub fn new(name: &str, pool_size: usize, replacer_k: usize) -> Self {
        initialize_logger();

        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join(format!("{name}.db"));
        let disk_manager =
            Arc::new(FileDiskManager::new(&db_path).expect("failed to open database file"));
        let bpm = Arc::new(BufferPoolManager::new(
            pool_size,
            Arc::clone(&disk_manager) as Arc<dyn DiskManager>,
            replacer_k,
        ));

        Self {
            disk_manager,
            bpm,
            _temp_dir: temp_dir,
        }
    }

    pub fn bpm(&self) -> Arc<BufferPoolManager> {
        Arc::clone(&self.bpm)
    }
}
