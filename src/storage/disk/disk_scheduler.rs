use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use log::error;
use parking_lot::RwLock;
use tokio::sync::oneshot;

use crate::common::config::PageId;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::page::Page;

/// One read or write to execute against the disk manager.
pub struct DiskRequest {
    /// True for a write of `data` to disk, false for a read into `data`.
    pub is_write: bool,

    /// The frame buffer being read into or written from.
    pub data: Arc<RwLock<Page>>,

    /// The page being read from / written to disk.
    pub page_id: PageId,

    /// Fulfilled with `true` once the request succeeds, `false` on an I/O
    /// failure.
    pub callback: oneshot::Sender<bool>,
}

/// Serializes disk requests onto a single background worker.
///
/// Requests are processed strictly in submission order across all callers.
/// Dropping the scheduler enqueues a sentinel, lets the worker drain the
/// queue, and joins it.
pub struct DiskScheduler {
    request_queue: Sender<Option<DiskRequest>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (request_queue, receiver) = channel();
        let worker = thread::Builder::new()
            .name("disk-scheduler".to_string())
            .spawn(move || Self::worker_loop(receiver, disk_manager))
            .expect("failed to spawn disk scheduler worker");

        Self {
            request_queue,
            worker: Some(worker),
        }
    }

    /// Enqueues a request. Non-blocking; completion is signalled through the
    /// request's callback.
    pub fn schedule(&self, request: DiskRequest) {
        // The worker only exits after receiving the shutdown sentinel, which
        // is sent from Drop, so the queue is always open here.
        self.request_queue
            .send(Some(request))
            .expect("disk scheduler worker is gone");
    }

    /// Creates the completion channel for a request.
    pub fn create_promise() -> (oneshot::Sender<bool>, oneshot::Receiver<bool>) {
        oneshot::channel()
    }

    fn worker_loop(receiver: Receiver<Option<DiskRequest>>, disk_manager: Arc<dyn DiskManager>) {
        while let Ok(Some(request)) = receiver.recv() {
            let result = if request.is_write {
                let page = request.data.read();
                disk_manager.write_page(request.page_id, page.data())
            } else {
                let mut page = request.data.write();
                disk_manager.read_page(request.page_id, page.data_mut())
            };

            if let Err(ref e) = result {
                error!(
                    "disk {} for page {} failed: {}",
                    if request.is_write { "write" } else { "read" },
                    request.page_id,
                    e
                );
            }

            // The issuer may have given up waiting; a dropped receiver is fine.
            let _ = request.callback.send(result.is_ok());
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Sentinel makes the worker drain everything queued before it and exit.
        let _ = self.request_queue.send(None);
        if let Some(worker) = self.worker.take() {
            worker.join().expect("disk scheduler worker panicked");
        }
    }
}
