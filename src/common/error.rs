use thiserror::Error;

use crate::common::config::PageId;

/// Failures surfaced by storage-layer constructors and setup paths.
///
/// Steady-state operations keep their `bool`/`Option` contracts: capacity
/// shortfalls are reported through return values, and I/O failures observed
/// mid-operation are fatal for the calling thread.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer pool exhausted while allocating page for {0}")]
    PoolExhausted(&'static str),
    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
