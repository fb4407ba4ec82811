//! Download orchestration: worker pool, streaming transfer and the filesystem
//! checks made before each write.
//!
//! # Features
//!
//! - Bounded worker pool fed by a hand-off queue
//! - Restore-status gate before any transfer
//! - Streaming downloads (memory-efficient for large files)
//! - Overwrite protection and lazy directory creation
//! - Fixed-delay retry on 502/503/504
//! - Partial files removed when the body copy fails

mod client;
mod error;
mod fs;
mod pool;

pub use client::{TransferClient, TransferOutcome};
pub use error::DownloadError;
pub use fs::{build_target_path, normalize_base_path, prepare_directories, verify_target};
pub use pool::{
    DEFAULT_QUEUE_SIZE, DEFAULT_WORKERS, DownloadPool, EntryOutcome, PoolError, PoolOptions,
    PoolStats, WorkItem,
};
