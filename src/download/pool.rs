//! Fixed-size worker pool turning manifest entries into files on disk.
//!
//! # Concurrency Model
//!
//! - `workers` Tokio tasks share one bounded `mpsc` channel of [`WorkItem`]s
//! - The receiver sits behind an async mutex held only while receiving, so each
//!   item reaches exactly one worker
//! - [`DownloadPool::shutdown`] sends one [`WorkItem::Shutdown`] per worker;
//!   in-flight transfers finish, there is no mid-transfer cancellation
//! - Per-entry failures are logged and counted, never propagated to siblings
//!
//! # Per-entry flow
//!
//! resolve link, gate on restore status, check the destination, create
//! directories, then transfer with the fixed-delay retry policy.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::client::{TransferClient, TransferOutcome};
use super::error::DownloadError;
use super::fs::{build_target_path, normalize_base_path, prepare_directories, verify_target};
use crate::remote::{Communicator, ManifestEntry, ResolvedLink, RestoreStatus, make_absolute_url};
use crate::retry::{RetryError, RetryPolicy, run_with_retry};

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 100;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 5;

/// Default capacity of the hand-off queue.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Error type for pool lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The rejected value.
        value: usize,
    },

    /// Invalid queue capacity provided.
    #[error("invalid queue size {value}: must be at least 1")]
    InvalidQueueSize {
        /// The rejected value.
        value: usize,
    },

    /// Every worker has exited, so nothing can be enqueued.
    #[error("download queue is closed")]
    QueueClosed,
}

/// Message carried by the hand-off queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// An entry to download.
    Entry(ManifestEntry),
    /// Tells the receiving worker to exit.
    Shutdown,
}

/// Terminal state of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The file was written.
    Completed(TransferOutcome),
    /// The content is not restored yet, or the restore failed.
    Blocked(RestoreStatus),
}

/// Pool sizing and overwrite policy.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Capacity of the hand-off queue.
    pub queue_size: usize,
    /// Whether existing destination files may be replaced.
    pub allow_overwrite: bool,
    /// Retry policy applied to each transfer.
    pub retry_policy: RetryPolicy,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            allow_overwrite: false,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Statistics from a pool run.
///
/// Atomic counters updated by the workers; read them after
/// [`DownloadPool::shutdown`] with `wait` set for final values.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    blocked: AtomicUsize,
    retried: AtomicUsize,
}

impl PoolStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of files written.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of entries abandoned after an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of entries skipped on restore status.
    #[must_use]
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Returns the number of transfer retries made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Returns the number of entries that reached a terminal state.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.blocked()
    }

    /// Returns true when every processed entry was written.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.failed() == 0 && self.blocked() == 0
    }

    fn record(&self, outcome: &Result<EntryOutcome, DownloadError>) {
        let counter = match outcome {
            Ok(EntryOutcome::Completed(_)) => &self.completed,
            Ok(EntryOutcome::Blocked(_)) => &self.blocked,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// State shared by every worker. Immutable once the pool has started.
#[derive(Debug)]
struct Worker {
    communicator: Communicator,
    transfer: TransferClient,
    session_token: String,
    base_path: String,
    allow_overwrite: bool,
    retry_policy: RetryPolicy,
    stats: Arc<PoolStats>,
}

/// Bounded pool of download workers fed through a hand-off queue.
///
/// # Example
///
/// ```no_run
/// use bulkpull_core::download::{DownloadPool, PoolOptions};
/// use bulkpull_core::remote::Communicator;
/// use bulkpull_core::token::DownloadToken;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let token = DownloadToken::parse("abc123")?;
/// let comm = Communicator::new(
///     Url::parse("https://vaultdoor.example.com")?,
///     Url::parse("https://archivehunter.example.com")?,
///     token.backend(),
///     reqwest::Client::new(),
/// );
/// let manifest = comm.redeem(&token).await?;
/// let pool = DownloadPool::start(comm, &manifest.retrieval_token, "./downloads", PoolOptions::default())?;
/// for entry in manifest.entries {
///     pool.enqueue(entry).await?;
/// }
/// let stats = pool.shutdown(true).await;
/// println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DownloadPool {
    sender: mpsc::Sender<WorkItem>,
    handles: Vec<JoinHandle<()>>,
    live_workers: Arc<AtomicUsize>,
    stats: Arc<PoolStats>,
    worker_count: usize,
}

impl DownloadPool {
    /// Spawns the workers and returns the running pool.
    ///
    /// Must be called from within a Tokio runtime. Trailing separators are
    /// stripped from `base_path`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWorkerCount`] outside 1..=100 and
    /// [`PoolError::InvalidQueueSize`] for a zero capacity.
    #[instrument(skip(communicator, session_token, options))]
    pub fn start(
        communicator: Communicator,
        session_token: &str,
        base_path: &str,
        options: PoolOptions,
    ) -> Result<Self, PoolError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&options.workers) {
            return Err(PoolError::InvalidWorkerCount {
                value: options.workers,
            });
        }
        if options.queue_size == 0 {
            return Err(PoolError::InvalidQueueSize { value: 0 });
        }

        debug!(
            workers = options.workers,
            queue_size = options.queue_size,
            allow_overwrite = options.allow_overwrite,
            "initialising download workers"
        );

        let stats = Arc::new(PoolStats::new());
        let worker = Arc::new(Worker {
            transfer: TransferClient::new(communicator.client().clone()),
            communicator,
            session_token: session_token.to_string(),
            base_path: normalize_base_path(base_path),
            allow_overwrite: options.allow_overwrite,
            retry_policy: options.retry_policy,
            stats: Arc::clone(&stats),
        });

        let (sender, receiver) = mpsc::channel(options.queue_size);
        let receiver = Arc::new(Mutex::new(receiver));
        let live_workers = Arc::new(AtomicUsize::new(options.workers));

        let handles = (0..options.workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&worker),
                    Arc::clone(&receiver),
                    Arc::clone(&live_workers),
                ))
            })
            .collect();

        Ok(Self {
            sender,
            handles,
            live_workers,
            stats,
            worker_count: options.workers,
        })
    }

    /// Queues an entry, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::QueueClosed`] when no worker is left to receive it.
    pub async fn enqueue(&self, entry: ManifestEntry) -> Result<(), PoolError> {
        debug!(entry_id = %entry.entry_id, "enqueueing entry");
        self.sender
            .send(WorkItem::Entry(entry))
            .await
            .map_err(|_| PoolError::QueueClosed)
    }

    /// Returns the number of workers that have not exited yet.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Returns the configured number of workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Returns the run statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Stops accepting work and tells every worker to exit once the queue ahead
    /// of its shutdown message is drained.
    ///
    /// With `wait` set this returns only after every worker has exited; without
    /// it the workers keep running detached and the caller may abandon them.
    pub async fn shutdown(self, wait: bool) -> Arc<PoolStats> {
        info!(workers = self.worker_count, wait, "shutting down download pool");
        for _ in 0..self.worker_count {
            if self.sender.send(WorkItem::Shutdown).await.is_err() {
                break;
            }
        }

        if wait {
            for handle in self.handles {
                // A panicking worker is logged; the others still finish.
                if let Err(e) = handle.await {
                    warn!(error = %e, "download worker panicked");
                }
            }
            let stats = &self.stats;
            info!(
                completed = stats.completed(),
                failed = stats.failed(),
                blocked = stats.blocked(),
                retried = stats.retried(),
                "all download workers finished"
            );
        }

        self.stats
    }
}

async fn worker_loop(
    id: usize,
    worker: Arc<Worker>,
    receiver: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    live_workers: Arc<AtomicUsize>,
) {
    debug!(worker = id, "download worker started");
    loop {
        let item = receiver.lock().await.recv().await;
        let entry = match item {
            Some(WorkItem::Entry(entry)) => entry,
            Some(WorkItem::Shutdown) | None => break,
        };

        let outcome = worker.process_entry(&entry).await;
        if let Err(e) = &outcome {
            error!(
                worker = id,
                entry_id = %entry.entry_id,
                path = %entry.path,
                error = %e,
                "could not download entry"
            );
        }
        worker.stats.record(&outcome);
    }
    live_workers.fetch_sub(1, Ordering::SeqCst);
    info!(worker = id, "download worker terminating");
}

impl Worker {
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    async fn process_entry(&self, entry: &ManifestEntry) -> Result<EntryOutcome, DownloadError> {
        info!(path = %entry.path, "getting download link");
        let link = self
            .communicator
            .resolve_link(&self.session_token, &entry.entry_id)
            .await
            .map_err(|e| DownloadError::resolve(&entry.entry_id, e))?;

        if !link.restore_status.is_ready() {
            if let RestoreStatus::Unknown(code) = &link.restore_status {
                warn!(path = %entry.path, code = %code, "unrecognised restore status, not downloading");
            } else {
                error!(
                    path = %entry.path,
                    restore_status = %link.restore_status,
                    "not available to download"
                );
            }
            return Ok(EntryOutcome::Blocked(link.restore_status));
        }

        info!(path = %entry.path, "available to download");
        self.perform_download(entry, &link)
            .await
            .map(EntryOutcome::Completed)
    }

    /// The link is resolved once per entry and reused across transfer retries;
    /// it is deliberately not re-resolved between attempts.
    async fn perform_download(
        &self,
        entry: &ManifestEntry,
        link: &ResolvedLink,
    ) -> Result<TransferOutcome, DownloadError> {
        let target: PathBuf = build_target_path(&self.base_path, &entry.path)?;
        debug!(target = %target.display(), "resolved download target");

        let url = make_absolute_url(self.communicator.active_url(), &link.download_link);

        verify_target(&target, self.allow_overwrite).await?;
        prepare_directories(&target).await?;

        let outcome = run_with_retry(&self.retry_policy, "transfer", |attempt| {
            if attempt > 1 {
                self.stats.increment_retried();
            }
            self.transfer.transfer(&url, &target, entry.file_size)
        })
        .await
        .map_err(|e| match e {
            RetryError::Permanent { source, .. } => source,
            RetryError::Exhausted { attempts, .. } => DownloadError::Exhausted {
                url: url.to_string(),
                attempts,
            },
        })?;

        info!(target = %target.display(), bytes = outcome.bytes_written, "completed download");
        Ok(outcome)
    }
}
