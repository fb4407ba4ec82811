//! Bulkpull Core Library
//!
//! Client side of the archive bulk download protocol: a short-lived token is
//! redeemed for a manifest of files, and every file is fetched to local disk by
//! a bounded pool of workers.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`token`] - Download token parsing and backend selection
//! - [`remote`] - Redemption, summary stream decoding and link resolution
//! - [`download`] - Worker pool, streaming transfer and filesystem checks
//! - [`retry`] - Fixed-delay retry shared by every remote call
//! - [`config`] - YAML configuration file
//! - [`format`] - Byte-size formatting for log output

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod format;
pub mod http_client;
pub mod remote;
pub mod retry;
pub mod token;
mod user_agent;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use download::{DownloadError, DownloadPool, PoolError, PoolOptions, PoolStats};
pub use format::format_byte_size;
pub use http_client::build_http_client;
pub use remote::{Communicator, Manifest, ManifestEntry, RemoteError};
pub use retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy};
pub use token::{Backend, DownloadToken, TokenError};
