//! Shared HTTP client construction policy.
//!
//! One `reqwest::Client` is built per run and cloned into the redemption
//! client and every download worker, so all traffic shares the same timeouts,
//! compression and connection pool.
//!
//! Proxies come from reqwest's own environment lookup (`HTTP_PROXY`,
//! `HTTPS_PROXY`, `ALL_PROXY`), which also honours `NO_PROXY`. Do not add
//! explicit `Proxy` entries to the builder: they replace that lookup.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tracing::debug;

use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Builds the shared HTTP client with default timeouts.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the TLS backend or proxy
/// configuration cannot be initialised.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    build_http_client_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
}

/// Builds the shared HTTP client with explicit timeout values.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when client construction fails.
pub fn build_http_client_with_timeouts(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    debug!(
        connect_timeout_secs,
        read_timeout_secs, "building HTTP client"
    );
    base_client_builder(connect_timeout_secs, read_timeout_secs).build()
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}
