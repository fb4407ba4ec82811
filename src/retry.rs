//! Retry logic with a fixed backoff for transient server failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types shared by
//! every call made against the archive services: token redemption, per-entry
//! link resolution and file transfer.
//!
//! # Overview
//!
//! A response status is classified with [`classify_http_status`]:
//! - `200` is a success
//! - `502`, `503` and `504` are [`FailureType::Transient`]
//! - anything else is [`FailureType::Permanent`]
//!
//! Transient failures are retried after a fixed delay (5 seconds by default)
//! until the attempt counter passes the configured ceiling (10 by default).
//! The failing attempt after that is reported as exhausted.
//!
//! # Example
//!
//! ```
//! use bulkpull_core::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

/// Default number of retries allowed after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The server is expected to recover (502/503/504, dropped connections).
    Transient,

    /// Retrying would not help (4xx, other non-200 codes, malformed bodies).
    Permanent,
}

/// Decision on whether to retry a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the call after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the call.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    /// Returns the failure classification for this error.
    fn failure_type(&self) -> FailureType;
}

/// Terminal outcome of [`run_with_retry`].
#[derive(Debug)]
pub enum RetryError<E> {
    /// The call failed with an error that is never retried.
    Permanent {
        /// The error returned by the final attempt.
        source: E,
        /// Number of attempts made, including the failing one.
        attempts: u32,
    },

    /// The call kept failing transiently until the retry ceiling was passed.
    Exhausted {
        /// The error returned by the final attempt.
        last: E,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Returns the number of attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Fixed-delay retry configuration.
///
/// # Default Values
///
/// - `max_retries`: 10
/// - `delay`: 5 seconds
///
/// Attempts are counted from 1. A transient failure on attempt `n` is retried
/// while `n <= max_retries`, so with defaults the eleventh failing attempt is
/// the one that gives up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    max_retries: u32,

    /// Delay between attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Creates a policy with a custom delay, keeping the default retry ceiling.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Returns the maximum number of retries configured.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the delay applied between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry a failed call.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt > self.max_retries {
            debug!(attempt, max = self.max_retries, "max retries reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies an HTTP status code returned by an archive service.
///
/// Returns `None` for `200`, which is the only status treated as success.
#[must_use]
pub fn classify_http_status(status: u16) -> Option<FailureType> {
    match status {
        200 => None,
        502..=504 => Some(FailureType::Transient),
        _ => Some(FailureType::Permanent),
    }
}

/// Runs `call` until it succeeds, fails permanently, or runs out of retries.
///
/// `call` receives the 1-indexed attempt number. Each transient failure is
/// logged with its attempt count and followed by a blocking sleep of the
/// policy delay; this suspends only the calling task.
///
/// # Errors
///
/// Returns [`RetryError::Permanent`] for errors classified as permanent and
/// [`RetryError::Exhausted`] once the retry ceiling has been passed.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let err = match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.should_retry(err.failure_type(), attempt) {
            RetryDecision::Retry { delay, attempt: next } => {
                warn!(
                    operation,
                    attempt,
                    next_attempt = next,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "server not available, retrying after a delay"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                if err.failure_type() == FailureType::Transient {
                    error!(operation, attempts = attempt, error = %err, "giving up");
                    return Err(RetryError::Exhausted {
                        last: err,
                        attempts: attempt,
                    });
                }
                error!(operation, attempt, error = %err, %reason, "call failed");
                return Err(RetryError::Permanent {
                    source: err,
                    attempts: attempt,
                });
            }
        }
    }
}
