//! Error types for the download module.
//!
//! Transfer errors carry the short messages operators see in the log
//! ("download not found", "server permission denied", ...) plus the URL or path
//! needed to act on them.

use std::path::PathBuf;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::retry::{FailureType, Retryable, classify_http_status};

/// Errors that can occur while downloading one manifest entry.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The destination exists and overwriting is disabled.
    #[error("file already exists: {path}")]
    AlreadyExists {
        /// The destination path.
        path: PathBuf,
    },

    /// The entry path would resolve outside the download directory.
    #[error("entry path escapes the download directory: {path}")]
    UnsafePath {
        /// The offending entry path.
        path: String,
    },

    /// A parent directory of the destination could not be created.
    #[error("could not create directory {path}: {source}")]
    CreateDirectory {
        /// The directory that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File system error while opening or writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server answered 404.
    #[error("download not found: {url}")]
    NotFound {
        /// The transfer URL.
        url: String,
    },

    /// The server answered 403.
    #[error("server permission denied: {url}")]
    PermissionDenied {
        /// The transfer URL.
        url: String,
    },

    /// The server answered 502, 503 or 504.
    #[error("server was not available (HTTP {status}): {url}")]
    Unavailable {
        /// The transfer URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Any other non-200 answer.
    #[error("server error (HTTP {status}): {url}")]
    ServerError {
        /// The transfer URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Connection-level failure before the response headers arrived.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The transfer URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The body stream broke off after the copy had started.
    #[error("download interrupted: {url}: {source}")]
    Interrupted {
        /// The transfer URL.
        url: String,
        /// The underlying body error.
        #[source]
        source: reqwest::Error,
    },

    /// The transfer kept hitting 502/503/504 past the retry ceiling.
    #[error("gave up after {attempts} attempts: {url}")]
    Exhausted {
        /// The transfer URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Link resolution failed.
    #[error("could not resolve download link for {entry_id}: {source}")]
    Resolve {
        /// The entry whose link was requested.
        entry_id: String,
        /// The underlying remote error.
        #[source]
        source: RemoteError,
    },
}

impl DownloadError {
    /// Creates an already-exists error.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Creates a directory-creation error.
    pub fn create_directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDirectory {
            path: path.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an error for a body stream that broke off mid-copy.
    pub fn interrupted(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Interrupted {
            url: url.into(),
            source,
        }
    }

    /// Creates a link resolution error.
    pub fn resolve(entry_id: impl Into<String>, source: RemoteError) -> Self {
        Self::Resolve {
            entry_id: entry_id.into(),
            source,
        }
    }

    /// Maps a non-200 transfer status to its error.
    pub fn from_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        match status {
            404 => Self::NotFound { url },
            403 => Self::PermissionDenied { url },
            502..=504 => Self::Unavailable { url, status },
            _ => Self::ServerError { url, status },
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::PermissionDenied { .. } => Some(403),
            Self::Unavailable { status, .. } | Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for DownloadError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::Network { .. } => FailureType::Transient,
            _ => self
                .status()
                .and_then(classify_http_status)
                .unwrap_or(FailureType::Permanent),
        }
    }
}
