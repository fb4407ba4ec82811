//! Error types for calls against the archive services.

use thiserror::Error;

use super::synopsis::SynopsisError;
use crate::retry::{FailureType, Retryable, classify_http_status};

/// Errors that can occur while redeeming a token or resolving a download link.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection-level failure (DNS resolution, refused connection, reset).
    #[error("network error calling {url}: {source}")]
    Network {
        /// The URL that was being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before a response arrived.
    #[error("timeout calling {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with something other than 200.
    #[error("server returned HTTP {status} for {url}: {body}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The response body was not the JSON document expected.
    #[error("could not understand server response from {url}: {source}")]
    Malformed {
        /// The URL whose body could not be decoded.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A required field of the link response was absent.
    #[error("{field} field was missing from the server response")]
    MissingField {
        /// Wire name of the missing field.
        field: &'static str,
    },

    /// A required field of the link response had the wrong shape.
    #[error("{field} field was not correctly formatted: {reason}")]
    InvalidField {
        /// Wire name of the malformed field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The server kept answering 502/503/504 past the retry ceiling.
    #[error("{message} (gave up on {operation} after {attempts} attempts)")]
    Exhausted {
        /// Which call gave up.
        operation: &'static str,
        /// Call-site specific terminal message.
        message: &'static str,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The summary stream could not be read or decoded.
    #[error("could not retrieve download synopsis from {url}: {source}")]
    Synopsis {
        /// The summary stream URL.
        url: String,
        /// The decode or read failure.
        #[source]
        source: SynopsisError,
    },
}

impl RemoteError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a malformed-body error.
    pub fn malformed(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid-field error.
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a retry-exhausted error.
    pub fn exhausted(operation: &'static str, message: &'static str, attempts: u32) -> Self {
        Self::Exhausted {
            operation,
            message,
            attempts,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for RemoteError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::HttpStatus { status, .. } => {
                classify_http_status(*status).unwrap_or(FailureType::Permanent)
            }
            Self::Timeout { .. } => FailureType::Transient,
            Self::Network { source, .. } => {
                if is_tls_error(source) {
                    FailureType::Permanent
                } else {
                    FailureType::Transient
                }
            }
            Self::Malformed { .. }
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::Exhausted { .. }
            | Self::Synopsis { .. } => FailureType::Permanent,
        }
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
pub(crate) fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        for status in [502, 503, 504] {
            let err = RemoteError::http_status("http://vault/api/bulk/t", status, "");
            assert_eq!(err.failure_type(), FailureType::Transient);
        }
        for status in [400, 403, 404, 500] {
            let err = RemoteError::http_status("http://vault/api/bulk/t", status, "");
            assert_eq!(err.failure_type(), FailureType::Permanent);
        }
    }

    #[test]
    fn test_field_errors_are_permanent() {
        let err = RemoteError::MissingField {
            field: "restoreStatus",
        };
        assert_eq!(err.failure_type(), FailureType::Permanent);
        assert!(err.to_string().contains("restoreStatus"));

        let err = RemoteError::invalid_field("downloadLink", "expected a string");
        assert_eq!(err.failure_type(), FailureType::Permanent);
        assert!(err.to_string().contains("downloadLink"));
    }

    #[test]
    fn test_exhausted_display_carries_message_and_attempts() {
        let err = RemoteError::exhausted("redeem", "server was not available", 11);
        let msg = err.to_string();
        assert!(msg.contains("server was not available"), "{msg}");
        assert!(msg.contains("11"), "{msg}");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_status_accessor() {
        let err = RemoteError::http_status("http://vault/x", 404, "nope");
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("nope"));
    }
}
