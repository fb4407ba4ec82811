//! Download token parsing.
//!
//! A token handed to the tool is either a bare opaque string, which always
//! designates the VaultDoor backend, or a structured URI of the form
//! `archivehunter:<subtype>:<token>` where the subtype picks the backend.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Scheme literal every structured token must carry.
pub const TOKEN_SCHEME: &str = "archivehunter";

/// Subtype selecting the VaultDoor backend.
pub const VAULTDOOR_SUBTYPE: &str = "vaultdownload";

/// Subtype selecting the ArchiveHunter backend.
pub const ARCHIVEHUNTER_SUBTYPE: &str = "bulkdownload";

/// Remote service a token is redeemed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Legacy single-phase service (`/api/bulk/{token}`).
    VaultDoor,
    /// Two-phase service (`/api/bulkv2/{token}` plus summary stream).
    ArchiveHunter,
}

impl Backend {
    /// Returns the stable lowercase label for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VaultDoor => "vaultdoor",
            Self::ArchiveHunter => "archivehunter",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while parsing a token string. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token string was empty.
    #[error("download token is empty")]
    Empty,

    /// A structured URI did not split into exactly three segments.
    #[error("malformed download URI: expected 3 ':'-separated parts, got {found}")]
    SegmentCount {
        /// Number of segments found.
        found: usize,
    },

    /// The scheme segment was not [`TOKEN_SCHEME`].
    #[error("download URI scheme '{scheme}' is not '{TOKEN_SCHEME}'")]
    UnknownScheme {
        /// The scheme that was supplied.
        scheme: String,
    },

    /// The subtype segment named neither backend.
    #[error("download URI subtype '{subtype}' is valid for neither VaultDoor nor ArchiveHunter")]
    UnknownSubtype {
        /// The subtype that was supplied.
        subtype: String,
    },
}

/// A validated download token and the backend it designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadToken {
    backend: Backend,
    token: String,
}

impl DownloadToken {
    /// Creates a token for an explicit backend.
    pub fn new(backend: Backend, token: impl Into<String>) -> Self {
        Self {
            backend,
            token: token.into(),
        }
    }

    /// Parses a bare token or a structured `archivehunter:subtype:token` URI.
    ///
    /// Any input containing `':'` is treated as a structured URI.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the input is empty, has the wrong number of
    /// segments, or names an unknown scheme or subtype.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        if input.is_empty() {
            return Err(TokenError::Empty);
        }
        if !input.contains(':') {
            return Ok(Self::new(Backend::VaultDoor, input));
        }

        let parts: Vec<&str> = input.split(':').collect();
        let [scheme, subtype, token] = parts.as_slice() else {
            return Err(TokenError::SegmentCount { found: parts.len() });
        };

        if *scheme != TOKEN_SCHEME {
            return Err(TokenError::UnknownScheme {
                scheme: (*scheme).to_string(),
            });
        }

        let backend = match *subtype {
            VAULTDOOR_SUBTYPE => Backend::VaultDoor,
            ARCHIVEHUNTER_SUBTYPE => Backend::ArchiveHunter,
            other => {
                return Err(TokenError::UnknownSubtype {
                    subtype: other.to_string(),
                });
            }
        };

        Ok(Self::new(backend, *token))
    }

    /// Returns the backend this token is redeemed against.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Returns the opaque token value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl FromStr for DownloadToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DownloadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subtype = match self.backend {
            Backend::VaultDoor => VAULTDOOR_SUBTYPE,
            Backend::ArchiveHunter => ARCHIVEHUNTER_SUBTYPE,
        };
        write!(f, "{TOKEN_SCHEME}:{subtype}:{}", self.token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_token_is_vaultdoor() {
        let token = DownloadToken::parse("abc123").unwrap();
        assert_eq!(token.backend(), Backend::VaultDoor);
        assert_eq!(token.token(), "abc123");
    }

    #[test]
    fn test_structured_vaultdownload() {
        let token = DownloadToken::parse("archivehunter:vaultdownload:xyz").unwrap();
        assert_eq!(token.backend(), Backend::VaultDoor);
        assert_eq!(token.token(), "xyz");
    }

    #[test]
    fn test_structured_bulkdownload() {
        let token: DownloadToken = "archivehunter:bulkdownload:xyz".parse().unwrap();
        assert_eq!(token.backend(), Backend::ArchiveHunter);
        assert_eq!(token.token(), "xyz");
    }

    #[test]
    fn test_wrong_segment_count_rejected() {
        assert_eq!(
            DownloadToken::parse("archivehunter:bulkdownload"),
            Err(TokenError::SegmentCount { found: 2 })
        );
        assert_eq!(
            DownloadToken::parse("archivehunter:bulkdownload:a:b"),
            Err(TokenError::SegmentCount { found: 4 })
        );
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        assert!(matches!(
            DownloadToken::parse("vaultdoor:bulkdownload:xyz"),
            Err(TokenError::UnknownScheme { .. })
        ));
    }

    #[test]
    fn test_unknown_subtype_rejected() {
        let err = DownloadToken::parse("archivehunter:other:xyz").unwrap_err();
        assert_eq!(
            err,
            TokenError::UnknownSubtype {
                subtype: "other".to_string()
            }
        );
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(DownloadToken::parse(""), Err(TokenError::Empty));
    }

    #[test]
    fn test_display_round_trips_structured_form() {
        let token = DownloadToken::parse("abc123").unwrap();
        assert_eq!(token.to_string(), "archivehunter:vaultdownload:abc123");
    }
}
