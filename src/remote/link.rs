//! Per-entry download link resolution.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{error, instrument};
use url::Url;

use super::{Communicator, RemoteError, endpoint};
use crate::retry::{RetryError, run_with_retry};

/// Terminal message when link resolution keeps hitting 502/503/504.
const LINK_EXHAUSTED_MESSAGE: &str = "server not responding";

/// Remote-side staging state of an archived entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// Restore requested but not started.
    Pending,
    /// Restore in progress.
    Underway,
    /// Restore failed.
    Error,
    /// Content was never archived away; no restore needed.
    Unneeded,
    /// Content had already been restored.
    Already,
    /// Restore finished.
    Success,
    /// A status code this client does not know.
    Unknown(String),
}

impl RestoreStatus {
    /// Maps a wire code such as `RS_SUCCESS` to a status.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "RS_PENDING" => Self::Pending,
            "RS_UNDERWAY" => Self::Underway,
            "RS_ERROR" => Self::Error,
            "RS_UNNEEDED" => Self::Unneeded,
            "RS_ALREADY" => Self::Already,
            "RS_SUCCESS" => Self::Success,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the wire code.
    #[must_use]
    pub fn as_code(&self) -> &str {
        match self {
            Self::Pending => "RS_PENDING",
            Self::Underway => "RS_UNDERWAY",
            Self::Error => "RS_ERROR",
            Self::Unneeded => "RS_UNNEEDED",
            Self::Already => "RS_ALREADY",
            Self::Success => "RS_SUCCESS",
            Self::Unknown(code) => code,
        }
    }

    /// Returns true when the content can be transferred now.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Unneeded | Self::Already | Self::Success)
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A single-use download link for one entry. Fetched fresh per transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Status string reported by the server.
    pub status: String,
    /// Restore state gating the transfer.
    pub restore_status: RestoreStatus,
    /// Download link, resolved against the server that issued it.
    pub download_link: Url,
}

impl ResolvedLink {
    /// Decodes a link response body.
    ///
    /// The body must be a JSON object carrying string fields `status`,
    /// `restoreStatus` and `downloadLink`; the link must parse as a URL,
    /// either absolute or relative to `base`. A missing or mistyped field is
    /// an error, never a default.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Malformed`] for non-object bodies and
    /// [`RemoteError::MissingField`]/[`RemoteError::InvalidField`] naming the
    /// offending field.
    pub fn decode(body: &[u8], url: &str, base: &Url) -> Result<Self, RemoteError> {
        let mut object: Map<String, Value> =
            serde_json::from_slice(body).map_err(|e| RemoteError::malformed(url, e))?;

        let status: String = take_field(&mut object, "status")?;
        let restore_status: String = take_field(&mut object, "restoreStatus")?;
        let link: String = take_field(&mut object, "downloadLink")?;
        let download_link = base
            .join(&link)
            .map_err(|e| RemoteError::invalid_field("downloadLink", e.to_string()))?;

        Ok(Self {
            status,
            restore_status: RestoreStatus::from_code(&restore_status),
            download_link,
        })
    }
}

fn take_field<T: DeserializeOwned>(
    object: &mut Map<String, Value>,
    field: &'static str,
) -> Result<T, RemoteError> {
    let value = object
        .remove(field)
        .ok_or(RemoteError::MissingField { field })?;
    serde_json::from_value(value).map_err(|e| RemoteError::invalid_field(field, e.to_string()))
}

/// Builds the transfer URL from the issuing server's scheme, host and port and
/// the link's path, query and fragment.
#[must_use]
pub fn make_absolute_url(base: &Url, link: &Url) -> Url {
    let mut absolute = base.clone();
    absolute.set_path(link.path());
    absolute.set_query(link.query());
    absolute.set_fragment(link.fragment());
    absolute
}

impl Communicator {
    /// Resolves the one-time download link and restore state of an entry.
    ///
    /// Retried on 502/503/504 like redemption.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] for connection failures, permanent HTTP errors,
    /// exhausted retries, or a response missing any required field.
    #[instrument(skip(self, session_token))]
    pub async fn resolve_link(
        &self,
        session_token: &str,
        entry_id: &str,
    ) -> Result<ResolvedLink, RemoteError> {
        let url = endpoint(
            self.active_url(),
            &format!("api/bulk/{session_token}/get/{entry_id}"),
        );

        let body = run_with_retry(&self.retry_policy, "resolve_link", |_| {
            self.fetch_body(&url)
        })
        .await
        .map_err(|e| match e {
            RetryError::Permanent { source, .. } => source,
            RetryError::Exhausted { attempts, .. } => {
                RemoteError::exhausted("resolve_link", LINK_EXHAUSTED_MESSAGE, attempts)
            }
        })?;

        ResolvedLink::decode(&body, &url, self.active_url()).inspect_err(|e| {
            error!(
                url = %url,
                body = %String::from_utf8_lossy(&body),
                error = %e,
                "could not understand server response"
            );
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://vault.local:9000").unwrap()
    }

    #[test]
    fn test_restore_status_gate() {
        for code in ["RS_PENDING", "RS_UNDERWAY", "RS_ERROR", "RS_SOMETHING"] {
            assert!(!RestoreStatus::from_code(code).is_ready(), "{code}");
        }
        for code in ["RS_UNNEEDED", "RS_ALREADY", "RS_SUCCESS"] {
            assert!(RestoreStatus::from_code(code).is_ready(), "{code}");
        }
    }

    #[test]
    fn test_restore_status_code_round_trip() {
        assert_eq!(RestoreStatus::from_code("RS_ALREADY").to_string(), "RS_ALREADY");
        assert_eq!(RestoreStatus::from_code("RS_NEW").as_code(), "RS_NEW");
    }

    #[test]
    fn test_decode_relative_link() {
        let body = br#"{"status":"ok","restoreStatus":"RS_SUCCESS","downloadLink":"/api/bulk/dl/abc?sig=1"}"#;
        let link = ResolvedLink::decode(body, "http://x", &base()).unwrap();
        assert_eq!(link.status, "ok");
        assert_eq!(link.restore_status, RestoreStatus::Success);
        assert_eq!(
            link.download_link.as_str(),
            "http://vault.local:9000/api/bulk/dl/abc?sig=1"
        );
    }

    #[test]
    fn test_decode_absolute_link() {
        let body = br#"{"status":"ok","restoreStatus":"RS_UNNEEDED","downloadLink":"https://cdn.example.com/f.mov"}"#;
        let link = ResolvedLink::decode(body, "http://x", &base()).unwrap();
        assert_eq!(link.download_link.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_decode_missing_field_is_named() {
        let body = br#"{"status":"ok","downloadLink":"/f"}"#;
        let err = ResolvedLink::decode(body, "http://x", &base()).unwrap_err();
        assert!(matches!(
            err,
            RemoteError::MissingField {
                field: "restoreStatus"
            }
        ));
    }

    #[test]
    fn test_decode_mistyped_field_is_named() {
        let body = br#"{"status":1,"restoreStatus":"RS_SUCCESS","downloadLink":"/f"}"#;
        let err = ResolvedLink::decode(body, "http://x", &base()).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidField { field: "status", .. }));
    }

    #[test]
    fn test_decode_non_object_is_malformed() {
        let err = ResolvedLink::decode(b"[1,2]", "http://x", &base()).unwrap_err();
        assert!(matches!(err, RemoteError::Malformed { .. }));
    }

    #[test]
    fn test_make_absolute_url_keeps_server_origin() {
        let link = Url::parse("https://elsewhere.example.com/media/f.mov?token=1#frag").unwrap();
        let absolute = make_absolute_url(&base(), &link);
        assert_eq!(
            absolute.as_str(),
            "http://vault.local:9000/media/f.mov?token=1#frag"
        );
    }
}
