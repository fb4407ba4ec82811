//! Manifest data model returned by token redemption.

use serde::{Deserialize, Serialize};

/// Descriptive metadata attached to a bulk download job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManifestMetadata {
    /// Job identifier.
    pub id: String,
    /// Free-text description entered by the requesting user.
    pub description: String,
    /// Owning user.
    pub user_email: String,
    /// Creation timestamp as sent by the server.
    pub added_at: String,
    /// Number of sub-items that failed to restore.
    pub error_count: i64,
    /// Number of sub-items available for download.
    pub avail_count: i64,
    /// Number of sub-items still being restored.
    pub restoring_count: i64,
}

/// One downloadable file of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Opaque identifier, unique within a manifest.
    pub entry_id: String,
    /// Slash-separated destination path relative to the download base.
    pub path: String,
    /// Expected size in bytes, compared after transfer only.
    #[serde(default)]
    pub file_size: u64,
}

impl ManifestEntry {
    /// Creates a manifest entry.
    pub fn new(entry_id: impl Into<String>, path: impl Into<String>, file_size: u64) -> Self {
        Self {
            entry_id: entry_id.into(),
            path: path.into(),
            file_size,
        }
    }
}

/// Wire shape of a redemption response.
///
/// `entries` is absent or `null` when the two-phase protocol defers the entry
/// list to the summary stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitiateResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metadata: ManifestMetadata,
    #[serde(default)]
    pub retrieval_token: String,
    #[serde(default)]
    pub entries: Option<Vec<ManifestEntry>>,
}

/// A redeemed bulk download job with its complete entry list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Status string reported by the server.
    pub status: String,
    /// Descriptive metadata.
    pub metadata: ManifestMetadata,
    /// Long-lived token used for the summary stream and link resolution.
    pub retrieval_token: String,
    /// Files to download, in server order. Possibly empty.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Returns the number of entries and the sum of their expected sizes.
    #[must_use]
    pub fn totals(&self) -> (usize, u64) {
        let total_bytes = self
            .entries
            .iter()
            .fold(0u64, |acc, entry| acc.saturating_add(entry.file_size));
        (self.entries.len(), total_bytes)
    }
}

impl InitiateResponse {
    /// Builds the final manifest around a complete entry list.
    pub(crate) fn into_manifest(self, entries: Vec<ManifestEntry>) -> Manifest {
        Manifest {
            status: self.status,
            metadata: self.metadata,
            retrieval_token: self.retrieval_token,
            entries,
        }
    }
}
