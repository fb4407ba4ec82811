//! Destination path construction and pre-write checks.
//!
//! Nothing here is retried: every failure is local and aborts only the entry
//! being written.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::error::DownloadError;

#[allow(clippy::expect_used)]
static REPEATED_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/{2,}").expect("separator regex is valid")); // Static pattern, safe to panic

/// Strips trailing separators from a configured base path, keeping a bare `/`.
#[must_use]
pub fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() && base.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Joins the base path and an entry's relative path, collapsing repeated `/`.
///
/// # Errors
///
/// Returns [`DownloadError::UnsafePath`] when the entry path has a `..`
/// component, which would place the file outside the base directory.
///
/// # Example
///
/// ```
/// use bulkpull_core::download::build_target_path;
///
/// let path = build_target_path("/data/downloads/", "a//b.mov").unwrap();
/// assert_eq!(path.to_str(), Some("/data/downloads/a/b.mov"));
/// ```
pub fn build_target_path(base: &str, entry_path: &str) -> Result<PathBuf, DownloadError> {
    if entry_path.split('/').any(|component| component == "..") {
        return Err(DownloadError::UnsafePath {
            path: entry_path.to_string(),
        });
    }
    let joined = format!("{base}/{entry_path}");
    Ok(PathBuf::from(
        REPEATED_SEPARATORS.replace_all(&joined, "/").into_owned(),
    ))
}

/// Checks whether the destination may be written.
///
/// # Errors
///
/// Returns [`DownloadError::AlreadyExists`] when the file exists and
/// `allow_overwrite` is false, or [`DownloadError::Io`] when existence cannot
/// be determined.
pub async fn verify_target(path: &Path, allow_overwrite: bool) -> Result<(), DownloadError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    if !exists {
        return Ok(());
    }
    if allow_overwrite {
        info!(path = %path.display(), "file already exists, overwriting");
        return Ok(());
    }
    Err(DownloadError::already_exists(path))
}

/// Creates every missing parent directory of `path`.
///
/// A directory that already exists is not an error.
///
/// # Errors
///
/// Returns [`DownloadError::CreateDirectory`] for any other creation failure.
pub async fn prepare_directories(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    match tokio::fs::create_dir_all(parent).await {
        Ok(()) => {
            debug!(dir = %parent.display(), "directories ready");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(DownloadError::create_directory(parent, e)),
    }
}
