//! Streaming transfer of one resolved link to disk.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Final output path.
    pub path: PathBuf,
    /// Bytes written to disk.
    pub bytes_written: u64,
    /// Size the manifest announced for the entry.
    pub expected_bytes: u64,
}

impl TransferOutcome {
    /// Returns true when the written size differs from the announced size.
    #[must_use]
    pub fn size_mismatch(&self) -> bool {
        self.bytes_written != self.expected_bytes
    }
}

/// HTTP client for streaming entry content to disk.
///
/// Cheap to clone; clones share the connection pool of the wrapped client.
#[derive(Debug, Clone)]
pub struct TransferClient {
    client: Client,
}

impl TransferClient {
    /// Wraps an already configured HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Downloads `url` into `path`, truncating any existing file.
    ///
    /// The status is checked before the file is opened, so a non-200 answer
    /// never creates or truncates the destination. Once the body copy has
    /// started any failure deletes the partial file. A size different from
    /// `expected_bytes` is logged but the file is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for connection failures, non-200 statuses
    /// (mapped by [`DownloadError::from_status`]) and IO errors.
    #[instrument(skip(self), fields(url = %url, path = %path.display()))]
    pub async fn transfer(
        &self,
        url: &Url,
        path: &Path,
        expected_bytes: u64,
    ) -> Result<TransferOutcome, DownloadError> {
        debug!("starting transfer");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let err = DownloadError::from_status(url.as_str(), status);
            warn!(status, error = %err, "transfer rejected by server");
            return Err(err);
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let stream_result = stream_to_file(&mut file, response, url.as_str(), path).await;
        drop(file);

        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "removing partial file after error");
                if let Err(remove_err) = tokio::fs::remove_file(path).await {
                    warn!(error = %remove_err, "could not remove partial file");
                }
                return Err(e);
            }
        };

        let outcome = TransferOutcome {
            path: path.to_path_buf(),
            bytes_written,
            expected_bytes,
        };
        if outcome.size_mismatch() {
            warn!(
                expected_bytes,
                bytes_written, "downloaded size does not match the manifest"
            );
        }
        info!(bytes = bytes_written, "transfer complete");
        Ok(outcome)
    }
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::interrupted(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
