//! Token redemption, including the two-phase summary stream fetch.

use tracing::{debug, error, info, instrument};

use super::manifest::InitiateResponse;
use super::synopsis::decode_synopsis_stream;
use super::{Communicator, Manifest, ManifestEntry, RemoteError, endpoint};
use crate::retry::{RetryError, run_with_retry};
use crate::token::{Backend, DownloadToken};

/// Terminal message when redemption keeps hitting 502/503/504.
const REDEEM_EXHAUSTED_MESSAGE: &str = "server was not available";

impl Communicator {
    /// Exchanges a short-lived token for a manifest.
    ///
    /// The initial call is retried on 502/503/504. When the response carries no
    /// entry list, the entries are fetched from the summary stream using the
    /// manifest's retrieval token; that second call is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the server cannot be reached, answers with
    /// a permanent error, stays unavailable past the retry ceiling, sends an
    /// undecodable body, or the summary stream fails.
    #[instrument(skip(self, token), fields(backend = %token.backend()))]
    pub async fn redeem(&self, token: &DownloadToken) -> Result<Manifest, RemoteError> {
        let url = self.redeem_url(token);
        debug!(url = %url, "redeeming download token");

        let body = run_with_retry(&self.retry_policy, "redeem", |_| self.fetch_body(&url))
            .await
            .map_err(|e| match e {
                RetryError::Permanent { source, .. } => source,
                RetryError::Exhausted { attempts, .. } => {
                    RemoteError::exhausted("redeem", REDEEM_EXHAUSTED_MESSAGE, attempts)
                }
            })?;

        let mut response: InitiateResponse = serde_json::from_slice(&body).map_err(|e| {
            error!(url = %url, error = %e, "could not understand server response");
            RemoteError::malformed(&url, e)
        })?;

        let entries = match response.entries.take() {
            Some(entries) => entries,
            None => self.fetch_synopsis(&response.retrieval_token).await?,
        };

        info!(
            job = %response.metadata.id,
            entries = entries.len(),
            "redeemed download token"
        );
        Ok(response.into_manifest(entries))
    }

    /// Fetches and decodes the newline-delimited entry list of a two-phase job.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on connection failure, a non-200 status, or any
    /// read/decode failure in the stream.
    #[instrument(skip(self, retrieval_token))]
    pub async fn fetch_synopsis(
        &self,
        retrieval_token: &str,
    ) -> Result<Vec<ManifestEntry>, RemoteError> {
        let url = endpoint(
            &self.archivehunter_url,
            &format!("api/bulkv2/{retrieval_token}/summarystream"),
        );
        debug!(url = %url, "no download synopsis data, retrieving from stream");

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "could not make connection to server");
            RemoteError::network(&url, e)
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status, body = %body, "summary stream request failed");
            return Err(RemoteError::http_status(&url, status, body));
        }

        decode_synopsis_stream(response.bytes_stream())
            .await
            .map_err(|source| RemoteError::Synopsis { url, source })
    }

    fn redeem_url(&self, token: &DownloadToken) -> String {
        match token.backend() {
            Backend::VaultDoor => {
                endpoint(&self.vaultdoor_url, &format!("api/bulk/{}", token.token()))
            }
            Backend::ArchiveHunter => endpoint(
                &self.archivehunter_url,
                &format!("api/bulkv2/{}", token.token()),
            ),
        }
    }
}
