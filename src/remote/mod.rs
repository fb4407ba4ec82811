//! Client for the VaultDoor and ArchiveHunter bulk download services.
//!
//! # Architecture
//!
//! - [`Communicator`] - base URLs of both services, the backend chosen by the
//!   token, and the shared HTTP client and retry policy
//! - [`Communicator::redeem`] - exchanges a token for a [`Manifest`]
//! - [`Communicator::resolve_link`] - resolves a one-time [`ResolvedLink`] per entry
//! - [`synopsis`] - streaming decoder for the two-phase summary stream
//!
//! # Example
//!
//! ```no_run
//! use bulkpull_core::remote::Communicator;
//! use bulkpull_core::token::DownloadToken;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let token = DownloadToken::parse("archivehunter:bulkdownload:xyz")?;
//! let comm = Communicator::new(
//!     Url::parse("https://vaultdoor.example.com")?,
//!     Url::parse("https://archivehunter.example.com")?,
//!     token.backend(),
//!     reqwest::Client::new(),
//! );
//! let manifest = comm.redeem(&token).await?;
//! println!("{} entries", manifest.entries.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod link;
mod manifest;
mod redeem;
pub mod synopsis;

pub use error::RemoteError;
pub use link::{ResolvedLink, RestoreStatus, make_absolute_url};
pub use manifest::{Manifest, ManifestEntry, ManifestMetadata};

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::retry::RetryPolicy;
use crate::token::Backend;

/// Connection details for the archive services.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Communicator {
    vaultdoor_url: Url,
    archivehunter_url: Url,
    backend: Backend,
    client: Client,
    retry_policy: RetryPolicy,
}

impl Communicator {
    /// Creates a communicator using the default retry policy.
    #[must_use]
    pub fn new(vaultdoor_url: Url, archivehunter_url: Url, backend: Backend, client: Client) -> Self {
        Self {
            vaultdoor_url,
            archivehunter_url,
            backend,
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy applied to redemption and link resolution.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the backend selected by the token.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Returns the base URL of the backend selected by the token.
    #[must_use]
    pub fn active_url(&self) -> &Url {
        match self.backend {
            Backend::VaultDoor => &self.vaultdoor_url,
            Backend::ArchiveHunter => &self.archivehunter_url,
        }
    }

    /// Returns the VaultDoor base URL.
    #[must_use]
    pub fn vaultdoor_url(&self) -> &Url {
        &self.vaultdoor_url
    }

    /// Returns the ArchiveHunter base URL.
    #[must_use]
    pub fn archivehunter_url(&self) -> &Url {
        &self.archivehunter_url
    }

    /// Returns the shared HTTP client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the retry policy applied to remote calls.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Issues a single GET and returns the body of a 200 response.
    ///
    /// Any other status becomes [`RemoteError::HttpStatus`] carrying the body,
    /// which the caller's retry loop classifies.
    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::network(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::network(url, e))?;
        debug!(url, status, bytes = body.len(), "received response");

        if status != 200 {
            return Err(RemoteError::http_status(
                url,
                status,
                String::from_utf8_lossy(&body),
            ));
        }
        Ok(body.to_vec())
    }
}

/// Joins a base URL and a path tail without doubling the separator.
pub(crate) fn endpoint(base: &Url, tail: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        tail.trim_start_matches('/')
    )
}
