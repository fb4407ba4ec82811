//! YAML configuration file loading.
//!
//! ```yaml
//! vaultdoor_uri: https://vaultdoor.example.com
//! archivehunter_uri: https://archivehunter.example.com
//! download_threads: 5
//! queue_buffer_size: 10
//! allow_overwrite: false
//! download_path: /data/downloads
//! immediate_exit: false
//! ```
//!
//! Absent keys take their defaults; `0` for either sizing key means "use the
//! default" as well.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::download::{DEFAULT_QUEUE_SIZE, DEFAULT_WORKERS};

/// File name looked up next to the executable when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bulkpull.yaml";

/// Highest accepted `download_threads` value.
const MAX_DOWNLOAD_THREADS: usize = 100;

/// Errors raised while loading or interpreting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema.
    #[error("failed to parse config file: {source}")]
    Parse {
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// The offending key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A backend URI is missing or does not parse as an absolute URL.
    #[error("could not parse `{field}` '{value}': {reason}")]
    InvalidUri {
        /// The offending key.
        field: &'static str,
        /// The configured value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings read from the YAML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the VaultDoor service.
    pub vaultdoor_uri: String,
    /// Base URL of the ArchiveHunter service.
    pub archivehunter_uri: String,
    /// Number of download workers; 0 selects the default.
    pub download_threads: usize,
    /// Capacity of the download queue; 0 selects the default.
    pub queue_buffer_size: usize,
    /// Whether existing files may be overwritten.
    pub allow_overwrite: bool,
    /// Directory downloads are written under; `--to` takes precedence.
    pub download_path: Option<String>,
    /// Skip the "Press ENTER" pause before exiting.
    pub immediate_exit: bool,
}

impl Config {
    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid YAML,
    /// or fails [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading configuration");
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parses and validates YAML config text.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse { source })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `download_threads` exceeds 100.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_threads > MAX_DOWNLOAD_THREADS {
            return Err(ConfigError::Invalid {
                field: "download_threads",
                reason: format!(
                    "{}. Expected range: 1..={MAX_DOWNLOAD_THREADS}",
                    self.download_threads
                ),
            });
        }
        Ok(())
    }

    /// Returns the worker count, applying the default for 0.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.download_threads == 0 {
            DEFAULT_WORKERS
        } else {
            self.download_threads
        }
    }

    /// Returns the queue capacity, applying the default for 0.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        if self.queue_buffer_size == 0 {
            DEFAULT_QUEUE_SIZE
        } else {
            self.queue_buffer_size
        }
    }

    /// Parses `vaultdoor_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUri`] when the value is empty or not an
    /// absolute URL.
    pub fn vaultdoor_url(&self) -> Result<Url, ConfigError> {
        parse_uri("vaultdoor_uri", &self.vaultdoor_uri)
    }

    /// Parses `archivehunter_uri`, returning `None` when it is not set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUri`] when the value is set but is not an
    /// absolute URL.
    pub fn archivehunter_url(&self) -> Result<Option<Url>, ConfigError> {
        if self.archivehunter_uri.trim().is_empty() {
            return Ok(None);
        }
        parse_uri("archivehunter_uri", &self.archivehunter_uri).map(Some)
    }

    /// Picks the download directory: the command-line override first, then
    /// the configured path. Empty values count as unset.
    #[must_use]
    pub fn resolve_download_path(&self, cli_override: Option<&str>) -> Option<String> {
        cli_override
            .or(self.download_path.as_deref())
            .filter(|path| !path.trim().is_empty())
            .map(str::to_string)
    }
}

fn parse_uri(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUri {
        field,
        value: value.to_string(),
        reason,
    };
    if value.trim().is_empty() {
        return Err(invalid("no value set".to_string()));
    }
    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("expected an absolute http(s) URL".to_string()));
    }
    Ok(url)
}

/// Resolves the default config path: `bulkpull.yaml` beside the executable,
/// or in the current directory when the executable location is unknown.
#[must_use]
pub fn default_config_path() -> PathBuf {
    let base = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(DEFAULT_CONFIG_FILE)
}
