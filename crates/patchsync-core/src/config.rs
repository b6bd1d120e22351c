//! Runtime configuration for patch sessions
//!
//! A [`SyncConfig`] is built once by the caller and handed to the session
//! constructor. Nothing in the library reads configuration from global state.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default connect timeout for each download attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit on the gap between two body chunks
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of bytes hashed between progress reports (1 MiB)
pub const DEFAULT_HASH_PROGRESS_INTERVAL: u64 = 1024 * 1024;

/// Runtime configuration for a patch session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Manifest location: an `http(s)` URL or a local file path
    pub manifest_url: String,

    /// Base URL for fallback downloads (`<base>/<filename>`)
    pub fallback_base_url: Option<String>,

    /// Directory holding the patched files
    pub data_dir: PathBuf,

    /// Directory holding cache, marker, temporary manifest and logs
    pub state_dir: PathBuf,

    /// Connect timeout per download attempt
    pub connect_timeout: Duration,

    /// Maximum silence between body chunks before an attempt is abandoned
    pub stall_timeout: Duration,

    /// Bytes hashed between progress reports
    pub hash_progress_interval: u64,

    /// Re-hash each downloaded file and fail on mismatch
    pub verify_downloads: bool,
}

impl SyncConfig {
    /// Create a config with default timeouts
    pub fn new(
        manifest_url: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            fallback_base_url: None,
            data_dir: data_dir.into(),
            state_dir: state_dir.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            hash_progress_interval: DEFAULT_HASH_PROGRESS_INTERVAL,
            verify_downloads: false,
        }
    }

    /// Set the fallback base URL
    pub fn fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(url.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the stall timeout
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the hash progress interval in bytes
    pub fn hash_progress_interval(mut self, bytes: u64) -> Self {
        self.hash_progress_interval = bytes;
        self
    }

    /// Enable or disable post-download verification
    pub fn verify_downloads(mut self, verify: bool) -> Self {
        self.verify_downloads = verify;
        self
    }

    /// Check values that would otherwise fail deep inside a session
    pub fn validate(&self) -> Result<()> {
        if self.manifest_url.trim().is_empty() {
            return Err(Error::InvalidConfig("manifest URL is empty".to_string()));
        }
        if let Some(base) = &self.fallback_base_url {
            let parsed = url::Url::parse(base)
                .map_err(|e| Error::InvalidConfig(format!("fallback URL {}: {}", base, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::InvalidConfig(format!(
                    "fallback URL must be http or https: {}",
                    base
                )));
            }
        }
        if self.hash_progress_interval == 0 {
            return Err(Error::InvalidConfig(
                "hash progress interval must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.stall_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Locations of the on-disk session state
    pub fn paths(&self) -> StatePaths {
        StatePaths::new(&self.state_dir)
    }
}

/// On-disk layout under the state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Checksum cache file
    pub cache_file: PathBuf,
    /// Recovery marker file
    pub marker_file: PathBuf,
    /// Temporary copy of the downloaded manifest
    pub manifest_file: PathBuf,
    /// Session log file
    pub log_file: PathBuf,
    /// Lock held while a session runs
    pub lock_file: PathBuf,
}

impl StatePaths {
    /// Derive every state path from a state directory
    pub fn new(state_dir: &Path) -> Self {
        Self {
            cache_file: state_dir.join("hash").join("cache.txt"),
            marker_file: state_dir.join("session").join("patching"),
            manifest_file: state_dir.join("session").join("manifest.txt"),
            log_file: state_dir.join("logs").join("patchsync.log"),
            lock_file: state_dir.join("session").join("lock"),
        }
    }
}
