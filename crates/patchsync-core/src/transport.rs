//! File transport with primary and fallback sources
//!
//! [`Transport`] is the seam between the session and the network. The
//! production implementation is [`HttpTransport`]; tests drive sessions with
//! in-memory fakes.
//!
//! Every manifest entry is fetched from its own link first. If that fails,
//! exactly one more attempt is made against `<fallback base>/<filename>`.

use crate::config::{SyncConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_STALL_TIMEOUT};
use crate::manifest::ManifestEntry;
use crate::{Error, Result};
use futures_util::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Byte-level progress of one transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes written to the destination so far
    pub bytes_received: u64,
    /// Expected size, when the server announced one
    pub total_bytes: Option<u64>,
}

/// Which source an attempt used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// The link listed in the manifest
    Primary,
    /// The fallback base URL plus the filename
    Fallback,
}

impl std::fmt::Display for FetchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Successful result of [`fetch_with_fallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Source that delivered the file
    pub source: FetchSource,
    /// URL that delivered the file
    pub url: String,
    /// Bytes written
    pub bytes: u64,
}

/// Downloads a URL into a local file
pub trait Transport: Send + Sync {
    /// Fetch `url` into `destination`, creating parent directories
    ///
    /// Succeeds only once the whole body has been written. Returns the number
    /// of bytes written.
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> impl Future<Output = Result<u64>> + Send;
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    stall_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_STALL_TIMEOUT)
    }

    /// Create a transport using the timeouts from a session config
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::with_timeouts(config.connect_timeout, config.stall_timeout)
    }

    /// Create a transport with explicit timeouts
    pub fn with_timeouts(connect_timeout: Duration, stall_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("patchsync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            stall_timeout,
        })
    }
}

impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<u64> {
        let parsed = Url::parse(url).map_err(|e| Error::Network(format!("Invalid URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Network(format!("Unsupported URL scheme: {}", url)));
        }

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Error::Network(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "HTTP error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let total_bytes = response.content_length();

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;

        let mut bytes_received = 0u64;
        on_progress(TransferProgress {
            bytes_received,
            total_bytes,
        });

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(self.stall_timeout, stream.next())
                .await
                .map_err(|_| {
                    Error::Network(format!(
                        "No data received for {}s from {}",
                        self.stall_timeout.as_secs(),
                        url
                    ))
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| Error::Network(format!("Transfer interrupted: {}", e)))?;

            file.write_all(&chunk).await?;
            bytes_received += chunk.len() as u64;
            on_progress(TransferProgress {
                bytes_received,
                total_bytes,
            });
        }

        file.flush().await?;
        file.sync_all().await?;

        if let Some(total) = total_bytes {
            if bytes_received < total {
                return Err(Error::Network(format!(
                    "Incomplete transfer from {}: received {} of {} bytes",
                    url, bytes_received, total
                )));
            }
        }

        Ok(bytes_received)
    }
}

// ============================================================================
// FALLBACK
// ============================================================================

/// Build the fallback URL for a file: `base` joined with `filename`
pub fn fallback_url(base: &str, filename: &str) -> Result<String> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base)
        .map_err(|e| Error::InvalidConfig(format!("Invalid fallback URL {}: {}", base, e)))?;
    let joined = base
        .join(filename)
        .map_err(|e| Error::InvalidConfig(format!("Cannot join {} onto {}: {}", filename, base, e)))?;
    Ok(joined.to_string())
}

/// Fetch an entry from its primary link, then once from the fallback
///
/// Makes at most two attempts. An entry without a link only tries the
/// fallback; without a fallback base only the primary is tried.
pub async fn fetch_with_fallback<T: Transport>(
    transport: &T,
    entry: &ManifestEntry,
    fallback_base: Option<&str>,
    destination: &Path,
    on_progress: &mut (dyn FnMut(FetchSource, TransferProgress) + Send),
) -> Result<FetchOutcome> {
    let mut attempts = Vec::with_capacity(2);

    let fallback = match fallback_base {
        Some(base) => Some(fallback_url(base, &entry.filename)?),
        None => None,
    };

    let candidates = [
        entry.link.clone().map(|url| (FetchSource::Primary, url)),
        fallback.map(|url| (FetchSource::Fallback, url)),
    ];

    for (source, url) in candidates.into_iter().flatten() {
        let mut forward = |progress: TransferProgress| on_progress(source, progress);
        match transport.fetch(&url, destination, &mut forward).await {
            Ok(bytes) => {
                tracing::info!("Fetched {} from {} ({} bytes)", entry.filename, source, bytes);
                return Ok(FetchOutcome { source, url, bytes });
            }
            Err(e) => {
                tracing::warn!("Fetching {} from {} failed: {}", entry.filename, url, e);
                attempts.push(format!("{} {}: {}", source, url, e));
            }
        }
    }

    if attempts.is_empty() {
        attempts.push("no primary link and no fallback URL configured".to_string());
    }

    Err(Error::AllSourcesFailed {
        filename: entry.filename.clone(),
        attempts,
    })
}
