//! # Patchsync Core
//!
//! Core library for keeping a local data directory in line with a remote
//! manifest of files and their SHA-256 checksums.
//!
//! ## Modules
//!
//! - `manifest`: Manifest parsing and retrieval
//! - `hash`: Chunked SHA-256 hashing with progress
//! - `cache`: Persistent filename to checksum cache
//! - `recovery`: Marker naming the file being downloaded
//! - `lock`: Exclusive lock over a state directory
//! - `transport`: HTTP downloads with primary/fallback retry
//! - `session`: The patch session state machine
//! - `observer`: Callbacks used by front ends
//! - `progress`: Throughput and ETA math
//! - `logging`: Session log file
//! - `error`: Error types and result aliases
//! - `config`: Runtime configuration
//! - `settings`: Persistent user settings from configuration file
//!
//! ## Example
//!
//! ```ignore
//! use patchsync_core::{HttpTransport, PatchSession, RecordingObserver, SyncConfig};
//!
//! let config = SyncConfig::new("http://patch.example.com/plist.txt", "Data", "Cache")
//!     .fallback_base_url("http://patch.example.com/Patch/Files/")
//!     .verify_downloads(true);
//!
//! let transport = HttpTransport::from_config(&config)?;
//! let mut session = PatchSession::new(config, transport, RecordingObserver::default())?;
//!
//! let report = session.run().await?;
//! for name in &report.fetched {
//!     println!("updated {}", name);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod hash;
pub mod lock;
pub mod logging;
pub mod manifest;
pub mod observer;
pub mod progress;
pub mod recovery;
pub mod session;
pub mod settings;
pub mod transport;

pub use cache::{parse_cache, ChecksumCache, CACHE_FORMAT_VERSION};
pub use config::{
    StatePaths, SyncConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HASH_PROGRESS_INTERVAL,
    DEFAULT_STALL_TIMEOUT,
};
pub use error::{Error, ErrorCategory, Result};
pub use hash::{checksums_match, is_hex_digest, HashEngine, HASH_CHUNK_SIZE};
pub use lock::SessionLock;
pub use logging::{init_session_logging, LoggingGuard};
pub use manifest::{
    parse_manifest, parse_manifest_line, resolve_data_path, ManifestEntry, ManifestFetcher,
};
pub use observer::{NoopObserver, RecordingObserver, SessionEvent, SessionObserver};
pub use progress::{format_eta, format_speed, TransferMeter, TransferSnapshot};
pub use recovery::RecoveryMarker;
pub use session::{
    PatchSession, SessionHandle, SessionPhase, SessionReport, SessionState, STATUS_ERRORED,
    STATUS_FETCHING_MANIFEST, STATUS_MANIFEST_FAILED, STATUS_UP_TO_DATE,
};
pub use settings::{parse_size, Settings, SettingsError};
pub use transport::{
    fallback_url, fetch_with_fallback, FetchOutcome, FetchSource, HttpTransport, TransferProgress,
    Transport,
};
