//! Patch session state machine
//!
//! A [`PatchSession`] walks the manifest one entry at a time and brings the
//! data directory in line with it:
//!
//! ```text
//! Idle -> FetchingManifest -> Patching -> Finished
//!                 |               |
//!                 +-> Finished    +-> Errored
//! ```
//!
//! For every entry the session resolves the local checksum (cache first, then
//! a background hash), skips the entry when it matches and otherwise fetches
//! it with fallback. A recovery marker names the entry in flight so an
//! interrupted download is discarded by the next session.
//!
//! # Example
//!
//! ```ignore
//! use patchsync_core::{HttpTransport, NoopObserver, PatchSession, SyncConfig};
//!
//! let config = SyncConfig::new("http://patch.example.com/plist.txt", "Data", "Cache")
//!     .fallback_base_url("http://patch.example.com/Patch/Files/");
//! let transport = HttpTransport::from_config(&config)?;
//! let mut session = PatchSession::new(config, transport, NoopObserver)?;
//!
//! let report = session.run().await?;
//! println!("{:?}: {} fetched, {} up to date", report.phase, report.fetched.len(), report.skipped.len());
//! ```

use crate::cache::{remove_if_exists, ChecksumCache};
use crate::config::{StatePaths, SyncConfig};
use crate::hash::{checksums_match, HashEngine};
use crate::lock::SessionLock;
use crate::manifest::{ManifestEntry, ManifestFetcher};
use crate::observer::SessionObserver;
use crate::progress::{overall_percent, TransferMeter};
use crate::recovery::RecoveryMarker;
use crate::transport::{fetch_with_fallback, FetchSource, Transport};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Status shown while the manifest is requested
pub const STATUS_FETCHING_MANIFEST: &str = "Getting patch list...";

/// Status shown when the manifest could not be retrieved
pub const STATUS_MANIFEST_FAILED: &str = "Unable to download patch list!";

/// Status shown when every file matches
pub const STATUS_UP_TO_DATE: &str = "All files are up to date";

/// Status shown once a session ends in [`SessionPhase::Errored`]
pub const STATUS_ERRORED: &str = "Something went wrong, please restart";

// ============================================================================
// STATE
// ============================================================================

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not started
    #[default]
    Idle,
    /// Waiting for the manifest
    FetchingManifest,
    /// Walking the work queue
    Patching,
    /// Completed, including "nothing to do"
    Finished,
    /// Stopped on an unrecoverable failure
    Errored,
}

impl SessionPhase {
    /// Whether a session in this phase is still running
    pub fn is_active(self) -> bool {
        matches!(self, Self::FetchingManifest | Self::Patching)
    }
}

/// Work queue and cursor owned by a session
///
/// `current_index` is `None` whenever no entry is being processed, so
/// patching is exactly `current_index.is_some()`.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    work_queue: Vec<ManifestEntry>,
    current_index: Option<usize>,
}

impl SessionState {
    /// Entries of the current manifest, in processing order
    pub fn work_queue(&self) -> &[ManifestEntry] {
        &self.work_queue
    }

    /// Index of the entry being processed
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Entry being processed
    pub fn current(&self) -> Option<&ManifestEntry> {
        self.current_index.and_then(|i| self.work_queue.get(i))
    }

    /// Whether an entry is being processed
    pub fn is_patching(&self) -> bool {
        self.current_index.is_some()
    }

    fn start(&mut self, queue: Vec<ManifestEntry>) {
        self.current_index = (!queue.is_empty()).then_some(0);
        self.work_queue = queue;
    }

    fn advance_to(&mut self, index: usize) -> Option<&ManifestEntry> {
        if index >= self.work_queue.len() {
            return None;
        }
        self.current_index = Some(index);
        self.work_queue.get(index)
    }

    fn reset(&mut self) {
        self.work_queue.clear();
        self.current_index = None;
    }
}

/// Thread-safe view of whether a session is running
///
/// Cloned handles can be polled from other threads, for example a signal
/// handler deciding whether to warn before exit.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    active: Arc<AtomicBool>,
    patching: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Whether `run` is in progress
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether files are being checked or downloaded
    pub fn is_patching(&self) -> bool {
        self.patching.load(Ordering::SeqCst)
    }
}

/// Releases the handle even if the `run` future is dropped midway
struct ActiveGuard(SessionHandle);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.patching.store(false, Ordering::SeqCst);
        self.0.active.store(false, Ordering::SeqCst);
    }
}

/// Summary of one `run`
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Phase the session ended in
    pub phase: SessionPhase,
    /// Files downloaded, in order
    pub fetched: Vec<String>,
    /// Files already up to date, in order
    pub skipped: Vec<String>,
    /// File named by a leftover recovery marker and deleted at start
    pub discarded: Option<String>,
    /// Bytes downloaded across all files
    pub bytes_downloaded: u64,
    /// Why the manifest could not be retrieved
    pub manifest_error: Option<String>,
    /// Why the session ended in `Errored`
    pub error: Option<String>,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl SessionReport {
    /// Whether the session reached `Finished`
    pub fn is_success(&self) -> bool {
        self.phase == SessionPhase::Finished
    }
}

enum EntryOutcome {
    Skipped,
    Fetched { bytes: u64, source: FetchSource },
}

// ============================================================================
// SESSION
// ============================================================================

/// Drives one data directory towards the manifest
pub struct PatchSession<T, O> {
    config: SyncConfig,
    paths: StatePaths,
    transport: T,
    observer: O,
    cache: ChecksumCache,
    marker: RecoveryMarker,
    phase: SessionPhase,
    state: SessionState,
    handle: SessionHandle,
    in_flight: Option<PathBuf>,
    // Set until a leftover marker's file is known to be gone
    marker_unresolved: bool,
}

impl<T: Transport, O: SessionObserver> PatchSession<T, O> {
    /// Create a session; fails if the config is invalid
    pub fn new(config: SyncConfig, transport: T, observer: O) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        Ok(Self {
            cache: ChecksumCache::new(&paths.cache_file),
            marker: RecoveryMarker::new(&paths.marker_file),
            paths,
            config,
            transport,
            observer,
            phase: SessionPhase::Idle,
            state: SessionState::default(),
            handle: SessionHandle::default(),
            in_flight: None,
            marker_unresolved: false,
        })
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Work queue and cursor
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether an entry is being processed
    pub fn is_patching(&self) -> bool {
        self.state.is_patching()
    }

    /// Whether the patched application may be started
    ///
    /// False while patching and after a session ended in `Errored`.
    pub fn can_launch(&self) -> bool {
        !self.state.is_patching() && !self.handle.is_active() && self.phase != SessionPhase::Errored
    }

    /// Handle that can be polled from other threads
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Session configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Checksum cache as of the last load or save
    pub fn cache(&self) -> &ChecksumCache {
        &self.cache
    }

    /// Transport used for downloads
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Observer receiving events
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Consume the session and return its observer
    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Run one session to `Finished` or `Errored`
    ///
    /// Only a concurrent start request is returned as an error
    /// ([`Error::SessionBusy`]), whether it comes from this handle or from
    /// another session holding the same state directory. Every other failure
    /// ends up in the report.
    pub async fn run(&mut self) -> Result<SessionReport> {
        if self.handle.active.swap(true, Ordering::SeqCst) {
            return Err(Error::SessionBusy);
        }
        let _guard = ActiveGuard(self.handle.clone());

        let started = Instant::now();
        let mut report = SessionReport::default();
        self.marker_unresolved = true;

        // Held until cleanup has touched the marker and the temp manifest
        let _lock = match SessionLock::acquire(&self.paths.lock_file) {
            Ok(lock) => {
                tracing::info!("Starting patch session from {}", self.config.manifest_url);
                match self.drive(&mut report).await {
                    Ok(()) => self.finish(),
                    Err(e) => self.fail(&e, &mut report),
                }
                Some(lock)
            }
            Err(Error::SessionBusy) => return Err(Error::SessionBusy),
            Err(e) => {
                self.fail(&e, &mut report);
                None
            }
        };

        report.phase = self.phase;
        report.elapsed = started.elapsed();
        tracing::info!(
            "Patch session ended {:?}: {} fetched, {} up to date, {} bytes in {:.1}s",
            report.phase,
            report.fetched.len(),
            report.skipped.len(),
            report.bytes_downloaded,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    async fn drive(&mut self, report: &mut SessionReport) -> Result<()> {
        report.discarded = self.begin()?;

        let fetcher = ManifestFetcher::new(&self.transport, &self.paths.manifest_file);
        let entries = match fetcher.fetch(&self.config.manifest_url).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Unable to download patch list: {}", e);
                report.manifest_error = Some(e.to_string());
                self.observer.on_status_text(STATUS_MANIFEST_FAILED);
                return Ok(());
            }
        };

        if entries.is_empty() {
            tracing::info!("Manifest lists no files, nothing to patch");
            self.observer.on_status_text(STATUS_UP_TO_DATE);
            return Ok(());
        }

        let count = entries.len();
        self.state.start(entries);
        self.phase = SessionPhase::Patching;
        self.handle.patching.store(true, Ordering::SeqCst);
        self.observer.on_patching_state_changed(true);

        for index in 0..count {
            let Some(entry) = self.state.advance_to(index).cloned() else {
                break;
            };
            self.marker.arm(&entry.filename)?;

            match self.process_entry(index, count, &entry).await? {
                EntryOutcome::Skipped => report.skipped.push(entry.filename),
                EntryOutcome::Fetched { bytes, source } => {
                    tracing::debug!("{} delivered by {} source", entry.filename, source);
                    report.bytes_downloaded += bytes;
                    report.fetched.push(entry.filename);
                }
            }
        }

        if report.fetched.is_empty() {
            self.observer.on_status_text(STATUS_UP_TO_DATE);
        } else {
            self.observer
                .on_status_text(&format!("Patching complete, {} files updated", report.fetched.len()));
        }
        Ok(())
    }

    /// Enter `FetchingManifest`: discard interrupted work and load the cache
    fn begin(&mut self) -> Result<Option<String>> {
        self.phase = SessionPhase::FetchingManifest;
        self.state.reset();
        self.in_flight = None;
        self.observer.on_progress_percent(0);
        self.observer.on_status_text(STATUS_FETCHING_MANIFEST);

        std::fs::create_dir_all(&self.config.data_dir)?;
        let discarded = self.marker.discard_interrupted(&self.config.data_dir)?;
        self.marker_unresolved = false;
        remove_if_exists(&self.paths.manifest_file)?;
        self.cache.load()?;
        Ok(discarded)
    }

    async fn process_entry(
        &mut self,
        index: usize,
        count: usize,
        entry: &ManifestEntry,
    ) -> Result<EntryOutcome> {
        let label = format!("Checking Patch {}/{} {}", index + 1, count, entry.filename);
        self.observer.on_progress_percent(overall_percent(index, count));
        self.observer.on_status_text(&label);

        let local_path = entry.local_path(&self.config.data_dir);
        let exists = tokio::fs::metadata(&local_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        if exists {
            match self.local_checksum(entry, &local_path, &label).await? {
                Some(actual) if checksums_match(&actual, &entry.checksum) => {
                    tracing::debug!("{} is up to date", entry.filename);
                    return Ok(EntryOutcome::Skipped);
                }
                Some(actual) => tracing::info!(
                    "{} is out of date (have {}, want {})",
                    entry.filename,
                    actual,
                    entry.checksum
                ),
                None => {}
            }
        } else {
            tracing::info!("{} is missing", entry.filename);
        }

        self.fetch_entry(index, count, entry, &local_path).await
    }

    /// Cached checksum, or a fresh hash persisted to the cache
    ///
    /// `None` means the file could not be hashed and must be re-fetched.
    async fn local_checksum(
        &mut self,
        entry: &ManifestEntry,
        path: &Path,
        label: &str,
    ) -> Result<Option<String>> {
        if let Some(cached) = self.cache.get(&entry.filename) {
            tracing::trace!("Cache hit for {}", entry.filename);
            return Ok(Some(cached.to_string()));
        }

        match self.hash_in_background(path, label).await {
            Ok(digest) => {
                self.cache.put(&entry.filename, &digest);
                self.cache.save()?;
                Ok(Some(digest))
            }
            Err(e) => {
                tracing::warn!("Could not hash {}: {}", entry.filename, e);
                Ok(None)
            }
        }
    }

    async fn fetch_entry(
        &mut self,
        index: usize,
        count: usize,
        entry: &ManifestEntry,
        local_path: &Path,
    ) -> Result<EntryOutcome> {
        // The marker already names this entry; from here until the cache is
        // updated the local file is untrustworthy.
        self.in_flight = Some(local_path.to_path_buf());

        let observer = &mut self.observer;
        let mut meter: Option<(FetchSource, TransferMeter)> = None;
        let outcome = fetch_with_fallback(
            &self.transport,
            entry,
            self.config.fallback_base_url.as_deref(),
            local_path,
            &mut |source, progress| {
                if meter.map(|(s, _)| s) != Some(source) {
                    meter = Some((source, TransferMeter::start()));
                }
                if let Some((_, m)) = meter {
                    let snapshot = m.snapshot(progress);
                    observer.on_progress_percent(snapshot.percent);
                    observer.on_status_text(&snapshot.status_line(index, count, &entry.filename));
                }
            },
        )
        .await?;

        if self.config.verify_downloads {
            let label = format!("Verifying Patch {}/{} {}", index + 1, count, entry.filename);
            let actual = self.hash_in_background(local_path, &label).await?;
            if !checksums_match(&actual, &entry.checksum) {
                return Err(Error::Integrity {
                    filename: entry.filename.clone(),
                    expected: entry.checksum.clone(),
                    actual,
                });
            }
        }

        self.in_flight = None;
        self.cache.put(&entry.filename, &entry.checksum);
        self.cache.save()?;

        Ok(EntryOutcome::Fetched {
            bytes: outcome.bytes,
            source: outcome.source,
        })
    }

    /// Hash on the blocking pool, relaying progress to the observer
    async fn hash_in_background(&mut self, path: &Path, label: &str) -> Result<String> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let path = path.to_path_buf();
        let interval = self.config.hash_progress_interval;

        let worker = tokio::task::spawn_blocking(move || {
            HashEngine::new()
                .progress_interval(interval)
                .on_progress(move |percent| {
                    let _ = tx.send(percent);
                })
                .hash_file(&path)
        });

        while let Some(percent) = rx.recv().await {
            self.observer.on_progress_percent(percent);
            self.observer
                .on_status_text(&format!("{} ({}%)", label, percent));
        }

        worker
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("Hash worker failed: {}", e))))?
    }

    fn finish(&mut self) {
        self.phase = SessionPhase::Finished;
        self.cleanup(true);
        self.observer.on_progress_percent(100);
        self.observer.on_finished();
    }

    fn fail(&mut self, error: &Error, report: &mut SessionReport) {
        tracing::error!("Patch session failed: {}", error);

        // A partial download must not outlive the marker that describes it
        let mut clear_marker = !self.marker_unresolved;
        if self.marker_unresolved {
            tracing::warn!("Keeping recovery marker for the next session");
        }
        if let Some(path) = self.in_flight.take() {
            match remove_if_exists(&path) {
                Ok(true) => tracing::info!("Removed incomplete download {:?}", path),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Could not remove incomplete download {:?}: {}", path, e);
                    clear_marker = false;
                }
            }
        }

        self.phase = SessionPhase::Errored;
        self.cleanup(clear_marker);
        report.error = Some(error.to_string());
        self.observer.on_status_text(STATUS_ERRORED);
        self.observer.on_error(&error.to_string());
    }

    fn cleanup(&mut self, clear_marker: bool) {
        let was_patching = self.state.is_patching();
        self.state.reset();
        self.in_flight = None;
        self.handle.patching.store(false, Ordering::SeqCst);

        if clear_marker {
            if let Err(e) = self.marker.clear() {
                tracing::warn!("Could not remove recovery marker: {}", e);
            }
        }
        if let Err(e) = remove_if_exists(&self.paths.manifest_file) {
            tracing::warn!("Could not remove temporary manifest: {}", e);
        }

        if was_patching {
            self.observer.on_patching_state_changed(false);
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
