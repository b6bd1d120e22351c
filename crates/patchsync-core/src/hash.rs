//! Streaming content hashing
//!
//! [`HashEngine`] reads a file in 4 KiB chunks into a SHA-256 accumulator and
//! produces an uppercase hex digest. Progress is reported as an integer
//! percentage, throttled so a UI is not flooded on large files.
//!
//! # Example
//!
//! ```ignore
//! use patchsync_core::hash::HashEngine;
//!
//! let mut engine = HashEngine::new().on_progress(|pct| println!("{}%", pct));
//! let digest = engine.hash_file("Data/patch-a.mpq")?;
//! ```

use crate::config::DEFAULT_HASH_PROGRESS_INTERVAL;
use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Chunk size used when reading content
pub const HASH_CHUNK_SIZE: usize = 4 * 1024;

/// Progress callback receiving a percentage in `0..=100`
pub type HashProgressCallback = Box<dyn FnMut(u8) + Send>;

/// Streaming SHA-256 hasher with throttled progress reporting
pub struct HashEngine {
    progress_interval: u64,
    progress_callback: Option<HashProgressCallback>,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HashEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashEngine")
            .field("progress_interval", &self.progress_interval)
            .field("has_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl HashEngine {
    /// Create an engine reporting progress every 1 MiB
    pub fn new() -> Self {
        Self {
            progress_interval: DEFAULT_HASH_PROGRESS_INTERVAL,
            progress_callback: None,
        }
    }

    /// Set the minimum number of bytes between progress reports
    pub fn progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval = bytes.max(1);
        self
    }

    /// Set progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Hash a file on disk
    pub fn hash_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        tracing::debug!("Hashing {:?} ({} bytes)", path, size);
        self.hash_reader(&mut file, size)
    }

    /// Hash `total_size` bytes from a reader
    ///
    /// `total_size` only drives the progress percentage; the digest covers
    /// whatever the reader yields until EOF.
    pub fn hash_reader<R: Read + ?Sized>(&mut self, reader: &mut R, total_size: u64) -> Result<String> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; HASH_CHUNK_SIZE];
        let mut bytes_read = 0u64;
        let mut last_report_at = 0u64;
        let mut last_percent: Option<u8> = None;

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..n]);
            bytes_read += n as u64;

            if bytes_read - last_report_at >= self.progress_interval {
                last_report_at = bytes_read;
                self.report(progress_percent(bytes_read, total_size), &mut last_percent);
            }
        }

        self.report(100, &mut last_percent);
        Ok(hex::encode_upper(hasher.finalize()))
    }

    fn report(&mut self, percent: u8, last_percent: &mut Option<u8>) {
        if *last_percent == Some(percent) {
            return;
        }
        *last_percent = Some(percent);
        if let Some(ref mut callback) = self.progress_callback {
            callback(percent);
        }
    }
}

/// `floor(read * 100 / total)`, clamped to 100; an empty total counts as done
pub fn progress_percent(bytes_read: u64, total_size: u64) -> u8 {
    if total_size == 0 {
        return 100;
    }
    let pct = (u128::from(bytes_read) * 100 / u128::from(total_size)).min(100);
    pct as u8
}

/// Case-insensitive comparison of two hex digests
pub fn checksums_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Whether a string is a non-empty run of hex digits
pub fn is_hex_digest(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}
