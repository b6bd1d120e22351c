//! Recovery marker for interrupted downloads
//!
//! While a file is being fetched its name is written to a single marker
//! file. If the process stops before the fetch completes, the next session
//! finds the marker, deletes the named file and re-fetches it instead of
//! trusting a truncated copy.

use crate::cache::{remove_if_exists, write_atomic};
use crate::manifest::resolve_data_path;
use crate::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Single-entry marker naming the file currently in flight
#[derive(Debug, Clone)]
pub struct RecoveryMarker {
    path: PathBuf,
}

impl RecoveryMarker {
    /// Create a marker backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the marker file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `filename` as in flight, replacing any previous marker
    pub fn arm(&self, filename: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, filename.as_bytes())?;
        tracing::trace!("Recovery marker armed for {}", filename);
        Ok(())
    }

    /// Filename recorded by the marker, if one exists
    pub fn current(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let name = contents.lines().next().unwrap_or("").trim();
                Ok((!name.is_empty()).then(|| name.to_lowercase()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the marker; absence is not an error
    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)?;
        Ok(())
    }

    /// Delete the file named by a leftover marker and clear the marker
    ///
    /// Returns the discarded filename. A marker naming a path outside
    /// `data_dir` is cleared without touching anything.
    pub fn discard_interrupted(&self, data_dir: &Path) -> Result<Option<String>> {
        let Some(name) = self.current()? else {
            return Ok(None);
        };

        match resolve_data_path(data_dir, &name) {
            Some(path) => {
                if remove_if_exists(&path)? {
                    tracing::info!("Deleted partially downloaded file {}", name);
                } else {
                    tracing::debug!("Interrupted file {} was never written", name);
                }
            }
            None => tracing::warn!("Ignoring recovery marker with unsafe path {:?}", name),
        }

        self.clear()?;
        Ok(Some(name))
    }
}
