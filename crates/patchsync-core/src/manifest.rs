//! Manifest retrieval and parsing
//!
//! A manifest is plain text with one entry per line:
//!
//! ```text
//! <filename> <sha256-hex> <download-url>
//! ```
//!
//! The link may be the literal `null` when no primary location exists; such
//! entries are fetched from the fallback base only. Lines with fewer than
//! three fields are skipped with a warning. Fields after the third are
//! ignored.

use crate::hash::is_hex_digest;
use crate::transport::Transport;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Link value meaning "no primary link"
pub const NULL_LINK: &str = "null";

/// One file listed in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lower-cased relative path, used as the cache key
    pub filename: String,
    /// Expected hex checksum
    pub checksum: String,
    /// Primary download link
    pub link: Option<String>,
}

impl ManifestEntry {
    /// Location of this entry under `data_dir`
    pub fn local_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.filename)
    }
}

/// Parse a single manifest line
///
/// `line_number` is 1-based and only used for error reporting.
pub fn parse_manifest_line(line_number: usize, line: &str) -> Result<ManifestEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(Error::Parse {
            line: line_number,
            reason: format!("expected 3 fields, found {}", fields.len()),
        });
    }

    let filename = fields[0].to_lowercase();
    if !is_safe_relative_path(&filename) {
        return Err(Error::Parse {
            line: line_number,
            reason: format!("unsafe filename {:?}", fields[0]),
        });
    }

    let checksum = fields[1];
    if !is_hex_digest(checksum) {
        return Err(Error::Parse {
            line: line_number,
            reason: format!("checksum is not hex: {:?}", checksum),
        });
    }

    let link = (!fields[2].eq_ignore_ascii_case(NULL_LINK)).then(|| fields[2].to_string());

    Ok(ManifestEntry {
        filename,
        checksum: checksum.to_string(),
        link,
    })
}

/// Parse manifest text into an ordered list of entries
///
/// Invalid lines are logged and skipped. When a filename appears twice the
/// first entry wins.
pub fn parse_manifest(content: &str) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_manifest_line(index + 1, line) {
            Ok(entry) => {
                if seen.insert(entry.filename.clone()) {
                    entries.push(entry);
                } else {
                    tracing::warn!(
                        "Skipping duplicate manifest entry for {} on line {}",
                        entry.filename,
                        index + 1
                    );
                }
            }
            Err(e) => tracing::warn!("Skipping manifest line: {}", e),
        }
    }

    entries
}

/// Whether a manifest location should be downloaded rather than read locally
pub fn is_remote_location(location: &str) -> bool {
    let lower = location.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Downloads and parses manifests
#[derive(Debug)]
pub struct ManifestFetcher<'a, T> {
    transport: &'a T,
    temp_path: PathBuf,
}

impl<'a, T: Transport> ManifestFetcher<'a, T> {
    /// Create a fetcher that stages the manifest at `temp_path`
    pub fn new(transport: &'a T, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            temp_path: temp_path.into(),
        }
    }

    /// Retrieve the manifest at `location` and parse it
    ///
    /// Any retrieval failure is reported as [`Error::Network`].
    pub async fn fetch(&self, location: &str) -> Result<Vec<ManifestEntry>> {
        let location = location.trim();

        if is_remote_location(location) {
            self.transport
                .fetch(location, &self.temp_path, &mut |_| {})
                .await
                .map_err(|e| match e {
                    Error::Network(_) => e,
                    other => Error::Network(format!("Unable to download patch list: {}", other)),
                })?;
        } else {
            if let Some(parent) = self.temp_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(location, &self.temp_path)
                .await
                .map_err(|e| Error::Network(format!("Unable to read patch list {}: {}", location, e)))?;
        }

        let bytes = tokio::fs::read(&self.temp_path).await?;
        let entries = parse_manifest(&String::from_utf8_lossy(&bytes));
        tracing::info!("Manifest lists {} files", entries.len());
        Ok(entries)
    }
}

/// Whether `name` is a relative path made only of normal components
pub fn is_safe_relative_path(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && !name.contains('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Join `name` onto `data_dir` when it cannot escape it
pub fn resolve_data_path(data_dir: &Path, name: &str) -> Option<PathBuf> {
    is_safe_relative_path(name).then(|| data_dir.join(name))
}
