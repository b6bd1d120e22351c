//! Persistent checksum cache
//!
//! Maps filenames to the checksum last computed or downloaded for them, so a
//! session does not re-hash files already verified by an earlier run.
//!
//! The store is a plain text file with one `filename,CHECKSUM` pair per line.
//! Every [`ChecksumCache::save`] re-reads the file, merges it with the
//! in-memory entries (memory wins) and atomically replaces it, so a crashed or
//! older session never loses entries written by another.
//!
//! A sidecar `<cache>.version` file carries [`CACHE_FORMAT_VERSION`]. A cache
//! file without a matching sidecar was written by an older format and is
//! discarded on load. The sidecar is written before the cache file, so a crash
//! between the two never leaves a current cache looking unversioned.

use crate::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Current version of the cache format
pub const CACHE_FORMAT_VERSION: u32 = 2;

/// Extension of the sidecar holding the format version
const VERSION_SUFFIX: &str = "version";

/// In-memory view of the persisted checksum cache
#[derive(Debug, Clone)]
pub struct ChecksumCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ChecksumCache {
    /// Create an empty cache backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory entries with the persisted ones
    ///
    /// Returns the number of entries loaded.
    pub fn load(&mut self) -> Result<usize> {
        self.entries = self.read_persisted(true)?;
        tracing::debug!(
            "Loaded {} cached checksums from {:?}",
            self.entries.len(),
            self.path
        );
        Ok(self.entries.len())
    }

    /// Like [`load`](Self::load), but leaves an outdated store on disk
    ///
    /// An outdated store reads as empty.
    pub fn inspect(&mut self) -> Result<usize> {
        self.entries = self.read_persisted(false)?;
        Ok(self.entries.len())
    }

    /// Cached checksum for a file
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(&cache_key(filename)).map(String::as_str)
    }

    /// Record a checksum, replacing any previous value
    pub fn put(&mut self, filename: &str, checksum: &str) {
        self.entries
            .insert(cache_key(filename), checksum.trim().to_ascii_uppercase());
    }

    /// Number of entries in memory
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the in-memory view is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(filename, checksum)` pairs in filename order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge with the persisted store and write the result back
    pub fn save(&mut self) -> Result<()> {
        let mut merged = self.read_persisted(true)?;
        merged.extend(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut contents = String::new();
        for (filename, checksum) in &merged {
            contents.push_str(filename);
            contents.push(',');
            contents.push_str(checksum);
            contents.push('\n');
        }

        write_atomic(
            &version_path(&self.path),
            CACHE_FORMAT_VERSION.to_string().as_bytes(),
        )?;
        write_atomic(&self.path, contents.as_bytes())?;

        tracing::debug!("Saved {} cached checksums to {:?}", merged.len(), self.path);
        self.entries = merged;
        Ok(())
    }

    /// Delete the persisted store and forget every entry
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        remove_if_exists(&self.path)?;
        remove_if_exists(&version_path(&self.path))?;
        tracing::info!("Cleared checksum cache at {:?}", self.path);
        Ok(())
    }

    fn read_persisted(&self, discard_outdated: bool) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let version = read_version(&self.path)?;
        if version != Some(CACHE_FORMAT_VERSION) && !discard_outdated {
            tracing::debug!("Checksum cache {:?} has outdated format {:?}", self.path, version);
            return Ok(BTreeMap::new());
        }
        if version != Some(CACHE_FORMAT_VERSION) {
            tracing::warn!(
                "Discarding checksum cache {:?} with format version {:?} (current is {})",
                self.path,
                version,
                CACHE_FORMAT_VERSION
            );
            remove_if_exists(&self.path)?;
            remove_if_exists(&version_path(&self.path))?;
            return Ok(BTreeMap::new());
        }

        Ok(parse_cache(&contents))
    }
}

/// Parse cache file contents, skipping malformed lines
pub fn parse_cache(contents: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_cache_line(line) {
            Some((filename, checksum)) => {
                entries.insert(filename, checksum);
            }
            None => tracing::warn!("Skipping malformed cache line {}: {:?}", index + 1, line),
        }
    }
    entries
}

fn parse_cache_line(line: &str) -> Option<(String, String)> {
    let (filename, checksum) = line.rsplit_once(',')?;
    let filename = filename.trim();
    let checksum = checksum.trim();
    if filename.is_empty() || !crate::hash::is_hex_digest(checksum) {
        return None;
    }
    Some((cache_key(filename), checksum.to_ascii_uppercase()))
}

fn cache_key(filename: &str) -> String {
    filename.trim().to_lowercase()
}

/// Path of the sidecar version file for a cache file
pub fn version_path(cache_path: &Path) -> PathBuf {
    let mut name = cache_path.as_os_str().to_owned();
    name.push(".");
    name.push(VERSION_SUFFIX);
    PathBuf::from(name)
}

fn read_version(cache_path: &Path) -> Result<Option<u32>> {
    match fs::read_to_string(version_path(cache_path)) {
        Ok(s) => Ok(s.trim().parse().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a file by writing a sibling temp file and renaming it over the target
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&temp, path)?;
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const H1: &str = "AAAA1111";
    const H2: &str = "BBBB2222";

    fn cache_in(dir: &TempDir) -> ChecksumCache {
        ChecksumCache::new(dir.path().join("hash").join("cache.txt"))
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        assert!(cache.get("a.dat").is_none());

        cache.put("a.dat", "aaaa1111");
        assert_eq!(cache.get("a.dat"), Some(H1));
        assert_eq!(cache.get("A.DAT"), Some(H1));

        cache.put("a.dat", H2);
        assert_eq!(cache.get("a.dat"), Some(H2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_save_then_load_in_new_session() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("a.dat", H1);
        cache.put("b.dat", H2);
        cache.save().unwrap();

        let mut fresh = cache_in(&dir);
        assert_eq!(fresh.load().unwrap(), 2);
        assert_eq!(fresh.get("a.dat"), Some(H1));
        assert_eq!(fresh.get("b.dat"), Some(H2));
    }

    #[test]
    fn test_save_merges_with_persisted_entries() {
        let dir = TempDir::new().unwrap();

        let mut first = cache_in(&dir);
        first.put("a.dat", H1);
        first.put("shared.dat", H1);
        first.save().unwrap();

        // A second session that never loaded must not drop a.dat
        let mut second = cache_in(&dir);
        second.put("b.dat", H2);
        second.put("shared.dat", H2);
        second.save().unwrap();

        let mut reloaded = cache_in(&dir);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get("a.dat"), Some(H1));
        assert_eq!(reloaded.get("b.dat"), Some(H2));
        assert_eq!(reloaded.get("shared.dat"), Some(H2));
        assert_eq!(reloaded.len(), 3);
    }

    #[test]
    fn test_saved_file_is_deduplicated_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("a.dat", H1);
        cache.save().unwrap();
        cache.put("a.dat", H2);
        cache.save().unwrap();

        let contents = fs::read_to_string(cache.path()).unwrap();
        assert_eq!(contents, format!("a.dat,{}\n", H2));
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.txt");
        fs::write(
            &cache_path,
            "a.dat,AAAA1111\nno-comma-here\n,BBBB\nc.dat,not-hex\n\nd.dat , dddd4444 \n",
        )
        .unwrap();
        fs::write(version_path(&cache_path), CACHE_FORMAT_VERSION.to_string()).unwrap();

        let mut cache = ChecksumCache::new(&cache_path);
        assert_eq!(cache.load().unwrap(), 2);
        assert_eq!(cache.get("a.dat"), Some(H1));
        assert_eq!(cache.get("d.dat"), Some("DDDD4444"));
        assert!(cache.get("c.dat").is_none());
    }

    #[test]
    fn test_filename_with_comma_uses_last_separator() {
        let parsed = parse_cache("odd,name.dat,ABCD\n");
        assert_eq!(parsed.get("odd,name.dat").map(String::as_str), Some("ABCD"));
    }

    #[test]
    fn test_legacy_cache_without_version_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.txt");
        fs::write(&cache_path, "a.dat,AAAA1111\n").unwrap();

        let mut cache = ChecksumCache::new(&cache_path);
        assert_eq!(cache.load().unwrap(), 0);
        assert!(!cache_path.exists());
    }

    #[test]
    fn test_inspect_leaves_legacy_cache_on_disk() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.txt");
        fs::write(&cache_path, "a.dat,AAAA1111\n").unwrap();

        let mut cache = ChecksumCache::new(&cache_path);
        assert_eq!(cache.inspect().unwrap(), 0);
        assert!(cache_path.exists());

        fs::write(version_path(&cache_path), CACHE_FORMAT_VERSION.to_string()).unwrap();
        assert_eq!(cache.inspect().unwrap(), 1);
        assert_eq!(cache.get("a.dat"), Some(H1));
    }

    #[test]
    fn test_version_written_before_contents() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("a.dat", H1);
        cache.save().unwrap();

        let modified = |path: &Path| fs::metadata(path).unwrap().modified().unwrap();
        let version_written = modified(&version_path(cache.path()));
        let cache_written = modified(cache.path());
        assert!(version_written <= cache_written);

        // Sidecar alone, as left by a crash between the two writes
        fs::remove_file(cache.path()).unwrap();
        let mut reloaded = cache_in(&dir);
        assert_eq!(reloaded.load().unwrap(), 0);
        reloaded.put("b.dat", H2);
        reloaded.save().unwrap();
        assert_eq!(cache_in(&dir).inspect().unwrap(), 1);
    }

    #[test]
    fn test_old_version_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.txt");
        fs::write(&cache_path, "a.dat,AAAA1111\n").unwrap();
        fs::write(version_path(&cache_path), "1").unwrap();

        let mut cache = ChecksumCache::new(&cache_path);
        cache.put("b.dat", H2);
        cache.save().unwrap();

        let mut reloaded = ChecksumCache::new(&cache_path);
        reloaded.load().unwrap();
        assert!(reloaded.get("a.dat").is_none());
        assert_eq!(reloaded.get("b.dat"), Some(H2));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        assert_eq!(cache.load().unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_removes_store() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("a.dat", H1);
        cache.save().unwrap();
        assert!(cache.path().exists());

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!cache.path().exists());
        assert!(!version_path(cache.path()).exists());

        // Clearing twice is fine
        cache.clear().unwrap();
    }

    #[test]
    fn test_version_path() {
        assert_eq!(
            version_path(Path::new("/state/hash/cache.txt")),
            PathBuf::from("/state/hash/cache.txt.version")
        );
    }

    #[test]
    fn test_iter_is_sorted() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("b.dat", H2);
        cache.put("a.dat", H1);
        let names: Vec<_> = cache.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a.dat", "b.dat"]);
    }
}
