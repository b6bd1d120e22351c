//! Exclusive lock over a state directory
//!
//! Two sessions sharing a state directory would interleave marker arming,
//! manifest temp files and cache saves. A [`SessionLock`] holds an advisory
//! lock on `session/lock` for as long as it lives; the operating system
//! releases it if the process dies, so a crash never leaves a stale lock.

use crate::{Error, Result};
use std::fs::{self, File, TryLockError};
use std::path::{Path, PathBuf};

/// Held for the duration of one session
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    _file: File,
}

impl SessionLock {
    /// Take the lock at `path` without waiting
    ///
    /// Returns [`Error::SessionBusy`] when another holder has it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock() {
            Ok(()) => {
                tracing::trace!("Acquired session lock {:?}", path);
                Ok(Self {
                    path: path.to_path_buf(),
                    _file: file,
                })
            }
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("Session lock {:?} is held by another session", path);
                Err(Error::SessionBusy)
            }
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_holder_is_busy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("lock");

        let held = SessionLock::acquire(&path).unwrap();
        assert!(held.path().exists());
        assert!(matches!(SessionLock::acquire(&path), Err(Error::SessionBusy)));
    }

    #[test]
    fn test_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("lock");

        drop(SessionLock::acquire(&path).unwrap());
        assert!(SessionLock::acquire(&path).is_ok());
    }
}
