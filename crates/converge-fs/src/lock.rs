//! Non-blocking advisory run lock
//!
//! A run lock marks a directory as owned by one writer. Acquisition never
//! waits: a second writer gets [`Error::LockHeld`] immediately, carrying the
//! pid recorded by the current holder when one can be read.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An exclusively held lock file. The lock is released on drop.
#[derive(Debug)]
pub struct RunLockFile {
    file: File,
    path: PathBuf,
}

impl RunLockFile {
    /// Try to take the exclusive lock at `path` without blocking.
    ///
    /// The lock file is created if missing. On success the current pid is
    /// written into it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                let holder = std::fs::read_to_string(path)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                tracing::debug!(path = %path.display(), ?holder, "run lock contended");
                return Err(Error::LockHeld {
                    path: path.to_path_buf(),
                    holder,
                });
            }
            return Err(Error::io(path, e));
        }

        file.set_len(0).map_err(|e| Error::io(path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(path, e))?;
        write!(file, "{}", std::process::id()).map_err(|e| Error::io(path, e))?;
        file.flush().map_err(|e| Error::io(path, e))?;

        tracing::debug!(path = %path.display(), "run lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLockFile {
    fn drop(&mut self) {
        // Leave the pid behind only while locked.
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
        tracing::debug!(path = %self.path.display(), "run lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");

        let _held = RunLockFile::try_acquire(&path).unwrap();
        let err = RunLockFile::try_acquire(&path).unwrap_err();

        match err {
            Error::LockHeld { path: p, holder } => {
                assert_eq!(p, path);
                assert_eq!(holder, Some(std::process::id().to_string()));
            }
            other => panic!("expected LockHeld, got {other:?}"),
        }
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.lock");

        {
            let _held = RunLockFile::try_acquire(&path).unwrap();
        }

        assert!(RunLockFile::try_acquire(&path).is_ok());
    }
}
