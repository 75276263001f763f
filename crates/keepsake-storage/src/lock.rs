//! Exclusive write locks on storage keys.
//!
//! [`JsonStorage`](crate::JsonStorage) backs these with an advisory `flock`
//! on a sibling `.lock` file, so writers in different processes sharing one
//! data directory take turns. The lock file is left in place after release.

use crate::{StorageError, StorageResult};
use std::any::Any;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// How long [`JsonStorage`](crate::JsonStorage) waits for a held lock by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// An exclusive hold on one storage key. Released on drop.
#[must_use = "the lock is released as soon as it is dropped"]
pub struct StorageLock {
    _guard: Box<dyn Any + Send + Sync>,
}

impl StorageLock {
    /// Wrap whatever value keeps the lock held.
    pub fn new<G: Send + Sync + 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }

    /// A lock that excludes nobody, for backends with a single writer.
    pub fn unlocked() -> Self {
        Self::new(())
    }
}

impl fmt::Debug for StorageLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageLock").finish_non_exhaustive()
    }
}

/// Advisory lock on a file, held until drop.
#[derive(Debug)]
pub(crate) struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Poll for the lock on `path`, creating the file if needed.
    pub(crate) async fn acquire(path: &Path, timeout: Duration) -> StorageResult<Self> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .await?
            .into_std()
            .await;

        let deadline = Instant::now() + timeout;
        loop {
            if try_lock_exclusive(&file)? {
                trace!(path = %path.display(), "Acquired storage lock");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            if Instant::now() >= deadline {
                return Err(StorageError::LockTimeout {
                    path: path.display().to_string(),
                    waited: timeout,
                });
            }
            debug!(path = %path.display(), "Storage lock held elsewhere, waiting");
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unlock(&self.file);
        trace!(path = %self.path.display(), "Released storage lock");
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    use std::io::ErrorKind;
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

// No advisory locking off unix; writers fall back to last-rename-wins.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_second_holder_times_out_until_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.lock");

        let held = FileLock::acquire(&path, Duration::from_millis(100))
            .await
            .unwrap();
        let blocked = FileLock::acquire(&path, Duration::from_millis(120)).await;
        assert!(matches!(blocked, Err(StorageError::LockTimeout { .. })));

        drop(held);
        let again = FileLock::acquire(&path, Duration::from_millis(100)).await;
        assert!(again.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_unlocked_is_debug_printable() {
        let lock = StorageLock::unlocked();
        assert!(format!("{lock:?}").starts_with("StorageLock"));
    }
}
