//! Advisory file lock guard for file-backed stores.
//!
//! The lock lives on a sidecar file rather than on the data file, because
//! the data file is replaced by rename on every write.

use crate::repo::store::{PersistenceError, StoreResult};
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Exclusive => "exclusive",
        }
    }
}

/// Held lock; released when dropped, on success and error paths alike.
#[derive(Debug)]
pub(crate) struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Blocks until the lock is held, or until `timeout` elapses.
    pub(crate) fn acquire(
        path: &Path,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> StoreResult<Self> {
        let started_at = Instant::now();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| PersistenceError::io("open lock file", path, source))?;

        match timeout {
            None => lock_blocking(&file, mode)
                .map_err(|source| PersistenceError::io("acquire lock", path, source))?,
            Some(timeout) => lock_with_deadline(&file, path, mode, timeout)?,
        }

        debug!(
            "event=store_lock module=repo status=ok mode={} wait_ms={}",
            mode.as_str(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(
                "event=store_unlock module=repo status=error path={} error={}",
                self.path.display(),
                err
            );
        }
    }
}

fn lock_blocking(file: &File, mode: LockMode) -> std::io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::lock_shared(file),
        LockMode::Exclusive => FileExt::lock_exclusive(file),
    }
}

fn try_lock(file: &File, mode: LockMode) -> std::io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    }
}

fn lock_with_deadline(
    file: &File,
    path: &Path,
    mode: LockMode,
    timeout: Duration,
) -> StoreResult<()> {
    let started_at = Instant::now();
    let contended = fs2::lock_contended_error().kind();

    loop {
        match try_lock(file, mode) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == contended || err.kind() == ErrorKind::WouldBlock => {
                let waited = started_at.elapsed();
                if waited >= timeout {
                    warn!(
                        "event=store_lock module=repo status=error mode={} wait_ms={} error_code=store_lock_timeout",
                        mode.as_str(),
                        waited.as_millis()
                    );
                    return Err(PersistenceError::LockTimeout {
                        path: path.to_path_buf(),
                        waited,
                    });
                }
                thread::sleep(LOCK_POLL_INTERVAL.min(timeout - waited));
            }
            Err(source) => return Err(PersistenceError::io("acquire lock", path, source)),
        }
    }
}
