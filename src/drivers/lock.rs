//! Cross-process exclusive resource lock.
//!
//! Every driver that owns a physical peripheral (modem, soundcard) holds one
//! of these for its whole lifetime, so at most one driver instance exists
//! system-wide, across threads, processes, and independently launched tools.
//!
//! The lock is an advisory `flock(LOCK_EX)` on a well-known file.  `flock`
//! locks belong to the open file description, so two independent opens in
//! the same process also exclude each other.
//!
//! ## Guarantees
//!
//! - Acquisition is time-bounded; failure is [`Error::ResourceBusy`].
//! - Release happens exactly once: explicitly via [`ExclusiveLock::release`]
//!   or implicitly when the guard drops (normal return, `?`, panic unwind).
//! - No fairness between waiters.
//! - If the process is killed the in-process release never runs; the kernel
//!   drops the `flock` when the descriptor closes at process exit.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::{debug, warn};

use crate::error::{Error, Result};

/// Retry interval while waiting for a contended lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock lifecycle as seen by the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Held,
    Released,
}

/// RAII guard for an exclusively held resource.
#[derive(Debug)]
pub struct ExclusiveLock {
    path: PathBuf,
    /// The lock file, held open while the lock is held.
    file: Option<File>,
}

impl ExclusiveLock {
    /// Acquire the lock at `path`, retrying until `timeout` elapses.
    ///
    /// The lock file (and its parent directory) is created if needed.
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("lock acquired on {}", path.display());
                    return Ok(Self {
                        path,
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {}
                Err(e) => return Err(Error::Io(e)),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(
                    "could not acquire lock on {} within {:?}; another instance is running",
                    path.display(),
                    timeout
                );
                return Err(Error::ResourceBusy { path });
            }
            std::thread::sleep(LOCK_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    /// Release the lock.  Calling this on a released lock is a no-op.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                // Closing the descriptor below drops the flock regardless.
                warn!("unlock of {} failed: {}", self.path.display(), e);
            }
            debug!("released lock on {}", self.path.display());
        }
    }

    pub fn state(&self) -> LockState {
        if self.file.is_some() {
            LockState::Held
        } else {
            LockState::Released
        }
    }

    pub fn is_held(&self) -> bool {
        self.state() == LockState::Held
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        self.release();
    }
}
