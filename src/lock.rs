//! Optional update lock.
//!
//! An exclusive lock file in the data directory gives at-most-one concurrent
//! update across processes. The lock is created with `create_new`, removed
//! when the guard drops, and evicted if a crashed holder left it behind for
//! longer than the configured age.
//!
//! Eviction is best effort: the lock is re-read immediately before removal and
//! left alone if its stamp or modification time changed, which narrows but
//! does not close the window in which a fresh lock could be removed.

use crate::error::{FreshenError, Result};
use crate::marker::now_epoch_millis;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Outcome of a lock acquisition attempt.
#[derive(Debug)]
pub enum LockAttempt {
    /// This process holds the lock until the guard drops.
    Acquired(UpdateLockGuard),
    /// Another process holds a live lock.
    Held,
}

/// File-backed exclusive lock around the update step.
#[derive(Debug, Clone)]
pub struct UpdateLock {
    path: PathBuf,
    stale_after: Duration,
}

impl UpdateLock {
    /// Lock at `path`; leftovers older than `stale_after` are evicted.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    /// Lock file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created for a reason other
    /// than already existing.
    pub fn try_acquire(&self) -> Result<LockAttempt> {
        match self.create() {
            Ok(guard) => return Ok(LockAttempt::Acquired(guard)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(self.create_error(e)),
        }

        if !self.evict_stale_lock() {
            return Ok(LockAttempt::Held);
        }

        match self.create() {
            Ok(guard) => Ok(LockAttempt::Acquired(guard)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(LockAttempt::Held),
            Err(e) => Err(self.create_error(e)),
        }
    }

    fn create(&self) -> std::io::Result<UpdateLockGuard> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        let stamp = format!("{} {}", std::process::id(), now_epoch_millis());
        if let Err(e) = file.write_all(stamp.as_bytes()) {
            debug!("cannot stamp update lock {}: {e}", self.path.display());
        }
        debug!("acquired update lock {}", self.path.display());
        Ok(UpdateLockGuard {
            path: self.path.clone(),
        })
    }

    fn create_error(&self, e: std::io::Error) -> FreshenError {
        FreshenError::Lock(format!(
            "failed to create update lock {}: {e}",
            self.path.display()
        ))
    }

    /// Remove the lock file if it is older than `stale_after`. Returns `true`
    /// when a leftover lock was removed.
    fn evict_stale_lock(&self) -> bool {
        let snapshot = match self.snapshot() {
            Ok(Some(snapshot)) => snapshot,
            // Holder released it between our attempts.
            Ok(None) => return true,
            Err(_) => return false,
        };

        let age = match SystemTime::now().duration_since(snapshot.modified) {
            Ok(age) => age,
            Err(_) => return false,
        };

        if age <= self.stale_after {
            return false;
        }

        warn!(
            "evicting stale update lock {} ({}s old)",
            self.path.display(),
            age.as_secs()
        );
        self.remove_if_unchanged(&snapshot)
    }

    fn snapshot(&self) -> std::io::Result<Option<LockSnapshot>> {
        let modified = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let stamp = match std::fs::read_to_string(&self.path) {
            Ok(stamp) => stamp,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(LockSnapshot { modified, stamp }))
    }

    /// Remove the lock only if it still matches `seen`. A lock that another
    /// process replaced in the meantime is kept.
    fn remove_if_unchanged(&self, seen: &LockSnapshot) -> bool {
        match self.snapshot() {
            Ok(Some(current)) if current == *seen => {}
            Ok(None) => return true,
            Ok(Some(_)) => {
                debug!(
                    "update lock {} changed during eviction; keeping it",
                    self.path.display()
                );
                return false;
            }
            Err(_) => return false,
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) => e.kind() == std::io::ErrorKind::NotFound,
        }
    }
}

/// Identity of a lock file as observed at one point in time.
#[derive(Debug, PartialEq, Eq)]
struct LockSnapshot {
    modified: SystemTime,
    stamp: String,
}

/// Held update lock. Removes the lock file on drop.
#[derive(Debug)]
pub struct UpdateLockGuard {
    path: PathBuf,
}

impl Drop for UpdateLockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
