//! Exclusive lock serializing reconciliation runs on one host.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another run holds {0}")]
    Busy(PathBuf),

    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock {path}: {errno}")]
    Lock { path: PathBuf, errno: Errno },
}

/// Held for the duration of a run; the lock is released on drop.
#[derive(Debug)]
pub struct RunLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Self {
                _lock: lock,
                path: path.to_path_buf(),
            }),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(LockError::Busy(path.to_path_buf())),
            Err((_, errno)) => Err(LockError::Lock {
                path: path.to_path_buf(),
                errno,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
