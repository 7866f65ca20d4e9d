// src/lock.rs

//! Named cross-process operation locks
//!
//! Before touching a kit's files or manifest, the orchestrator takes the lock
//! named after the operation. Locks live at `<locks_dir>/<name>.lock` and are
//! held with `flock(LOCK_EX)`, so the kernel drops them if the holder dies.
//! The lock file also carries a small JSON record of who holds it, which is
//! only used to make contention errors actionable.
//!
//! Acquisition never waits: contention fails the invocation immediately.
//!
//! ```ignore
//! let lock = OperationLock::acquire(&locks_dir, "update", DEFAULT_STALE_AFTER)?;
//! // ... mutate files and manifest ...
//! lock.release()?;
//! ```

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Holder age after which a contended lock is reported as stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Who holds a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub pid: u32,
    pub operation: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn age(&self) -> Duration {
        (Utc::now() - self.acquired_at).to_std().unwrap_or_default()
    }
}

/// An exclusive named lock, released on drop
pub struct OperationLock {
    file: File,
    path: PathBuf,
    name: String,
    released: bool,
}

impl OperationLock {
    /// Path of the lock file for `name`
    pub fn lock_path(locks_dir: &Path, name: &str) -> PathBuf {
        locks_dir.join(format!("{}.lock", name))
    }

    /// Take the lock or fail with [`Error::LockContention`]
    pub fn acquire(locks_dir: &Path, name: &str, stale_after: Duration) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::InvalidPath(format!("Invalid lock name: {:?}", name)));
        }

        fs::create_dir_all(locks_dir)?;
        let path = Self::lock_path(locks_dir, name);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                Error::IoError(format!("Failed to open lock file {}: {}", path.display(), e))
            })?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contention(&e) {
                return Err(contention_error(name, &path, stale_after));
            }
            return Err(Error::IoError(format!(
                "Failed to lock {}: {}",
                path.display(),
                e
            )));
        }

        if let Some(previous) = read_holder_from(&mut file) {
            warn!(
                "Lock '{}' was left behind by process {} ({}), taking it over",
                name, previous.pid, previous.operation
            );
        }

        let holder = LockHolder {
            pid: std::process::id(),
            operation: name.to_string(),
            acquired_at: Utc::now(),
        };
        write_holder(&mut file, &holder)?;

        info!("Acquired lock '{}' at {}", name, path.display());

        Ok(Self {
            file,
            path,
            name: name.to_string(),
            released: false,
        })
    }

    /// Whether some process currently holds the lock
    pub fn is_held(locks_dir: &Path, name: &str) -> bool {
        let path = Self::lock_path(locks_dir, name);
        let Ok(file) = File::open(&path) else {
            return false;
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    /// Read the holder record of a lock file, if any
    pub fn holder(locks_dir: &Path, name: &str) -> Option<LockHolder> {
        let mut file = File::open(Self::lock_path(locks_dir, name)).ok()?;
        read_holder_from(&mut file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the lock, reporting failures
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        // Clear the record first so nobody reads a holder that is gone
        self.file.set_len(0)?;
        FileExt::unlock(&self.file)
            .map_err(|e| Error::IoError(format!("Failed to unlock {}: {}", self.path.display(), e)))?;

        info!("Released lock '{}'", self.name);
        Ok(())
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!("Failed to release lock '{}': {}", self.name, e);
        }
    }
}

impl std::fmt::Debug for OperationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationLock")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}

fn is_contention(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn contention_error(name: &str, path: &Path, stale_after: Duration) -> Error {
    let holder = File::open(path).ok().and_then(|mut f| read_holder_from(&mut f));

    let stale = holder
        .as_ref()
        .is_some_and(|h| h.age() > stale_after || !process_alive(h.pid));

    debug!("Lock '{}' is contended (holder: {:?}, stale: {})", name, holder, stale);

    Error::LockContention {
        name: name.to_string(),
        path: path.to_path_buf(),
        holder_pid: holder.as_ref().map(|h| h.pid),
        held_for_secs: holder.as_ref().map(|h| h.age().as_secs()),
        stale,
    }
}

fn read_holder_from(file: &mut File) -> Option<LockHolder> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    if content.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&content).ok()
}

fn write_holder(file: &mut File, holder: &LockHolder) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer(&mut *file, holder)?;
    file.flush()?;
    Ok(())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => true,
        // Exists but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
