//! Single-instance guard (§4.12): stops a second voicekey daemon from
//! fighting the first one over the microphone and hotkeys.
//!
//! Lock id is namespaced to `voicekey`. POSIX gets an advisory exclusive
//! file lock (`flock`); Windows gets a byte-region lock; any other target
//! (used by tests run off those platforms) gets a deterministic in-process
//! lock keyed by path so behavior stays observable without touching the
//! filesystem's locking semantics.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::error::LifecycleError;

const LOCK_ID: &str = "voicekey";

fn lock_path(dir: &Path) -> PathBuf {
    dir.join(format!("{LOCK_ID}.lock"))
}

fn in_process_registry() -> &'static Mutex<HashSet<PathBuf>> {
    static REGISTRY: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Holds the exclusive lock for the lifetime of the daemon process.
/// Dropping releases it; [`InstanceLock::release`] does the same explicitly.
pub struct InstanceLock {
    path: PathBuf,
    _file: File,
    via_registry: bool,
}

impl InstanceLock {
    /// Acquire the lock in the per-user runtime directory (`0o700` on
    /// POSIX), creating the directory if needed.
    pub fn acquire() -> Result<Self, LifecycleError> {
        Self::acquire_in(&crate::config::Config::runtime_dir())
    }

    /// Acquire the lock rooted at an explicit directory, for tests.
    pub fn acquire_in(dir: &Path) -> Result<Self, LifecycleError> {
        ensure_lock_dir(dir)?;
        let path = lock_path(dir);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| LifecycleError::DuplicateInstanceStartup {
                lock_path: format!("{}: failed to open lock file: {e}", path.display()),
            })?;

        if cfg!(any(unix, windows)) {
            lock_exclusive(&file).map_err(|_| LifecycleError::DuplicateInstanceStartup {
                lock_path: path.display().to_string(),
            })?;
            Ok(InstanceLock {
                path,
                _file: file,
                via_registry: false,
            })
        } else {
            let mut registry = in_process_registry().lock().unwrap();
            if !registry.insert(path.clone()) {
                return Err(LifecycleError::DuplicateInstanceStartup {
                    lock_path: path.display().to_string(),
                });
            }
            Ok(InstanceLock {
                path,
                _file: file,
                via_registry: true,
            })
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.path
    }

    /// Explicit, idempotent release. Dropping the guard does the same.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if self.via_registry {
            in_process_registry().lock().unwrap().remove(&self.path);
        } else {
            unlock_exclusive(&self._file);
        }
    }
}

#[cfg(unix)]
fn ensure_lock_dir(dir: &Path) -> Result<(), LifecycleError> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(dir).map_err(|e| LifecycleError::DuplicateInstanceStartup {
        lock_path: format!("{}: failed to create lock dir: {e}", dir.display()),
    })?;
    if let Ok(meta) = fs::metadata(dir) {
        let mut perms = meta.permissions();
        perms.set_mode(0o700);
        let _ = fs::set_permissions(dir, perms);
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_lock_dir(dir: &Path) -> Result<(), LifecycleError> {
    fs::create_dir_all(dir).map_err(|e| LifecycleError::DuplicateInstanceStartup {
        lock_path: format!("{}: failed to create lock dir: {e}", dir.display()),
    })?;
    Ok(())
}

#[cfg(any(unix, windows))]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use fs2::FileExt;
    file.try_lock_exclusive()
}

#[cfg(not(any(unix, windows)))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(any(unix, windows))]
fn unlock_exclusive(file: &File) {
    use fs2::FileExt;
    let _ = file.unlock();
}

#[cfg(not(any(unix, windows)))]
fn unlock_exclusive(_file: &File) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_in_same_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let first = InstanceLock::acquire_in(dir.path()).unwrap();
        let second = InstanceLock::acquire_in(dir.path());
        assert!(second.is_err());
        drop(first);
        let third = InstanceLock::acquire_in(dir.path());
        assert!(third.is_ok());
    }

    #[test]
    fn release_is_idempotent_with_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let lock = InstanceLock::acquire_in(dir.path()).unwrap();
        lock.release();
        let reacquired = InstanceLock::acquire_in(dir.path());
        assert!(reacquired.is_ok());
    }

    #[test]
    fn duplicate_error_message_includes_lock_path() {
        let dir = tempfile::tempdir().unwrap();
        let _first = InstanceLock::acquire_in(dir.path()).unwrap();
        let err = InstanceLock::acquire_in(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&dir.path().join("voicekey.lock").display().to_string()));
    }
}
