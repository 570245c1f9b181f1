//! Single-writer guard for a project's unit store.
//!
//! Units are written one file at a time, so two builds of the same project
//! would interleave their records. Phase commands hold the store exclusively
//! and publish which phases they run in a holder file next to the lock;
//! read-only commands take a shared lock, or report the running build when
//! they cannot.
//!
//! ```text
//! target/metaborg/units/
//! ├── .lock           # the locked file, never read
//! └── .lock.holder    # JSON LockHolder, present while a writer runs
//! ```

use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::phase::Phase;

pub const LOCK_FILENAME: &str = ".lock";
pub const HOLDER_FILENAME: &str = ".lock.holder";

/// Whether `name` is one of the lock's own files rather than a unit.
pub fn is_lock_file(name: &OsStr) -> bool {
  name == LOCK_FILENAME || name == HOLDER_FILENAME
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// The process writing to a unit store and what it is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub project: PathBuf,
  pub phases: Vec<Phase>,
  pub since_unix: u64,
}

impl fmt::Display for LockHolder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let phases: Vec<&str> = self.phases.iter().map(|p| p.as_str()).collect();
    write!(f, "PID {} running {}", self.pid, phases.join(", "))
  }
}

#[derive(Debug, Error)]
pub enum StoreLockError {
  #[error(
    "unit store is in use ({}); if no build is running, remove {}",
    holder_label(holder),
    lock_path.display()
  )]
  Busy {
    holder: Option<LockHolder>,
    lock_path: PathBuf,
  },

  #[error("failed to lock {}: {source}", path.display())]
  Io { path: PathBuf, source: io::Error },
}

fn holder_label(holder: &Option<LockHolder>) -> String {
  match holder {
    Some(holder) => holder.to_string(),
    None => "holder unknown".to_string(),
  }
}

/// A held lock on a unit store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
  _file: File,
  store: PathBuf,
  mode: LockMode,
}

impl StoreLock {
  /// Take the store for a run of `phases` over `project`.
  pub fn exclusive(store: &Path, project: &Path, phases: &[Phase]) -> Result<Self, StoreLockError> {
    let lock = Self::acquire(store, LockMode::Exclusive)?;
    let holder = LockHolder {
      pid: std::process::id(),
      project: project.to_path_buf(),
      phases: phases.to_vec(),
      since_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default(),
    };
    let path = store.join(HOLDER_FILENAME);
    let json = serde_json::to_vec_pretty(&holder).map_err(|e| StoreLockError::Io {
      path: path.clone(),
      source: io::Error::other(e),
    })?;
    fs::write(&path, json).map_err(|source| StoreLockError::Io { path, source })?;
    debug!(store = %store.display(), %holder, "unit store locked");
    Ok(lock)
  }

  /// Take the store for reading; any number of readers may hold it.
  pub fn shared(store: &Path) -> Result<Self, StoreLockError> {
    Self::acquire(store, LockMode::Shared)
  }

  fn acquire(store: &Path, mode: LockMode) -> Result<Self, StoreLockError> {
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source: io::Error| StoreLockError::Io { path, source }
    };

    fs::create_dir_all(store).map_err(io_err(store))?;
    let lock_path = store.join(LOCK_FILENAME);
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(io_err(&lock_path))?;

    if !try_lock(&file, mode).map_err(io_err(&lock_path))? {
      return Err(StoreLockError::Busy {
        holder: Self::holder(store),
        lock_path,
      });
    }

    Ok(Self {
      _file: file,
      store: store.to_path_buf(),
      mode,
    })
  }

  /// The current writer of `store`, if one has published itself.
  pub fn holder(store: &Path) -> Option<LockHolder> {
    let contents = fs::read(store.join(HOLDER_FILENAME)).ok()?;
    serde_json::from_slice(&contents).ok()
  }
}

impl Drop for StoreLock {
  fn drop(&mut self) {
    if self.mode == LockMode::Exclusive
      && let Err(e) = fs::remove_file(self.store.join(HOLDER_FILENAME))
      && e.kind() != io::ErrorKind::NotFound
    {
      warn!(store = %self.store.display(), error = %e, "failed to remove lock holder file");
    }
  }
}

/// Try to lock `file` without blocking. `Ok(false)` means another process
/// holds a conflicting lock.
#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<bool> {
  use rustix::fs::{FlockOperation, flock};
  use rustix::io::Errno;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };
  match flock(file, operation) {
    Ok(()) => Ok(true),
    Err(e) if e == Errno::WOULDBLOCK => Ok(false),
    Err(e) => Err(e.into()),
  }
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<bool> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};
  use windows_sys::Win32::System::IO::OVERLAPPED;

  let mut flags = LOCKFILE_FAIL_IMMEDIATELY;
  if mode == LockMode::Exclusive {
    flags |= LOCKFILE_EXCLUSIVE_LOCK;
  }

  // SAFETY: OVERLAPPED is plain data and all-zero means offset 0; the handle
  // is owned by `file`, which outlives the call.
  let locked = unsafe {
    let mut overlapped: OVERLAPPED = std::mem::zeroed();
    LockFileEx(file.as_raw_handle() as HANDLE, flags, 0, 1, 0, &mut overlapped)
  };
  if locked != 0 {
    return Ok(true);
  }

  let err = io::Error::last_os_error();
  if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
    Ok(false)
  } else {
    Err(err)
  }
}
