//! Persistent storage for build units.
//!
//! # Storage Layout
//!
//! ```text
//! {project}/target/metaborg/units/
//! ├── .lock                       # advisory lock, see `store_lock`
//! └── <builder-id>/<key>.json     # one BuildUnit per request
//! ```
//!
//! Every write goes to a temporary file in the destination directory and is
//! then renamed over the old file, so a crash leaves either the old or the new
//! unit, never a torn one.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::UNIT_FORMAT_VERSION;
use crate::store_lock::is_lock_file;

use super::types::BuildUnit;

const UNIT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum UnitStoreError {
  #[error("unit location must be a relative path inside the store: {}", .0.display())]
  InvalidLocation(PathBuf),

  #[error("failed to create {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },

  #[error("failed to read unit {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("corrupt unit {}: {source}", path.display())]
  Parse { path: PathBuf, source: serde_json::Error },

  #[error("failed to serialize unit: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write unit {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to remove {}: {source}", path.display())]
  Remove { path: PathBuf, source: io::Error },
}

/// Directory of persisted build units for one project.
#[derive(Debug, Clone)]
pub struct UnitStore {
  base_path: PathBuf,
}

impl UnitStore {
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Absolute path of a unit location.
  pub fn unit_path(&self, location: &Path) -> Result<PathBuf, UnitStoreError> {
    let escapes = location
      .components()
      .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if location.as_os_str().is_empty() || escapes {
      return Err(UnitStoreError::InvalidLocation(location.to_path_buf()));
    }
    Ok(self.base_path.join(location))
  }

  /// Load the unit stored at `location`.
  ///
  /// Returns `Ok(None)` when nothing is stored there, or when the file was
  /// written by an incompatible format version (it will simply be rebuilt).
  pub fn load(&self, location: &Path) -> Result<Option<BuildUnit>, UnitStoreError> {
    let path = self.unit_path(location)?;

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(UnitStoreError::Read { path, source }),
    };

    let value: serde_json::Value =
      serde_json::from_str(&content).map_err(|source| UnitStoreError::Parse { path: path.clone(), source })?;
    let version = value.get("version").and_then(|v| v.as_u64());
    if version != Some(u64::from(UNIT_FORMAT_VERSION)) {
      warn!(path = %path.display(), ?version, "ignoring unit with unsupported format version");
      return Ok(None);
    }

    let unit = serde_json::from_value(value).map_err(|source| UnitStoreError::Parse { path, source })?;
    Ok(Some(unit))
  }

  /// Atomically write `unit` to `location`.
  pub fn store(&self, location: &Path, unit: &BuildUnit) -> Result<(), UnitStoreError> {
    let path = self.unit_path(location)?;
    let dir = path.parent().unwrap_or(&self.base_path);
    fs::create_dir_all(dir).map_err(|source| UnitStoreError::CreateDir {
      path: dir.to_path_buf(),
      source,
    })?;

    let content = serde_json::to_vec_pretty(unit).map_err(UnitStoreError::Serialize)?;
    let write_err = |source| UnitStoreError::Write {
      path: path.clone(),
      source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(&content).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), key = %unit.key, "unit stored");
    Ok(())
  }

  /// Load every unit in the store, in path order.
  ///
  /// Unreadable or incompatible files are skipped with a warning.
  pub fn list(&self) -> Result<Vec<BuildUnit>, UnitStoreError> {
    if !self.base_path.exists() {
      return Ok(Vec::new());
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(&self.base_path).sort_by_file_name() {
      let entry = entry.map_err(|e| UnitStoreError::Read {
        path: self.base_path.clone(),
        source: e.into(),
      })?;
      let is_unit = entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == UNIT_EXTENSION);
      if !is_unit {
        continue;
      }

      let Ok(location) = entry.path().strip_prefix(&self.base_path) else {
        continue;
      };
      match self.load(location) {
        Ok(Some(unit)) => units.push(unit),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "skipping unreadable unit"),
      }
    }

    Ok(units)
  }

  /// Remove every persisted unit. The lock's own files are kept.
  ///
  /// Returns the number of unit files removed.
  pub fn clear(&self) -> Result<usize, UnitStoreError> {
    let entries = match fs::read_dir(&self.base_path) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(source) => {
        return Err(UnitStoreError::Read {
          path: self.base_path.clone(),
          source,
        });
      }
    };

    let mut removed = 0;
    for entry in entries {
      let entry = entry.map_err(|source| UnitStoreError::Read {
        path: self.base_path.clone(),
        source,
      })?;
      let path = entry.path();
      if is_lock_file(&entry.file_name()) {
        continue;
      }

      let remove_err = |source| UnitStoreError::Remove {
        path: path.clone(),
        source,
      };
      if path.is_dir() {
        removed += count_units(&path);
        fs::remove_dir_all(&path).map_err(remove_err)?;
      } else {
        if path.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
          removed += 1;
        }
        fs::remove_file(&path).map_err(remove_err)?;
      }
    }

    debug!(path = %self.base_path.display(), removed, "unit store cleared");
    Ok(removed)
  }
}

fn count_units(dir: &Path) -> usize {
  WalkDir::new(dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == UNIT_EXTENSION))
    .count()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::{BuildRequest, RequestKey};
  use crate::fingerprint::Fingerprint;
  use crate::manager::Failure;
  use crate::store_lock::{HOLDER_FILENAME, LOCK_FILENAME};
  use crate::unit::{ResultStamp, UnitState};
  use crate::util::hash::{ContentHash, ObjectHash};
  use serde_json::json;
  use tempfile::TempDir;

  fn sample_unit() -> BuildUnit {
    let request = BuildRequest {
      builder: "rtg2sig".to_string(),
      input: json!({ "module": "Entity", "args": ["-Idef"] }),
    };
    let mut unit = BuildUnit::new(
      RequestKey(ObjectHash("0123456789abcdef0123".to_string())),
      request,
      "Generate signatures for Entity".to_string(),
    );
    unit.start();
    unit.record_required_path(
      PathBuf::from("/p/include/Entity.rtg"),
      Fingerprint::File {
        hash: ContentHash("ab".repeat(32)),
      },
    );
    unit.record_required_build(
      RequestKey(ObjectHash("fedcba98765432100000".to_string())),
      BuildRequest {
        builder: "sdf2rtg".to_string(),
        input: json!({ "module": "Entity" }),
      },
      ResultStamp::Output(json!("/p/include/Entity.rtg")),
    );
    unit.record_provided_path(PathBuf::from("/p/include/Entity.str"));
    unit.provided_paths[0].fingerprint = Fingerprint::Modified {
      entries: 1,
      size: 42,
      mtime_nanos: 1_700_000_000_000_000_000,
    };
    unit.succeed(json!({ "signature": "/p/include/Entity.str" }));
    unit
  }

  #[test]
  fn load_missing_unit_returns_none() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());

    assert!(store.load(Path::new("rtg2sig/abc.json")).unwrap().is_none());
  }

  #[test]
  fn store_then_load_roundtrips() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    let unit = sample_unit();
    let location = Path::new("rtg2sig/0123456789abcdef0123.json");

    store.store(location, &unit).unwrap();
    let loaded = store.load(location).unwrap().unwrap();

    assert_eq!(loaded, unit);
  }

  #[test]
  fn failed_unit_roundtrips() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    let mut unit = sample_unit();
    unit.fail(Failure::ToolExecution {
      tool: "rtg2sig".to_string(),
      code: Some(2),
      diagnostics: "malformed rtg".to_string(),
    });
    let location = Path::new("rtg2sig/failed.json");

    store.store(location, &unit).unwrap();
    let loaded = store.load(location).unwrap().unwrap();

    assert_eq!(loaded.state, unit.state);
    assert!(loaded.output.is_none());
  }

  #[test]
  fn store_overwrites_without_leaving_temp_files() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    let location = Path::new("rtg2sig/k.json");

    let mut unit = sample_unit();
    store.store(location, &unit).unwrap();
    unit.state = UnitState::InProgress;
    store.store(location, &unit).unwrap();

    let files: Vec<_> = fs::read_dir(temp.path().join("rtg2sig")).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(store.load(location).unwrap().unwrap().state, UnitState::InProgress);
  }

  #[test]
  fn corrupt_unit_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    fs::create_dir_all(temp.path().join("rtg2sig")).unwrap();
    fs::write(temp.path().join("rtg2sig/bad.json"), "{ not json").unwrap();

    let err = store.load(Path::new("rtg2sig/bad.json")).unwrap_err();
    assert!(matches!(err, UnitStoreError::Parse { .. }));
  }

  #[test]
  fn other_format_version_is_ignored() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    fs::write(temp.path().join("old.json"), r#"{ "version": 0 }"#).unwrap();

    assert!(store.load(Path::new("old.json")).unwrap().is_none());
  }

  #[test]
  fn locations_cannot_escape_the_store() {
    let store = UnitStore::new(PathBuf::from("/p/units"));

    assert!(store.unit_path(Path::new("../outside.json")).is_err());
    assert!(store.unit_path(Path::new("/abs.json")).is_err());
    assert!(store.unit_path(Path::new("")).is_err());
    assert_eq!(
      store.unit_path(Path::new("pack-sdf/k.json")).unwrap(),
      PathBuf::from("/p/units/pack-sdf/k.json")
    );
  }

  #[test]
  fn list_and_clear() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().to_path_buf());
    store.store(Path::new("a/1.json"), &sample_unit()).unwrap();
    store.store(Path::new("b/2.json"), &sample_unit()).unwrap();
    fs::write(temp.path().join(LOCK_FILENAME), "").unwrap();
    fs::write(temp.path().join(HOLDER_FILENAME), "{}").unwrap();

    assert_eq!(store.list().unwrap().len(), 2);

    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.list().unwrap().is_empty());
    assert!(temp.path().join(LOCK_FILENAME).exists());
    assert!(temp.path().join(HOLDER_FILENAME).exists());
  }

  #[test]
  fn clear_missing_store_is_noop() {
    let temp = TempDir::new().unwrap();
    let store = UnitStore::new(temp.path().join("never-created"));
    assert_eq!(store.clear().unwrap(), 0);
  }
}
