//! File-system fingerprints, the primitive staleness detector.
//!
//! A fingerprint is a cheap, stable summary of what a path looked like when a
//! builder required or provided it. Comparing the recorded fingerprint with a
//! freshly computed one tells the build manager whether the path changed.
//!
//! A missing path has its own fingerprint, [`Fingerprint::Absent`], so that
//! "required, then deleted" and "optional, then created" both register as
//! changes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::util::hash::{ContentHash, HashError, hash_bytes, hash_file, hash_tree};

/// How fingerprints are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stamper {
  /// SHA-256 of file contents (or of the whole tree for directories).
  #[default]
  Hash,
  /// Size plus modification time.
  Modified,
}

impl std::str::FromStr for Stamper {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "hash" => Ok(Stamper::Hash),
      "modified" => Ok(Stamper::Modified),
      other => Err(format!("unknown stamper '{}' (expected 'hash' or 'modified')", other)),
    }
  }
}

/// The recorded state of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fingerprint {
  /// The path did not exist.
  Absent,
  /// Content hash of a regular file.
  File { hash: ContentHash },
  /// Content hash of a directory tree.
  Directory { hash: ContentHash },
  /// Hash of the sorted names of matching files under a directory.
  Listing { hash: ContentHash },
  /// Modification signature. For directories `size` is the sum over all files
  /// and `mtime_nanos` the newest entry.
  Modified { entries: u64, size: u64, mtime_nanos: u64 },
}

impl Fingerprint {
  pub fn is_absent(&self) -> bool {
    matches!(self, Fingerprint::Absent)
  }
}

#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to stat {}: {source}", path.display())]
  Metadata { path: PathBuf, source: io::Error },
}

/// Computes fingerprints with a fixed [`Stamper`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintStore {
  stamper: Stamper,
}

impl FingerprintStore {
  pub fn new(stamper: Stamper) -> Self {
    Self { stamper }
  }

  /// Fingerprint `path` as it is right now.
  pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, FingerprintError> {
    let metadata = match fs::metadata(path) {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Fingerprint::Absent),
      Err(source) => {
        return Err(FingerprintError::Metadata {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let result = match self.stamper {
      Stamper::Hash if metadata.is_dir() => hash_tree(path).map(|hash| Fingerprint::Directory { hash }),
      Stamper::Hash => hash_file(path).map(|hash| Fingerprint::File { hash }),
      Stamper::Modified if metadata.is_dir() => modified_tree(path),
      Stamper::Modified => Ok(Fingerprint::Modified {
        entries: 1,
        size: metadata.len(),
        mtime_nanos: mtime_nanos(&metadata),
      }),
    };
    absent_if_vanished(result)
  }

  /// Fingerprint which files under `dir` end in `.{extension}`.
  ///
  /// Only the set of names is stamped, not their contents, so a file that
  /// appears or disappears is a change even when each file is also required
  /// on its own. The stamper does not apply.
  pub fn listing(&self, dir: &Path, extension: &str) -> Result<Fingerprint, FingerprintError> {
    if !dir.is_dir() {
      return Ok(Fingerprint::Absent);
    }
    absent_if_vanished(listing_hash(dir, extension).map(|hash| Fingerprint::Listing { hash }))
  }

  /// Whether `path` no longer matches `previous`.
  pub fn changed(&self, path: &Path, previous: &Fingerprint) -> Result<bool, FingerprintError> {
    Ok(self.fingerprint(path)? != *previous)
  }

  /// Whether the `.{extension}` files under `dir` are no longer the ones in `previous`.
  pub fn listing_changed(&self, dir: &Path, extension: &str, previous: &Fingerprint) -> Result<bool, FingerprintError> {
    Ok(self.listing(dir, extension)? != *previous)
  }
}

fn absent_if_vanished(result: Result<Fingerprint, HashError>) -> Result<Fingerprint, FingerprintError> {
  match result {
    Ok(fingerprint) => Ok(fingerprint),
    // Deleted between stat and read.
    Err(e) if e.is_not_found() => Ok(Fingerprint::Absent),
    Err(e) => Err(e.into()),
  }
}

fn listing_hash(dir: &Path, extension: &str) -> Result<ContentHash, HashError> {
  let mut names = String::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|source| HashError::Walk {
      path: dir.to_path_buf(),
      source,
    })?;
    if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension) {
      let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
      names.push_str(&rel.to_string_lossy());
      names.push('\n');
    }
  }
  Ok(hash_bytes(names.as_bytes()))
}

fn mtime_nanos(metadata: &fs::Metadata) -> u64 {
  metadata
    .modified()
    .ok()
    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
    .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    .unwrap_or_default()
}

fn modified_tree(path: &Path) -> Result<Fingerprint, HashError> {
  let mut entries = 0u64;
  let mut size = 0u64;
  let mut newest = 0u64;

  for entry in WalkDir::new(path) {
    let entry = entry.map_err(|source| HashError::Walk {
      path: path.to_path_buf(),
      source,
    })?;
    let metadata = entry.metadata().map_err(|source| HashError::Walk {
      path: entry.path().to_path_buf(),
      source,
    })?;
    entries += 1;
    if metadata.is_file() {
      size += metadata.len();
    }
    newest = newest.max(mtime_nanos(&metadata));
  }

  Ok(Fingerprint::Modified {
    entries,
    size,
    mtime_nanos: newest,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn missing_path_is_absent() {
    let temp = tempdir().unwrap();
    let store = FingerprintStore::default();

    let fp = store.fingerprint(&temp.path().join("Entity.sdf")).unwrap();
    assert!(fp.is_absent());
  }

  #[test]
  fn absent_differs_from_empty_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.pp");
    let store = FingerprintStore::default();

    let before = store.fingerprint(&path).unwrap();
    fs::write(&path, "").unwrap();

    assert!(store.changed(&path, &before).unwrap());
  }

  #[test]
  fn unchanged_content_is_stable() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.sdf");
    fs::write(&path, "module Entity").unwrap();
    let store = FingerprintStore::new(Stamper::Hash);

    let fp = store.fingerprint(&path).unwrap();
    fs::write(&path, "module Entity").unwrap();

    assert!(!store.changed(&path, &fp).unwrap());
  }

  #[test]
  fn hash_detects_content_change() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.sdf");
    fs::write(&path, "module Entity").unwrap();
    let store = FingerprintStore::new(Stamper::Hash);

    let fp = store.fingerprint(&path).unwrap();
    fs::write(&path, "module Entity exports").unwrap();

    assert!(store.changed(&path, &fp).unwrap());
  }

  #[test]
  fn deleting_a_required_file_is_a_change() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.rtg");
    fs::write(&path, "regular tree grammar").unwrap();
    let store = FingerprintStore::default();

    let fp = store.fingerprint(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert!(store.changed(&path, &fp).unwrap());
  }

  #[test]
  fn directories_hash_their_contents() {
    let temp = tempdir().unwrap();
    let dir = temp.path().join("stratego-java");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("Main.java"), "class Main {}").unwrap();
    let store = FingerprintStore::default();

    let fp = store.fingerprint(&dir).unwrap();
    assert!(matches!(fp, Fingerprint::Directory { .. }));

    fs::write(dir.join("Other.java"), "class Other {}").unwrap();
    assert!(store.changed(&dir, &fp).unwrap());
  }

  #[test]
  fn modified_stamper_tracks_size() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.def");
    fs::write(&path, "definition").unwrap();
    let store = FingerprintStore::new(Stamper::Modified);

    let fp = store.fingerprint(&path).unwrap();
    assert!(matches!(fp, Fingerprint::Modified { size: 10, .. }));

    fs::write(&path, "definition, longer").unwrap();
    assert!(store.changed(&path, &fp).unwrap());
  }

  #[test]
  fn modified_stamper_counts_directory_entries() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.java"), "a").unwrap();
    let store = FingerprintStore::new(Stamper::Modified);

    let fp = store.fingerprint(temp.path()).unwrap();
    fs::write(temp.path().join("b.java"), "b").unwrap();

    assert!(store.changed(temp.path(), &fp).unwrap());
  }

  #[test]
  fn listing_changes_when_a_matching_file_appears() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("entity")).unwrap();
    fs::write(temp.path().join("entity/Main.class"), "v1").unwrap();
    let store = FingerprintStore::default();

    let fp = store.listing(temp.path(), "class").unwrap();
    assert!(matches!(fp, Fingerprint::Listing { .. }));

    fs::write(temp.path().join("entity/Main.class"), "v2").unwrap();
    fs::write(temp.path().join("Entity.tbl"), "table").unwrap();
    assert!(!store.listing_changed(temp.path(), "class", &fp).unwrap());

    fs::write(temp.path().join("entity/Other.class"), "v1").unwrap();
    assert!(store.listing_changed(temp.path(), "class", &fp).unwrap());
  }

  #[test]
  fn listing_of_missing_directory_is_absent() {
    let temp = tempdir().unwrap();
    let store = FingerprintStore::new(Stamper::Modified);

    let fp = store.listing(&temp.path().join("classes"), "class").unwrap();
    assert!(fp.is_absent());
  }

  #[test]
  fn vanished_tree_under_modified_stamper_is_absent() {
    let temp = tempdir().unwrap();
    let gone = temp.path().join("stratego-java");

    let fp = absent_if_vanished(modified_tree(&gone)).unwrap();
    assert!(fp.is_absent());
  }

  #[test]
  fn stamper_parses_from_config_strings() {
    assert_eq!("hash".parse::<Stamper>().unwrap(), Stamper::Hash);
    assert_eq!(" Modified ".parse::<Stamper>().unwrap(), Stamper::Modified);
    assert!("mtime".parse::<Stamper>().is_err());
  }
}
