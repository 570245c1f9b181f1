//! Hashing primitives shared by request keys and file fingerprints.
//!
//! - `ObjectHash`: a truncated 20-character hash naming a serializable value
//! - `ContentHash`: a full 64-character hash of file or tree content
//! - `hash_tree()`: deterministic hash of a directory tree
//! - `hash_file()` / `hash_bytes()`: single file and byte hashing

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

/// A truncated SHA-256 of a JSON-serialized value.
///
/// Lowercase hex, e.g. `"a1b2c3d4e5f6789012ab"`. Short enough to use as a file
/// name, long enough that collisions between requests of one project do not
/// happen in practice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, serde_json::Error> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 hash of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to walk {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },
}

impl HashError {
  /// Whether the error was caused by the path disappearing mid-walk.
  pub fn is_not_found(&self) -> bool {
    match self {
      HashError::Walk { source, .. } => source.io_error().map(|e| e.kind()) == Some(io::ErrorKind::NotFound),
      HashError::Read { source, .. } => source.kind() == io::ErrorKind::NotFound,
    }
  }
}

/// Compute a deterministic hash of a directory tree.
///
/// Covers relative paths, file contents and symlink targets; ignores
/// timestamps and permissions. Entries are visited in file-name order.
pub fn hash_tree(path: &Path) -> Result<ContentHash, HashError> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|source| HashError::Walk {
      path: path.to_path_buf(),
      source,
    })?;
    let entry_path = entry.path();
    let rel_path = entry_path.strip_prefix(path).unwrap_or(entry_path).to_string_lossy();

    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      format!("F:{}:{}", rel_path, hash_file(entry_path)?)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry_path).map_err(|source| HashError::Read {
        path: entry_path.to_path_buf(),
        source,
      })?;
      format!("L:{}:{}", rel_path, target.to_string_lossy())
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::Read {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::open(path).map_err(read_err)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[derive(Serialize)]
  struct Key<'a> {
    builder: &'a str,
    module: &'a str,
  }

  impl Hashable for Key<'_> {}

  #[test]
  fn object_hash_is_truncated_and_stable() {
    let key = Key {
      builder: "rtg2sig",
      module: "Entity",
    };
    let first = key.compute_hash().unwrap();
    let second = key.compute_hash().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.0.len(), OBJ_HASH_PREFIX_LEN);
  }

  #[test]
  fn object_hash_differs_by_field() {
    let a = Key {
      builder: "rtg2sig",
      module: "Entity",
    };
    let b = Key {
      builder: "sdf2rtg",
      module: "Entity",
    };
    assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
  }

  #[test]
  fn tree_hash_changes_with_content() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("Entity.str"), "module Entity").unwrap();
    let before = hash_tree(temp.path()).unwrap();

    fs::write(temp.path().join("Entity.str"), "module Entity2").unwrap();
    let after = hash_tree(temp.path()).unwrap();

    assert_ne!(before, after);
  }

  #[test]
  fn tree_hash_sees_nesting() {
    let flat = tempdir().unwrap();
    fs::write(flat.path().join("Main.java"), "class Main {}").unwrap();

    let nested = tempdir().unwrap();
    fs::create_dir(nested.path().join("org")).unwrap();
    fs::write(nested.path().join("org/Main.java"), "class Main {}").unwrap();

    assert_ne!(hash_tree(flat.path()).unwrap(), hash_tree(nested.path()).unwrap());
  }

  #[test]
  fn tree_hash_of_missing_dir_is_not_found() {
    let temp = tempdir().unwrap();
    let err = hash_tree(&temp.path().join("gone")).unwrap_err();
    assert!(err.is_not_found());
  }

  #[test]
  fn file_hash_matches_byte_hash() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("Entity.tbl");
    fs::write(&path, "parse-table").unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"parse-table"));
  }
}
