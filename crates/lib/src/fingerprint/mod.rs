//! Content fingerprints of source directories.
//!
//! A fingerprint is the map of every tracked file (relative path) to its
//! SHA-256 digest. One map per directory is persisted as JSON so the next
//! run can tell whether anything changed.
//!
//! # Storage Layout
//!
//! ```text
//! {fingerprints_dir}/
//! └── <escaped absolute path>-<path digest>.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::util::hash::{ContentHash, hash_bytes, hash_file};

/// Hex characters of the path digest kept in baseline file names.
const PATH_DIGEST_LEN: usize = 16;

/// Relative path (always `/`-separated) to content digest.
pub type FingerprintMap = BTreeMap<String, ContentHash>;

/// Errors persisting fingerprints.
#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("failed to resolve directory {path}: {source}")]
  Resolve {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize fingerprints: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write fingerprints {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Persisted fingerprints, one file per tracked directory.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
  dir: PathBuf,
  exclude: Vec<String>,
}

impl FingerprintStore {
  /// Create a store keeping its files in `dir`. Directories named in
  /// `exclude` are never hashed, wherever they appear in a tree.
  pub fn new(dir: PathBuf, exclude: Vec<String>) -> Self {
    Self { dir, exclude }
  }

  /// Hash every tracked file under `dir`. Unreadable files are logged and left out.
  pub fn compute(&self, dir: &Path) -> FingerprintMap {
    let mut map = FingerprintMap::new();

    let walker = WalkDir::new(dir)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| !(e.depth() > 0 && e.file_type().is_dir() && self.is_excluded(e.file_name())));

    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
          continue;
        }
      };
      if !entry.file_type().is_file() {
        continue;
      }

      let Ok(rel) = entry.path().strip_prefix(dir) else {
        continue;
      };
      match hash_file(entry.path()) {
        Ok(hash) => {
          map.insert(relative_key(rel), hash);
        }
        Err(e) => warn!(error = %e, "skipping unreadable file"),
      }
    }

    map
  }

  /// Compare `dir` against its stored baseline and store the current state.
  ///
  /// True on first observation or when any file was added, removed or modified.
  pub fn has_changed(&self, dir: &Path) -> Result<bool, FingerprintError> {
    let path = self.baseline_path(dir)?;
    let current = self.compute(dir);
    let baseline = load_baseline(&path);
    self.save(&path, &current)?;

    let changed = current != baseline;
    debug!(dir = %dir.display(), changed, files = current.len(), "checked fingerprint");
    Ok(changed)
  }

  /// File holding the baseline of `dir`.
  ///
  /// The readable escaped path is not unique on its own (`x.y/z` and `x/y.z`
  /// flatten alike), so a digest of the canonical path is appended.
  pub fn baseline_path(&self, dir: &Path) -> Result<PathBuf, FingerprintError> {
    let absolute = dunce::canonicalize(dir).map_err(|source| FingerprintError::Resolve {
      path: dir.to_path_buf(),
      source,
    })?;
    let digest = hash_bytes(absolute.as_os_str().as_encoded_bytes());
    Ok(self.dir.join(format!(
      "{}-{}.json",
      escape_path(&absolute),
      &digest.0[..PATH_DIGEST_LEN]
    )))
  }

  /// Write a map atomically (temp file, then rename).
  fn save(&self, path: &Path, map: &FingerprintMap) -> Result<(), FingerprintError> {
    let to_write_error = |source| FingerprintError::Write {
      path: path.to_path_buf(),
      source,
    };

    fs::create_dir_all(&self.dir).map_err(to_write_error)?;
    let content = serde_json::to_string_pretty(map).map_err(FingerprintError::Serialize)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(to_write_error)?;
    fs::rename(&temp_path, path).map_err(to_write_error)?;
    Ok(())
  }

  fn is_excluded(&self, name: &std::ffi::OsStr) -> bool {
    self.exclude.iter().any(|ex| name == ex.as_str())
  }
}

/// Load a persisted map. Missing or unparsable files count as empty.
fn load_baseline(path: &Path) -> FingerprintMap {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return FingerprintMap::new(),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "unreadable fingerprint baseline");
      return FingerprintMap::new();
    }
  };
  serde_json::from_str(&content).unwrap_or_else(|e| {
    warn!(path = %path.display(), error = %e, "corrupt fingerprint baseline");
    FingerprintMap::new()
  })
}

fn relative_key(rel: &Path) -> String {
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// Flatten an absolute path into a single file name.
fn escape_path(path: &Path) -> String {
  let escaped = path
    .to_string_lossy()
    .replace(['\\', '/'], ".")
    .replace(':', "")
    .replace("..", ".");
  escaped.trim_start_matches('.').to_string()
}
