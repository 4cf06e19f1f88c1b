//! The local artifact store.
//!
//! Published packages and cached mirror downloads share one directory laid
//! out like a remote repository, so the proxy can serve either straight from
//! disk.
//!
//! # Layout
//!
//! ```text
//! repository/
//! └── org/example/lib/1.0/
//!     ├── lib-1.0.pom
//!     └── lib-1.0.jar
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::DESCRIPTOR_EXT;
use crate::coord::Coordinate;

/// Errors writing into the store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid repository path: {0}")]
  InvalidPath(String),
}

/// Repository-layout directory on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
  root: PathBuf,
}

impl ArtifactStore {
  pub fn new(root: PathBuf) -> Self {
    Self { root }
  }

  /// Directory holding every file of one version.
  pub fn version_dir(&self, coord: &Coordinate) -> PathBuf {
    self.root.join(coord.version_dir_buf())
  }

  /// Whether anything was ever published or cached for this version.
  pub fn has_version(&self, coord: &Coordinate) -> bool {
    self.version_dir(coord).is_dir()
  }

  pub fn descriptor_file(&self, coord: &Coordinate) -> PathBuf {
    self.version_dir(coord).join(coord.file_name(DESCRIPTOR_EXT))
  }

  pub fn has_descriptor(&self, coord: &Coordinate) -> bool {
    self.descriptor_file(coord).is_file()
  }

  /// Map a `/`-separated repository path to a location inside the store.
  ///
  /// Returns `None` for paths that would escape the store.
  pub fn locate(&self, rel_path: &str) -> Option<PathBuf> {
    let rel = Path::new(rel_path.trim_start_matches('/'));
    if rel.as_os_str().is_empty() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
      return None;
    }
    Some(self.root.join(rel))
  }

  /// An existing file at a repository path.
  pub async fn resolve(&self, rel_path: &str) -> Option<PathBuf> {
    let path = self.locate(rel_path)?;
    let metadata = tokio::fs::metadata(&path).await.ok()?;
    metadata.is_file().then_some(path)
  }

  /// Copy a built package into the store.
  ///
  /// The artifact, when given, is stored as `a-v.<its extension>`; the
  /// descriptor always as `a-v.pom`. Returns the version directory.
  pub fn publish(
    &self,
    coord: &Coordinate,
    descriptor: &Path,
    artifact: Option<&Path>,
  ) -> Result<PathBuf, StoreError> {
    let dir = self.version_dir(coord);
    fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
      path: dir.clone(),
      source,
    })?;

    if let Some(artifact) = artifact {
      let ext = artifact.extension().and_then(|e| e.to_str()).unwrap_or("jar");
      copy_file(artifact, &dir.join(coord.file_name(ext)))?;
    }
    copy_file(descriptor, &dir.join(coord.file_name(DESCRIPTOR_EXT)))?;

    info!(
      coordinate = %coord,
      artifact = artifact.is_some(),
      "published to store"
    );
    Ok(dir)
  }

  /// Store downloaded bytes at a repository path.
  ///
  /// Runs on the request path of the proxy, so it only uses async file IO.
  pub async fn write_cached(&self, rel_path: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    let path = self
      .locate(rel_path)
      .ok_or_else(|| StoreError::InvalidPath(rel_path.to_string()))?;
    let to_write_error = |source| StoreError::Write {
      path: path.clone(),
      source,
    };

    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| StoreError::CreateDir {
          path: parent.to_path_buf(),
          source,
        })?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".part");
    let temp_path = path.with_file_name(temp_name);
    tokio::fs::write(&temp_path, bytes).await.map_err(to_write_error)?;
    tokio::fs::rename(&temp_path, &path).await.map_err(to_write_error)?;

    debug!(path = %rel_path, bytes = bytes.len(), "cached download");
    Ok(path)
  }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), StoreError> {
  fs::copy(from, to).map_err(|source| StoreError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  })?;
  Ok(())
}
