//! Package coordinates and the repository path layout derived from them.
//!
//! A [`Coordinate`] is the `group:artifact:version` identity of a package. The
//! repository layout maps it to `group/as/path/artifact/version/artifact-version.ext`,
//! which is shared by the local artifact store and the HTTP proxy.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DESCRIPTOR_EXT;

/// Error parsing a `group:artifact:version` string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid coordinate '{input}': expected non-empty group:artifact:version")]
pub struct CoordinateParseError {
  pub input: String,
}

/// Identity triple of a package.
///
/// Serialized as its canonical `group:artifact:version` string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
  pub group: String,
  pub artifact: String,
  pub version: String,
}

impl Coordinate {
  pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      group: group.into(),
      artifact: artifact.into(),
      version: version.into(),
    }
  }

  /// Returns a copy of this coordinate with a different version.
  pub fn with_version(&self, version: impl Into<String>) -> Self {
    Self::new(self.group.clone(), self.artifact.clone(), version)
  }

  /// Whether `other` names the same package, ignoring the version.
  pub fn same_package(&self, other: &Coordinate) -> bool {
    self.group == other.group && self.artifact == other.artifact
  }

  /// Group with dots replaced by slashes, e.g. `org/example`.
  pub fn group_path(&self) -> String {
    group_to_path(&self.group)
  }

  /// Relative directory holding every file of this version: `org/example/lib/1.0`.
  pub fn version_dir(&self) -> String {
    format!("{}/{}/{}", self.group_path(), self.artifact, self.version)
  }

  /// File name for a published file with the given extension: `lib-1.0.jar`.
  pub fn file_name(&self, ext: &str) -> String {
    format!("{}-{}.{}", self.artifact, self.version, ext)
  }

  /// Relative repository path of a published file: `org/example/lib/1.0/lib-1.0.jar`.
  pub fn file_path(&self, ext: &str) -> String {
    format!("{}/{}", self.version_dir(), self.file_name(ext))
  }

  /// Relative repository path of the published descriptor.
  pub fn descriptor_path(&self) -> String {
    self.file_path(DESCRIPTOR_EXT)
  }

  /// Repository path prefix shared by every file of this version:
  /// `org/example/lib/1.0/lib-1.0`.
  pub fn path_stem(&self) -> String {
    format!("{}/{}-{}", self.version_dir(), self.artifact, self.version)
  }

  /// Relative filesystem path of the version directory, for joining onto a root.
  pub fn version_dir_buf(&self) -> PathBuf {
    let mut path: PathBuf = self.group.split('.').collect();
    path.push(&self.artifact);
    path.push(&self.version);
    path
  }
}

impl fmt::Display for Coordinate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
  }
}

impl FromStr for Coordinate {
  type Err = CoordinateParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    match parts.as_slice() {
      [group, artifact, version] if !group.is_empty() && !artifact.is_empty() && !version.is_empty() => {
        Ok(Self::new(*group, *artifact, *version))
      }
      _ => Err(CoordinateParseError { input: s.to_string() }),
    }
  }
}

impl TryFrom<String> for Coordinate {
  type Error = CoordinateParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Coordinate> for String {
  fn from(coord: Coordinate) -> Self {
    coord.to_string()
  }
}

/// Convert a dotted group into its repository path form.
pub fn group_to_path(group: &str) -> String {
  group.replace('.', "/")
}
