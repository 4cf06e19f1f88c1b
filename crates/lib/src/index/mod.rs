//! Manifest index: coordinate to source directory lookup.
//!
//! The source tree is walked once, in sorted order. A directory holding a
//! descriptor is a package root; its subdirectories are not searched for
//! further descriptors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::consts::DESCRIPTOR_FILE;
use crate::coord::Coordinate;
use crate::descriptor::Descriptor;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Outcome};
use crate::version::compare_version_strings;

/// Indexed packages, keyed by their declared coordinate.
#[derive(Debug, Clone, Default)]
pub struct ManifestIndex {
  entries: BTreeMap<Coordinate, PathBuf>,
}

impl ManifestIndex {
  pub fn new() -> Self {
    Self::default()
  }

  /// Source directory of a package.
  pub fn get(&self, coord: &Coordinate) -> Option<&Path> {
    self.entries.get(coord).map(PathBuf::as_path)
  }

  pub fn contains(&self, coord: &Coordinate) -> bool {
    self.entries.contains_key(coord)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Coordinate, &Path)> {
    self.entries.iter().map(|(c, p)| (c, p.as_path()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Every indexed version of one group and artifact, lowest first.
  pub fn versions_of<'a>(&'a self, group: &str, artifact: &str) -> Vec<&'a str> {
    let mut versions: Vec<&str> = self
      .entries
      .keys()
      .filter(|c| c.group == group && c.artifact == artifact)
      .map(|c| c.version.as_str())
      .collect();
    versions.sort_by(|a, b| compare_version_strings(a, b));
    versions
  }

  /// Record a package. Returns the directory already indexed for the
  /// coordinate if there is one, leaving it in place.
  pub fn insert(&mut self, coord: Coordinate, dir: PathBuf) -> Option<&Path> {
    use std::collections::btree_map::Entry;
    match self.entries.entry(coord) {
      Entry::Vacant(slot) => {
        slot.insert(dir);
        None
      }
      Entry::Occupied(slot) => Some(slot.into_mut().as_path()),
    }
  }
}

/// Scan `root` for descriptors.
///
/// Unreadable or incomplete descriptors, duplicate coordinates and walk
/// errors are recorded as diagnostics; the scan always completes. A root
/// that is not a directory yields an empty, failed index.
pub fn build_index(root: &Path) -> Outcome<ManifestIndex> {
  let mut index = ManifestIndex::new();
  let mut diagnostics = Diagnostics::new();

  if !root.is_dir() {
    diagnostics.error(
      DiagnosticKind::WalkFailed,
      format!("source root {} is not a directory", root.display()),
    );
    return Outcome::failed(index, diagnostics);
  }

  let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
  while let Some(entry) = walker.next() {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        diagnostics.warn(DiagnosticKind::WalkFailed, format!("failed to walk {}: {}", root.display(), e));
        continue;
      }
    };
    if !entry.file_type().is_dir() {
      continue;
    }

    let descriptor_path = entry.path().join(DESCRIPTOR_FILE);
    if !descriptor_path.is_file() {
      continue;
    }
    walker.skip_current_dir();

    let descriptor = match Descriptor::read(&descriptor_path) {
      Ok(descriptor) => descriptor,
      Err(e) => {
        diagnostics.warn(DiagnosticKind::MalformedDescriptor, e.to_string());
        continue;
      }
    };

    let Some(coord) = descriptor.coordinate() else {
      diagnostics.warn(
        DiagnosticKind::MissingIdentity,
        format!(
          "descriptor {} lacks groupId, artifactId or version",
          descriptor_path.display()
        ),
      );
      continue;
    };

    let dir = entry.path().to_path_buf();
    if let Some(existing) = index.insert(coord.clone(), dir.clone()) {
      let message = format!(
        "duplicate coordinate {} in {}, keeping {}",
        coord,
        dir.display(),
        existing.display()
      );
      diagnostics.warn(DiagnosticKind::DuplicateCoordinate, message);
      continue;
    }
    debug!(coordinate = %coord, dir = %entry.path().display(), "indexed descriptor");
  }

  Outcome::new(index, diagnostics)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::Status;
  use std::fs;
  use tempfile::tempdir;

  fn pom(group: &str, artifact: &str, version: &str) -> String {
    format!(
      "<project><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version></project>",
      group, artifact, version
    )
  }

  fn write_pom(dir: &Path, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(DESCRIPTOR_FILE), content).unwrap();
  }

  #[test]
  fn indexes_package_roots() {
    let temp = tempdir().unwrap();
    write_pom(&temp.path().join("lib"), &pom("g", "lib", "1.0"));
    write_pom(&temp.path().join("nested/app"), &pom("g", "app", "2.0"));

    let outcome = build_index(temp.path());
    assert_eq!(outcome.status(), Status::Ok);
    let index = outcome.value;
    assert_eq!(index.len(), 2);
    assert_eq!(
      index.get(&Coordinate::new("g", "app", "2.0")),
      Some(temp.path().join("nested/app").as_path())
    );
  }

  #[test]
  fn does_not_descend_into_package_roots() {
    let temp = tempdir().unwrap();
    write_pom(&temp.path().join("outer"), &pom("g", "outer", "1"));
    write_pom(&temp.path().join("outer/inner"), &pom("g", "inner", "1"));

    let index = build_index(temp.path()).value;
    assert!(index.contains(&Coordinate::new("g", "outer", "1")));
    assert!(!index.contains(&Coordinate::new("g", "inner", "1")));
  }

  #[test]
  fn duplicate_keeps_first_in_walk_order() {
    let temp = tempdir().unwrap();
    write_pom(&temp.path().join("a"), &pom("g", "dup", "1"));
    write_pom(&temp.path().join("b"), &pom("g", "dup", "1"));

    let outcome = build_index(temp.path());
    assert_eq!(outcome.diagnostics.count(DiagnosticKind::DuplicateCoordinate), 1);
    assert_eq!(
      outcome.value.get(&Coordinate::new("g", "dup", "1")),
      Some(temp.path().join("a").as_path())
    );
  }

  #[test]
  fn bad_descriptors_are_skipped() {
    let temp = tempdir().unwrap();
    write_pom(&temp.path().join("broken"), "<project><groupId>");
    write_pom(
      &temp.path().join("partial"),
      "<project><groupId>g</groupId><artifactId>a</artifactId></project>",
    );
    write_pom(&temp.path().join("good"), &pom("g", "good", "1"));

    let outcome = build_index(temp.path());
    assert_eq!(outcome.status(), Status::Degraded);
    assert!(outcome.diagnostics.has(DiagnosticKind::MalformedDescriptor));
    assert!(outcome.diagnostics.has(DiagnosticKind::MissingIdentity));
    assert_eq!(outcome.value.len(), 1);
  }

  #[test]
  fn missing_root_fails_the_index() {
    let temp = tempdir().unwrap();
    let outcome = build_index(&temp.path().join("absent"));
    assert_eq!(outcome.status(), Status::Failed);
    assert!(outcome.value.is_empty());
    assert!(outcome.diagnostics.has(DiagnosticKind::WalkFailed));
  }

  #[test]
  fn versions_sorted_numerically() {
    let mut index = ManifestIndex::new();
    for v in ["1.10", "1.2", "1.0"] {
      index.insert(Coordinate::new("g", "a", v), PathBuf::from(v));
    }
    index.insert(Coordinate::new("g", "other", "9"), PathBuf::from("x"));
    assert_eq!(index.versions_of("g", "a"), vec!["1.0", "1.2", "1.10"]);
  }
}
