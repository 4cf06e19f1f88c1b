//! Module descriptor (`pom.xml`) parsing.
//!
//! Only identity and dependency references are read. Element names are
//! matched on their local name, so namespaced and plain descriptors parse
//! the same way.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;

use crate::coord::Coordinate;

/// Errors reading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read descriptor {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse descriptor {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: roxmltree::Error,
  },
}

/// A dependency reference as written in a descriptor, before any rewriting.
///
/// Fields are empty when the element is absent; the version in particular is
/// often left to a sibling declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyTuple {
  pub group: String,
  pub artifact: String,
  pub version: String,
}

impl DependencyTuple {
  pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      group: group.into(),
      artifact: artifact.into(),
      version: version.into(),
    }
  }

  pub fn to_coordinate(&self) -> Coordinate {
    Coordinate::new(self.group.clone(), self.artifact.clone(), self.version.clone())
  }
}

/// The parts of a descriptor the resolver cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
  pub group: Option<String>,
  pub artifact: Option<String>,
  pub version: Option<String>,
  /// References from dependencies, dependency management, plugins,
  /// extensions and the parent, in that order.
  pub dependencies: Vec<DependencyTuple>,
}

impl Descriptor {
  /// Read and parse the descriptor at `path`.
  pub fn read(path: &Path) -> Result<Self, DescriptorError> {
    let text = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&text).map_err(|source| DescriptorError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Parse descriptor text.
  pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
    let options = ParsingOptions {
      allow_dtd: true,
      ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)?;
    let root = doc.root_element();

    let mut dependencies = Vec::new();

    for path in [
      &["dependencies", "dependency"][..],
      &["dependencyManagement", "dependencies", "dependency"][..],
    ] {
      dependencies.extend(elements_at(root, path).into_iter().map(read_tuple));
    }

    for (list, item) in [("plugins", "plugin"), ("extensions", "extension")] {
      let builds = root.descendants().filter(|n| is_named(n, "build"));
      for build in builds {
        dependencies.extend(elements_at(build, &[list, item]).into_iter().map(read_tuple));
      }
    }

    if let Some(parent) = child(root, "parent") {
      dependencies.push(read_tuple(parent));
    }

    Ok(Self {
      group: child_text(root, "groupId").map(clean_id).filter(|s| !s.is_empty()),
      artifact: child_text(root, "artifactId").map(clean_id).filter(|s| !s.is_empty()),
      version: child_text(root, "version")
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty()),
      dependencies,
    })
  }

  /// The declared coordinate, if all three identity fields are present.
  pub fn coordinate(&self) -> Option<Coordinate> {
    match (&self.group, &self.artifact, &self.version) {
      (Some(g), Some(a), Some(v)) => Some(Coordinate::new(g.clone(), a.clone(), v.clone())),
      _ => None,
    }
  }
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
  node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
  node.children().find(|n| is_named(n, name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
  child(node, name).and_then(|n| n.text())
}

/// All elements reached by following `path` from `node`, one name per level.
fn elements_at<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Vec<Node<'a, 'input>> {
  let mut current = vec![node];
  for &name in path {
    current = current
      .into_iter()
      .flat_map(|n| n.children().filter(move |c| is_named(c, name)))
      .collect();
  }
  current
}

fn read_tuple(node: Node<'_, '_>) -> DependencyTuple {
  DependencyTuple::new(
    child_text(node, "groupId").map(clean_id).unwrap_or_default(),
    child_text(node, "artifactId").map(clean_id).unwrap_or_default(),
    child_text(node, "version").map(str::trim).unwrap_or_default(),
  )
}

/// Group and artifact ids occasionally carry stray whitespace; drop all of it.
fn clean_id(text: &str) -> String {
  text.chars().filter(|c| !c.is_whitespace()).collect()
}
