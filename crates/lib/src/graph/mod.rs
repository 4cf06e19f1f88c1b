//! Dependency graph of packages.
//!
//! Nodes live in a single map keyed by coordinate and edges refer to other
//! nodes by key, so dependency cycles in the descriptors never become
//! ownership cycles.

mod builder;

use std::collections::BTreeMap;
use std::path::PathBuf;

pub use builder::GraphBuilder;

use crate::coord::Coordinate;

/// One package in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
  pub coordinate: Coordinate,
  /// Where the package's sources live, if known.
  pub source_dir: Option<PathBuf>,
  /// Fetched as a binary rather than built from source.
  pub is_third_party: bool,
  /// Direct dependencies, in discovery order, without duplicates.
  pub dependencies: Vec<Coordinate>,
}

impl PackageNode {
  pub fn new(coordinate: Coordinate, source_dir: Option<PathBuf>, is_third_party: bool) -> Self {
    Self {
      coordinate,
      source_dir,
      is_third_party,
      dependencies: Vec::new(),
    }
  }

  /// Append an edge unless it is already present.
  pub fn add_dependency(&mut self, dep: Coordinate) -> bool {
    if self.dependencies.contains(&dep) {
      return false;
    }
    self.dependencies.push(dep);
    true
  }
}

/// Every package reachable from a root, keyed by coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
  nodes: BTreeMap<Coordinate, PackageNode>,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, coord: &Coordinate) -> Option<&PackageNode> {
    self.nodes.get(coord)
  }

  pub fn get_mut(&mut self, coord: &Coordinate) -> Option<&mut PackageNode> {
    self.nodes.get_mut(coord)
  }

  pub fn contains(&self, coord: &Coordinate) -> bool {
    self.nodes.contains_key(coord)
  }

  /// Insert a node, replacing any node with the same coordinate.
  pub fn insert(&mut self, node: PackageNode) {
    self.nodes.insert(node.coordinate.clone(), node);
  }

  pub fn nodes(&self) -> impl Iterator<Item = &PackageNode> {
    self.nodes.values()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
