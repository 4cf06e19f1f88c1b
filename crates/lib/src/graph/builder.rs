//! Graph construction from descriptors.

use std::path::PathBuf;

use tracing::debug;

use crate::config::{GeneratedConfig, ResolveConfig};
use crate::consts::DESCRIPTOR_FILE;
use crate::coord::Coordinate;
use crate::descriptor::{DependencyTuple, Descriptor};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Outcome};
use crate::index::ManifestIndex;
use crate::version::{Version, VersionRange};

use super::{DependencyGraph, PackageNode};

/// Builds [`DependencyGraph`]s using one set of resolution rules.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
  resolve: &'a ResolveConfig,
  generated: &'a GeneratedConfig,
}

/// Index lookups, preferring the first index that knows a coordinate.
struct Lookup<'a> {
  indexes: Vec<&'a ManifestIndex>,
}

impl Lookup<'_> {
  fn source_dir(&self, coord: &Coordinate) -> Option<PathBuf> {
    self.indexes.iter().find_map(|index| index.get(coord)).map(PathBuf::from)
  }

  fn versions_of(&self, group: &str, artifact: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    for index in &self.indexes {
      for v in index.versions_of(group, artifact) {
        if !versions.iter().any(|known| known == v) {
          versions.push(v.to_string());
        }
      }
    }
    versions
  }
}

impl<'a> GraphBuilder<'a> {
  pub fn new(resolve: &'a ResolveConfig, generated: &'a GeneratedConfig) -> Self {
    Self { resolve, generated }
  }

  /// Resolve the transitive graph of `root` against `index`.
  ///
  /// The outcome is failed when `root` is a local package whose own
  /// descriptor is not indexed or cannot be read.
  pub fn build_graph(&self, root: &Coordinate, index: &ManifestIndex) -> Outcome<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    let mut diagnostics = Diagnostics::new();
    if self.extend(&mut graph, root, index, None, &mut diagnostics) {
      Outcome::new(graph, diagnostics)
    } else {
      Outcome::failed(graph, diagnostics)
    }
  }

  /// Add `start` and everything newly reachable from it to an existing graph.
  ///
  /// `start` is processed even if it is already present, so a node whose
  /// source directory was just filled in picks up its dependencies. New nodes
  /// take their source directory from `primary`, then `fallback`.
  ///
  /// Returns false when `start` is local and its descriptor could not be read.
  pub fn extend(
    &self,
    graph: &mut DependencyGraph,
    start: &Coordinate,
    primary: &ManifestIndex,
    fallback: Option<&ManifestIndex>,
    diagnostics: &mut Diagnostics,
  ) -> bool {
    let lookup = Lookup {
      indexes: std::iter::once(primary).chain(fallback).collect(),
    };

    if !graph.contains(start) {
      graph.insert(self.new_node(start, &lookup));
    }
    let mut stack = vec![start.clone()];
    let mut start_read = true;

    while let Some(coord) = stack.pop() {
      let Some(node) = graph.get(&coord) else {
        continue;
      };
      if node.is_third_party {
        continue;
      }
      let source_dir = node.source_dir.clone();

      let mut edges = Vec::new();
      if let Some(generator) = self.generated.generator_of(&coord) {
        edges.push(generator);
      }

      let read = match source_dir {
        Some(dir) => match Descriptor::read(&dir.join(DESCRIPTOR_FILE)) {
          Ok(descriptor) => {
            edges.extend(self.resolve_tuples(&coord, descriptor.dependencies, &lookup, diagnostics));
            true
          }
          Err(e) => {
            diagnostics.warn(DiagnosticKind::MalformedDescriptor, e.to_string());
            false
          }
        },
        None => {
          diagnostics.warn(
            DiagnosticKind::MissingDescriptor,
            format!("no descriptor indexed for {}", coord),
          );
          false
        }
      };
      if coord == *start {
        start_read = read;
      }

      for dep in edges {
        if !graph.contains(&dep) {
          graph.insert(self.new_node(&dep, &lookup));
          stack.push(dep.clone());
        }
        if let Some(node) = graph.get_mut(&coord) {
          node.add_dependency(dep);
        }
      }
    }
    start_read
  }

  fn new_node(&self, coord: &Coordinate, lookup: &Lookup<'_>) -> PackageNode {
    let third_party = !self.resolve.is_local_group(&coord.group);
    let source_dir = if third_party { None } else { lookup.source_dir(coord) };
    debug!(coordinate = %coord, third_party, "new graph node");
    PackageNode::new(coord.clone(), source_dir, third_party)
  }

  /// Rewrite, range-resolve, default and deduplicate the references of one descriptor.
  fn resolve_tuples(
    &self,
    owner: &Coordinate,
    tuples: Vec<DependencyTuple>,
    lookup: &Lookup<'_>,
    diagnostics: &mut Diagnostics,
  ) -> Vec<Coordinate> {
    let rewritten: Vec<Coordinate> = tuples
      .iter()
      .map(|tuple| {
        let coord = self.resolve.rewrite(&tuple.to_coordinate());
        self.resolve_range(owner, coord, lookup, diagnostics)
      })
      .collect();

    let mut resolved: Vec<Coordinate> = Vec::new();
    for coord in &rewritten {
      let mut coord = coord.clone();
      if coord.version.is_empty()
        && let Some(sibling) = rewritten
          .iter()
          .find(|other| other.same_package(&coord) && !other.version.is_empty())
      {
        coord.version = sibling.version.clone();
      }
      if coord.group.is_empty() || coord.artifact.is_empty() || coord.version.is_empty() {
        continue;
      }
      if !resolved.contains(&coord) {
        resolved.push(coord);
      }
    }
    resolved
  }

  /// Replace a `[min,max)` version by the highest indexed version inside it.
  fn resolve_range(
    &self,
    owner: &Coordinate,
    coord: Coordinate,
    lookup: &Lookup<'_>,
    diagnostics: &mut Diagnostics,
  ) -> Coordinate {
    if !VersionRange::is_range(&coord.version) {
      return coord;
    }

    let best = VersionRange::parse(&coord.version).and_then(|range| {
      lookup
        .versions_of(&coord.group, &coord.artifact)
        .into_iter()
        .filter_map(|raw| Version::parse(&raw).map(|v| (v, raw)))
        .filter(|(v, _)| range.contains(v))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw)
    });

    match best {
      Some(version) => {
        debug!(coordinate = %coord, version = %version, "resolved version range");
        coord.with_version(version)
      }
      None => {
        diagnostics.error(
          DiagnosticKind::UnresolvedRange,
          format!("no indexed version of {} (required by {}) matches", coord, owner),
        );
        coord
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::diagnostics::Status;
  use crate::index::build_index;
  use std::fs;
  use std::path::Path;
  use tempfile::{TempDir, tempdir};
  use tracing_test::traced_test;

  fn dep(group: &str, artifact: &str, version: &str) -> String {
    format!(
      "<dependency><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version></dependency>",
      group, artifact, version
    )
  }

  fn write_package(root: &Path, coord: &str, deps: &[String]) {
    let coord: Coordinate = coord.parse().unwrap();
    let dir = root.join(format!("{}-{}", coord.artifact, coord.version));
    fs::create_dir_all(&dir).unwrap();
    let pom = format!(
      "<project><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version>\
       <dependencies>{}</dependencies></project>",
      coord.group,
      coord.artifact,
      coord.version,
      deps.concat()
    );
    fs::write(dir.join(DESCRIPTOR_FILE), pom).unwrap();
  }

  fn config() -> Config {
    let mut config = Config::default();
    config.resolve.local_prefixes = vec!["local".to_string()];
    config
  }

  fn build(config: &Config, temp: &TempDir, root: &str) -> Outcome<DependencyGraph> {
    let index = build_index(temp.path()).value;
    GraphBuilder::new(&config.resolve, &config.generated).build_graph(&root.parse().unwrap(), &index)
  }

  fn deps_of(graph: &DependencyGraph, coord: &str) -> Vec<String> {
    graph
      .get(&coord.parse().unwrap())
      .unwrap()
      .dependencies
      .iter()
      .map(ToString::to_string)
      .collect()
  }

  #[test]
  fn diamond_is_deduplicated() {
    let temp = tempdir().unwrap();
    write_package(
      temp.path(),
      "local:app:1",
      &[dep("local", "left", "1"), dep("local", "right", "1")],
    );
    write_package(temp.path(), "local:left:1", &[dep("local", "base", "1")]);
    write_package(temp.path(), "local:right:1", &[dep("local", "base", "1")]);
    write_package(temp.path(), "local:base:1", &[dep("org.ext", "lib", "2.0")]);

    let config = config();
    let outcome = build(&config, &temp, "local:app:1");
    assert!(outcome.diagnostics.is_empty());
    let graph = outcome.value;

    assert_eq!(graph.len(), 5);
    assert_eq!(deps_of(&graph, "local:app:1"), vec!["local:left:1", "local:right:1"]);
    let ext = graph.get(&"org.ext:lib:2.0".parse().unwrap()).unwrap();
    assert!(ext.is_third_party);
    assert!(ext.source_dir.is_none());
    assert!(
      !graph
        .get(&"local:base:1".parse().unwrap())
        .unwrap()
        .is_third_party
    );
  }

  #[test]
  fn unreadable_root_fails_the_graph() {
    let temp = tempdir().unwrap();
    write_package(temp.path(), "local:app:1", &[dep("local", "lib", "1")]);
    let config = config();

    assert_eq!(build(&config, &temp, "local:app:1").status(), Status::Degraded);

    let missing = build(&config, &temp, "local:absent:1");
    assert_eq!(missing.status(), Status::Failed);
    assert!(missing.diagnostics.has(DiagnosticKind::MissingDescriptor));
    assert_eq!(missing.value.len(), 1);

    let index = build_index(temp.path()).value;
    fs::write(temp.path().join("app-1").join(DESCRIPTOR_FILE), "<project>").unwrap();
    let malformed = GraphBuilder::new(&config.resolve, &config.generated)
      .build_graph(&"local:app:1".parse().unwrap(), &index);
    assert_eq!(malformed.status(), Status::Failed);
    assert!(malformed.diagnostics.has(DiagnosticKind::MalformedDescriptor));
  }

  #[test]
  fn third_party_root_is_not_a_failure() {
    let temp = tempdir().unwrap();
    let config = config();
    let outcome = build(&config, &temp, "org.ext:lib:2.0");
    assert_eq!(outcome.status(), Status::Ok);
    assert_eq!(outcome.value.len(), 1);
  }

  #[test]
  fn construction_is_deterministic() {
    let temp = tempdir().unwrap();
    write_package(
      temp.path(),
      "local:app:1",
      &[dep("local", "b", "1"), dep("local", "a", "1"), dep("org.x", "y", "3")],
    );
    write_package(temp.path(), "local:a:1", &[dep("local", "b", "1")]);
    write_package(temp.path(), "local:b:1", &[dep("local", "app", "1")]);

    let config = config();
    let first = build(&config, &temp, "local:app:1").value;
    let second = build(&config, &temp, "local:app:1").value;
    assert_eq!(first, second);
    assert_eq!(deps_of(&first, "local:b:1"), vec!["local:app:1"]);
  }

  #[test]
  fn range_picks_highest_version_below_max() {
    let temp = tempdir().unwrap();
    write_package(temp.path(), "local:app:1", &[dep("local", "lib", "[1.0,2.0)")]);
    for v in ["0.9", "1.2", "1.10", "2.0"] {
      write_package(temp.path(), &format!("local:lib:{}", v), &[]);
    }

    let config = config();
    let graph = build(&config, &temp, "local:app:1").value;
    assert_eq!(deps_of(&graph, "local:app:1"), vec!["local:lib:1.10"]);
  }

  #[test]
  #[traced_test]
  fn unmatched_range_keeps_literal_and_logs_error() {
    let temp = tempdir().unwrap();
    write_package(temp.path(), "local:app:1", &[dep("local", "lib", "[3.0,4.0)")]);
    write_package(temp.path(), "local:lib:1.0", &[]);

    let config = config();
    let outcome = build(&config, &temp, "local:app:1");
    assert!(outcome.diagnostics.has(DiagnosticKind::UnresolvedRange));
    assert_eq!(deps_of(&outcome.value, "local:app:1"), vec!["local:lib:[3.0,4.0)"]);
    assert!(logs_contain("no indexed version of local:lib:[3.0,4.0)"));
  }

  #[test]
  fn rewrites_chain_coordinate_then_version() {
    let temp = tempdir().unwrap();
    write_package(temp.path(), "local:app:1", &[dep("a.b", "C", "1.0")]);

    let mut config = config();
    config
      .resolve
      .coordinate_overrides
      .insert("a.b:C:1.0".parse().unwrap(), "x.y:Z:2.0".parse().unwrap());
    config
      .resolve
      .version_overrides
      .insert("x.y:Z:2.0".parse().unwrap(), "2.1".to_string());

    let graph = build(&config, &temp, "local:app:1").value;
    assert_eq!(deps_of(&graph, "local:app:1"), vec!["x.y:Z:2.1"]);
  }

  #[test]
  fn unversioned_reference_adopts_sibling_version() {
    let temp = tempdir().unwrap();
    write_package(
      temp.path(),
      "local:app:1",
      &[
        "<dependency><groupId>org.x</groupId><artifactId>y</artifactId></dependency>".to_string(),
        dep("org.x", "y", "5"),
        "<dependency><groupId>org.z</groupId><artifactId>w</artifactId></dependency>".to_string(),
      ],
    );

    let config = config();
    let graph = build(&config, &temp, "local:app:1").value;
    assert_eq!(deps_of(&graph, "local:app:1"), vec!["org.x:y:5"]);
  }

  #[test]
  fn generated_package_depends_on_generator() {
    let temp = tempdir().unwrap();
    write_package(temp.path(), "local.server:Battle:1", &[]);

    let mut config = config();
    config.generated.generated_group = ".client".to_string();
    config.generated.generator_group = ".server".to_string();
    let outcome = build(&config, &temp, "local.client:BattleModelsBase:1");

    let graph = outcome.value;
    assert_eq!(
      deps_of(&graph, "local.client:BattleModelsBase:1"),
      vec!["local.server:Battle:1"]
    );
    assert!(outcome.diagnostics.has(DiagnosticKind::MissingDescriptor));
  }

  #[test]
  fn extend_uses_primary_index_first() {
    let main = tempdir().unwrap();
    write_package(main.path(), "local:app:1", &[dep("local", "gen", "1")]);
    write_package(main.path(), "local:shared:1", &[]);
    let generated = tempdir().unwrap();
    write_package(generated.path(), "local:gen:1", &[dep("local", "shared", "1")]);

    let config = config();
    let builder = GraphBuilder::new(&config.resolve, &config.generated);
    let main_index = build_index(main.path()).value;
    let outcome = builder.build_graph(&"local:app:1".parse().unwrap(), &main_index);
    let (mut graph, mut diagnostics) = outcome.into_parts();
    assert!(diagnostics.has(DiagnosticKind::MissingDescriptor));

    let gen_coord: Coordinate = "local:gen:1".parse().unwrap();
    let gen_index = build_index(generated.path()).value;
    graph.get_mut(&gen_coord).unwrap().source_dir = gen_index.get(&gen_coord).map(PathBuf::from);
    builder.extend(&mut graph, &gen_coord, &gen_index, Some(&main_index), &mut diagnostics);

    assert_eq!(deps_of(&graph, "local:gen:1"), vec!["local:shared:1"]);
    assert_eq!(
      graph.get(&"local:shared:1".parse().unwrap()).unwrap().source_dir.as_deref(),
      main_index.get(&"local:shared:1".parse().unwrap())
    );
  }
}
