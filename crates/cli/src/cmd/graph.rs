//! Graph command implementation.
//!
//! Resolves the dependency graph of a root package without building anything.

use anyhow::Result;

use autobuild_lib::config::Config;
use autobuild_lib::coord::Coordinate;
use autobuild_lib::diagnostics::Status;
use autobuild_lib::graph::GraphBuilder;
use autobuild_lib::index::build_index;

use crate::output::{OutputFormat, plural, print_info, print_json, print_problems, print_warning, symbols};

pub fn cmd_graph(config: &Config, root: &Coordinate, output: OutputFormat) -> Result<()> {
  let (index, mut diagnostics) = build_index(&config.paths.sources).into_parts();
  let outcome = GraphBuilder::new(&config.resolve, &config.generated).build_graph(root, &index);
  if outcome.status() == Status::Failed {
    print_warning(&format!("No readable descriptor for {}", root));
  }
  let (graph, graph_diagnostics) = outcome.into_parts();
  diagnostics.extend(graph_diagnostics);

  if output.is_json() {
    let nodes: Vec<_> = graph
      .nodes()
      .map(|node| {
        serde_json::json!({
          "coordinate": node.coordinate,
          "source_dir": node.source_dir,
          "third_party": node.is_third_party,
          "dependencies": node.dependencies,
        })
      })
      .collect();
    let problems: Vec<_> = diagnostics.iter().map(|d| d.to_string()).collect();
    return print_json(&serde_json::json!({ "root": root, "nodes": nodes, "problems": problems }));
  }

  print_info(&format!("{} reachable from {}", plural(graph.len(), "package"), root));
  for node in graph.nodes() {
    let kind = if node.is_third_party { "third-party" } else { "local" };
    println!("{} ({})", node.coordinate, kind);
    for dep in &node.dependencies {
      println!("  {} {}", symbols::ARROW, dep);
    }
  }
  print_problems(&diagnostics);
  Ok(())
}
