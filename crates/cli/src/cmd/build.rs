//! Build command implementation.
//!
//! Starts the repository proxy in the background, indexes the source tree,
//! resolves the root's dependency graph and builds whatever is out of date.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use autobuild_lib::config::Config;
use autobuild_lib::coord::Coordinate;
use autobuild_lib::diagnostics::Status;
use autobuild_lib::graph::GraphBuilder;
use autobuild_lib::index::build_index;
use autobuild_lib::mirror::MirrorClient;
use autobuild_lib::orchestrate::{BuildReport, Orchestrator, ProcessTool};
use autobuild_lib::proxy::{self, ProxyState};
use autobuild_lib::store::ArtifactStore;

use crate::output::{
  format_duration, plural, print_error, print_info, print_problems, print_stat, print_success, print_warning,
};

/// Returns whether the root package ended up available.
pub fn cmd_build(config: &Config, root: &Coordinate) -> Result<bool> {
  let start = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(run(config, root))?;
  let elapsed = start.elapsed();

  println!();
  if report.success() {
    print_success(&format!("Built {} in {}", root, format_duration(elapsed)));
  } else {
    print_error(&format!("Failed to build {} after {}", root, format_duration(elapsed)));
  }

  let summary = &report.summary;
  print_stat("Built", &report.built.len().to_string());
  print_stat("Unchanged", &report.reused.len().to_string());
  print_stat("Excluded", &report.excluded.len().to_string());
  print_stat(
    "Resolved",
    &format!("{} ({} local)", summary.resolved, summary.local_resolved),
  );
  print_stat("Missing", &format!("{} ({} local)", summary.missing, summary.local_missing));

  if !report.missing.is_empty() {
    println!();
    for coord in &report.missing {
      print_warning(&format!("missing {}", coord));
    }
  }

  print_problems(&report.diagnostics);

  Ok(report.success())
}

async fn run(config: &Config, root: &Coordinate) -> Result<BuildReport> {
  let state = Arc::new(ProxyState::from_config(config));
  let (addr, proxy) = proxy::spawn(&config.proxy, state)
    .await
    .context("Failed to start repository proxy")?;
  print_info(&format!("Repository proxy listening on http://{}", addr));

  let index = build_index(&config.paths.sources);
  if index.status() == Status::Failed {
    print_warning(&format!(
      "Source root {} is not readable, only published packages are available",
      config.paths.sources.display()
    ));
  }
  let (index, mut diagnostics) = index.into_parts();
  print_info(&format!(
    "Indexed {} under {}",
    plural(index.len(), "descriptor"),
    config.paths.sources.display()
  ));

  let (mut graph, graph_diagnostics) = GraphBuilder::new(&config.resolve, &config.generated)
    .build_graph(root, &index)
    .into_parts();
  diagnostics.extend(graph_diagnostics);
  debug!(packages = graph.len(), "dependency graph resolved");

  let mirror = MirrorClient::new(&config.proxy.mirrors, ArtifactStore::new(config.paths.repository.clone()));
  let tool = ProcessTool::from_config(&config.tool);
  let orchestrator = Orchestrator::new(config, &index, &tool, &mirror);

  let result = orchestrator
    .resolve_and_build(root, &mut graph)
    .await
    .with_context(|| format!("Build of {} aborted", root));
  proxy.abort();

  let mut report = result?;
  diagnostics.extend(report.diagnostics);
  report.diagnostics = diagnostics;
  Ok(report)
}
