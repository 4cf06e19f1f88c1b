//! Dependency-first build orchestration.
//!
//! The orchestrator walks a [`DependencyGraph`] with an explicit stack. A
//! package is attempted only once all of its dependencies are resolved;
//! local packages are built with the external tool unless their sources are
//! unchanged, third-party packages only need to exist in the store or on a
//! mirror. A failure marks the package missing, which in turn makes every
//! package depending on it missing, and nothing else.

mod tool;
mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

pub use tool::{BuildTool, ProcessTool, ToolError, ToolOutput};
pub use types::{BuildReport, OrchestrateError, RunSummary};

use crate::config::Config;
use crate::consts::DESCRIPTOR_FILE;
use crate::coord::Coordinate;
use crate::diagnostics::DiagnosticKind;
use crate::fingerprint::{FingerprintError, FingerprintStore};
use crate::graph::{DependencyGraph, GraphBuilder, PackageNode};
use crate::index::{ManifestIndex, build_index};
use crate::mirror::MirrorClient;
use crate::store::ArtifactStore;
use crate::util::fs::{copy_tree, remove_tree};

/// State of one run.
struct RunContext {
  report: BuildReport,
  stack: Vec<Coordinate>,
  /// Packages whose fingerprint was already consulted this run.
  checked: BTreeSet<Coordinate>,
  /// Packages waiting on the stack for their dependencies.
  deferred: BTreeSet<Coordinate>,
}

impl RunContext {
  fn new(root: &Coordinate) -> Self {
    Self {
      report: BuildReport {
        root: Some(root.clone()),
        ..BuildReport::default()
      },
      stack: vec![root.clone()],
      checked: BTreeSet::new(),
      deferred: BTreeSet::new(),
    }
  }

  fn is_settled(&self, coord: &Coordinate) -> bool {
    self.report.resolved.contains(coord) || self.report.missing.contains(coord)
  }

  fn resolve(&mut self, coord: &Coordinate) {
    self.deferred.remove(coord);
    self.report.resolved.insert(coord.clone());
  }

  fn fail(&mut self, coord: &Coordinate) {
    self.deferred.remove(coord);
    self.report.missing.insert(coord.clone());
  }
}

/// How the dependencies of a popped package stand.
enum Readiness {
  Ready,
  Waiting(Vec<Coordinate>),
  Unsolvable(Vec<Coordinate>),
}

/// Builds a package and everything it needs.
pub struct Orchestrator<'a, T> {
  config: &'a Config,
  index: &'a ManifestIndex,
  tool: &'a T,
  mirror: &'a MirrorClient,
  fingerprints: FingerprintStore,
}

impl<'a, T: BuildTool> Orchestrator<'a, T> {
  /// `index` is the manifest index the graph was built from; packages
  /// discovered through code generation are looked up there too.
  pub fn new(config: &'a Config, index: &'a ManifestIndex, tool: &'a T, mirror: &'a MirrorClient) -> Self {
    let fingerprints = FingerprintStore::new(config.paths.fingerprints_dir(), config.fingerprint.exclude.clone());
    Self {
      config,
      index,
      tool,
      mirror,
      fingerprints,
    }
  }

  fn store(&self) -> &ArtifactStore {
    self.mirror.store()
  }

  /// Isolated directory a package is copied into and built in.
  pub fn workdir(&self, coord: &Coordinate) -> PathBuf {
    self.config.paths.work.join(coord.version_dir_buf())
  }

  /// Make `root` and its transitive dependencies available in the store.
  ///
  /// The graph grows when a build generates a package.
  pub async fn resolve_and_build(
    &self,
    root: &Coordinate,
    graph: &mut DependencyGraph,
  ) -> Result<BuildReport, OrchestrateError> {
    if !graph.contains(root) {
      return Err(OrchestrateError::UnknownRoot(root.clone()));
    }

    info!(root = %root, packages = graph.len(), "starting build");
    let mut ctx = RunContext::new(root);

    while let Some(coord) = ctx.stack.pop() {
      if ctx.is_settled(&coord) {
        continue;
      }
      let Some(node) = graph.get(&coord).cloned() else {
        continue;
      };

      match self.check_dependencies(&node, graph, &mut ctx).await {
        Readiness::Unsolvable(pending) => {
          warn!(coordinate = %coord, "cannot build, a dependency is missing");
          ctx.fail(&coord);
          ctx.stack.extend(pending);
        }
        Readiness::Waiting(pending) => {
          debug!(coordinate = %coord, waiting_on = pending.len(), "deferring until dependencies are built");
          ctx.deferred.insert(coord.clone());
          ctx.stack.push(coord);
          ctx.stack.extend(pending);
        }
        Readiness::Ready => self.attempt(&node, graph, &mut ctx).await?,
      }
    }

    let mut report = ctx.report;
    report.summary = summarize(&report, graph);
    info!(
      resolved = report.summary.resolved,
      missing = report.summary.missing,
      local_resolved = report.summary.local_resolved,
      local_missing = report.summary.local_missing,
      "build finished"
    );
    Ok(report)
  }

  async fn check_dependencies(&self, node: &PackageNode, graph: &DependencyGraph, ctx: &mut RunContext) -> Readiness {
    let mut unsolvable = false;
    let mut pending = Vec::new();

    for dep in &node.dependencies {
      if ctx.report.resolved.contains(dep) {
        continue;
      }
      if ctx.report.missing.contains(dep) {
        warn!(coordinate = %node.coordinate, dependency = %dep, "dependency is missing");
        unsolvable = true;
        continue;
      }

      let third_party = graph
        .get(dep)
        .map(|n| n.is_third_party)
        .unwrap_or_else(|| !self.config.resolve.is_local_group(&dep.group));

      if third_party {
        if self.probe_third_party(dep).await {
          ctx.report.resolved.insert(dep.clone());
        } else {
          ctx.report.diagnostics.error(
            DiagnosticKind::MissingDependency,
            format!("missing third-party dependency {} of {}", dep, node.coordinate),
          );
          ctx.report.missing.insert(dep.clone());
          unsolvable = true;
        }
        continue;
      }

      if self.config.resolve.skip_build.contains(dep) {
        info!(dependency = %dep, "skipping deny-listed dependency");
        ctx.report.excluded.insert(dep.clone());
        continue;
      }

      if ctx.deferred.contains(dep) {
        ctx.report.diagnostics.error(
          DiagnosticKind::DependencyCycle,
          format!("dependency cycle: {} depends on {} which is waiting for it", node.coordinate, dep),
        );
        unsolvable = true;
        continue;
      }

      pending.push(dep.clone());
    }

    if unsolvable {
      Readiness::Unsolvable(pending)
    } else if pending.is_empty() {
      Readiness::Ready
    } else {
      Readiness::Waiting(pending)
    }
  }

  /// A third-party package is available if its version directory exists or
  /// a mirror has its descriptor.
  async fn probe_third_party(&self, coord: &Coordinate) -> bool {
    if self.store().has_version(coord) {
      return true;
    }
    debug!(coordinate = %coord, "probing mirrors");
    self.mirror.fetch(&coord.descriptor_path()).await.is_some()
  }

  async fn attempt(
    &self,
    node: &PackageNode,
    graph: &mut DependencyGraph,
    ctx: &mut RunContext,
  ) -> Result<(), OrchestrateError> {
    let coord = &node.coordinate;

    let Some(source_dir) = node.source_dir.as_deref() else {
      if self.store().has_version(coord) {
        warn!(coordinate = %coord, "no sources, using published artifact");
        ctx.resolve(coord);
      } else {
        ctx.report.diagnostics.error(
          DiagnosticKind::MissingSource,
          format!("cannot build {}: no sources and nothing published", coord),
        );
        ctx.fail(coord);
      }
      return Ok(());
    };

    let workdir = self.workdir(coord);
    if self.store().has_descriptor(coord) && self.is_unchanged(ctx, coord, source_dir)? {
      info!(coordinate = %coord, "sources unchanged, keeping published artifact");
      ctx.report.reused.push(coord.clone());
    } else if self.build(coord, source_dir, &workdir, ctx).await? {
      ctx.report.built.push(coord.clone());
    } else {
      ctx.fail(coord);
      return Ok(());
    }

    if workdir.join(&self.config.generated.trigger).is_file() {
      self.generate(coord, source_dir, &workdir, graph, ctx).await?;
    }

    ctx.resolve(coord);
    Ok(())
  }

  /// Fresh copy, tool run, publish. Returns whether the build succeeded.
  async fn build(
    &self,
    coord: &Coordinate,
    source_dir: &Path,
    workdir: &Path,
    ctx: &mut RunContext,
  ) -> Result<bool, OrchestrateError> {
    info!(coordinate = %coord, workdir = %workdir.display(), "building");

    let to_workspace_error = |source| OrchestrateError::Workspace {
      path: workdir.to_path_buf(),
      source,
    };
    remove_tree(workdir).map_err(to_workspace_error)?;
    copy_tree(source_dir, workdir).map_err(to_workspace_error)?;

    if !self
      .run_tool(coord, workdir, &self.config.tool.build_args, DiagnosticKind::BuildFailed, ctx)
      .await
    {
      return Ok(false);
    }

    let artifact = self
      .config
      .tool
      .artifact_candidates(coord)
      .into_iter()
      .map(|rel| workdir.join(rel))
      .find(|path| path.is_file());
    if artifact.is_none() {
      debug!(coordinate = %coord, "no artifact produced, publishing descriptor only");
    }
    self
      .store()
      .publish(coord, &source_dir.join(DESCRIPTOR_FILE), artifact.as_deref())?;

    info!(coordinate = %coord, "built");
    Ok(true)
  }

  /// Produce the package generated by `coord` and merge it into the graph.
  /// Failures are recorded; the producing package stays resolved.
  async fn generate(
    &self,
    coord: &Coordinate,
    source_dir: &Path,
    workdir: &Path,
    graph: &mut DependencyGraph,
    ctx: &mut RunContext,
  ) -> Result<(), OrchestrateError> {
    let generated = self.config.generated.generated_by(coord);
    let output_dir = workdir.join(&self.config.generated.output_dir);

    if output_dir.is_dir() && self.is_unchanged(ctx, coord, source_dir)? {
      debug!(coordinate = %generated, "reusing generated sources");
    } else {
      info!(coordinate = %generated, "generating");
      if !self
        .run_tool(coord, workdir, &self.config.generated.args, DiagnosticKind::GenerationFailed, ctx)
        .await
      {
        return Ok(());
      }
      if !output_dir.is_dir() {
        ctx.report.diagnostics.error(
          DiagnosticKind::GenerationFailed,
          format!("generating {} produced no {}", generated, output_dir.display()),
        );
        return Ok(());
      }
    }

    let (generated_index, diagnostics) = build_index(&output_dir).into_parts();
    ctx.report.diagnostics.extend(diagnostics);

    match graph.get_mut(&generated) {
      Some(node) => node.source_dir = Some(output_dir.clone()),
      None => graph.insert(PackageNode::new(
        generated.clone(),
        Some(output_dir.clone()),
        !self.config.resolve.is_local_group(&generated.group),
      )),
    }
    GraphBuilder::new(&self.config.resolve, &self.config.generated).extend(
      graph,
      &generated,
      &generated_index,
      Some(self.index),
      &mut ctx.report.diagnostics,
    );

    info!(coordinate = %generated, dir = %output_dir.display(), "generated package merged");
    Ok(())
  }

  async fn run_tool(
    &self,
    coord: &Coordinate,
    workdir: &Path,
    args: &[String],
    kind: DiagnosticKind,
    ctx: &mut RunContext,
  ) -> bool {
    match self.tool.run(workdir, args).await {
      Ok(output) if output.succeeded(&self.config.tool.success_marker) => true,
      Ok(output) => {
        ctx.report.diagnostics.error(
          kind,
          format!("build tool failed for {} (exit code {:?})", coord, output.exit_code),
        );
        false
      }
      Err(e) => {
        ctx.report.diagnostics.error(kind, format!("build tool failed for {}: {}", coord, e));
        false
      }
    }
  }

  /// Unchanged if already looked at this run, otherwise ask the fingerprint store.
  fn is_unchanged(&self, ctx: &mut RunContext, coord: &Coordinate, dir: &Path) -> Result<bool, FingerprintError> {
    if !ctx.checked.insert(coord.clone()) {
      return Ok(true);
    }
    Ok(!self.fingerprints.has_changed(dir)?)
  }
}

fn summarize(report: &BuildReport, graph: &DependencyGraph) -> RunSummary {
  let is_local = |coord: &&Coordinate| graph.get(coord).is_some_and(|n| !n.is_third_party);
  RunSummary {
    resolved: report.resolved.len(),
    missing: report.missing.len(),
    local_resolved: report.resolved.iter().filter(is_local).count(),
    local_missing: report.missing.iter().filter(is_local).count(),
  }
}
