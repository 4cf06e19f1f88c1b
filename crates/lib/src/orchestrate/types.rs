//! Result and error types for a build run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::coord::Coordinate;
use crate::diagnostics::Diagnostics;
use crate::fingerprint::FingerprintError;
use crate::store::StoreError;

/// Failures that abort a run.
///
/// Per-package build problems are not errors: they mark the package missing
/// and are reported through [`BuildReport`].
#[derive(Debug, Error)]
pub enum OrchestrateError {
  #[error("root {0} is not in the dependency graph")]
  UnknownRoot(Coordinate),

  #[error("failed to prepare work directory {path}: {source}")]
  Workspace {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Fingerprint(#[from] FingerprintError),
}

/// Counts printed at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub resolved: usize,
  pub missing: usize,
  pub local_resolved: usize,
  pub local_missing: usize,
}

/// Everything a run decided.
#[derive(Debug, Default)]
pub struct BuildReport {
  pub root: Option<Coordinate>,
  /// Packages available in the store by the end of the run.
  pub resolved: BTreeSet<Coordinate>,
  /// Packages that could not be made available.
  pub missing: BTreeSet<Coordinate>,
  /// Packages the build tool ran for, in build order.
  pub built: Vec<Coordinate>,
  /// Packages whose sources were unchanged, so the published result was kept.
  pub reused: Vec<Coordinate>,
  /// Deny-listed packages treated as satisfied without a build.
  pub excluded: BTreeSet<Coordinate>,
  pub summary: RunSummary,
  pub diagnostics: Diagnostics,
}

impl BuildReport {
  /// Whether the root package was made available.
  pub fn success(&self) -> bool {
    self.root.as_ref().is_some_and(|root| !self.missing.contains(root))
  }
}
