//! Accumulated, non-fatal problems found while indexing, resolving or building.
//!
//! Scanning and resolution never stop at the first bad descriptor. Problems are
//! recorded here (and emitted as tracing events) so callers can both continue
//! and inspect what went wrong afterwards.

use std::fmt;

use tracing::{error, warn};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Warning,
  Error,
}

/// What kind of problem a diagnostic describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
  /// Descriptor could not be read or is not well-formed XML.
  MalformedDescriptor,
  /// Descriptor lacks groupId, artifactId or version.
  MissingIdentity,
  /// Two descriptors declare the same coordinate.
  DuplicateCoordinate,
  /// Source tree could not be fully walked.
  WalkFailed,
  /// A `[min,max)` range matched no indexed version.
  UnresolvedRange,
  /// A local package has no indexed descriptor.
  MissingDescriptor,
  /// A third-party dependency is neither cached nor fetchable.
  MissingDependency,
  /// A package has no sources and no published artifact.
  MissingSource,
  /// The build tool failed for a package.
  BuildFailed,
  /// The code-generation step failed.
  GenerationFailed,
  /// A dependency chain loops back on a package still waiting for its dependencies.
  DependencyCycle,
}

/// A single recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub severity: Severity,
  pub kind: DiagnosticKind,
  pub message: String,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let level = match self.severity {
      Severity::Warning => "warning",
      Severity::Error => "error",
    };
    write!(f, "{}: {}", level, self.message)
  }
}

/// Overall status of an operation that degrades instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Ok,
  Degraded,
  Failed,
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
  entries: Vec<Diagnostic>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record and log a warning.
  pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
    let message = message.into();
    warn!(kind = ?kind, "{}", message);
    self.entries.push(Diagnostic {
      severity: Severity::Warning,
      kind,
      message,
    });
  }

  /// Record and log an error.
  pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
    let message = message.into();
    error!(kind = ?kind, "{}", message);
    self.entries.push(Diagnostic {
      severity: Severity::Error,
      kind,
      message,
    });
  }

  pub fn extend(&mut self, other: Diagnostics) {
    self.entries.extend(other.entries);
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Whether any diagnostic of the given kind was recorded.
  pub fn has(&self, kind: DiagnosticKind) -> bool {
    self.entries.iter().any(|d| d.kind == kind)
  }

  pub fn count(&self, kind: DiagnosticKind) -> usize {
    self.entries.iter().filter(|d| d.kind == kind).count()
  }

  /// `Ok` when nothing was recorded, `Degraded` otherwise.
  pub fn status(&self) -> Status {
    if self.entries.is_empty() {
      Status::Ok
    } else {
      Status::Degraded
    }
  }
}

/// A value produced despite (possibly) recorded problems.
#[derive(Debug)]
pub struct Outcome<T> {
  pub value: T,
  pub diagnostics: Diagnostics,
  failed: bool,
}

impl<T> Outcome<T> {
  pub fn new(value: T, diagnostics: Diagnostics) -> Self {
    Self {
      value,
      diagnostics,
      failed: false,
    }
  }

  /// An outcome whose value is a placeholder: the operation could not do
  /// its main job, and the diagnostics say why.
  pub fn failed(value: T, diagnostics: Diagnostics) -> Self {
    Self {
      value,
      diagnostics,
      failed: true,
    }
  }

  /// `Failed` when built with [`Outcome::failed`], otherwise the status of the diagnostics.
  pub fn status(&self) -> Status {
    if self.failed {
      Status::Failed
    } else {
      self.diagnostics.status()
    }
  }

  pub fn into_parts(self) -> (T, Diagnostics) {
    (self.value, self.diagnostics)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_is_ok() {
    let diagnostics = Diagnostics::new();
    assert_eq!(diagnostics.status(), Status::Ok);
    assert!(diagnostics.is_empty());
  }

  #[test]
  fn any_entry_degrades() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.warn(DiagnosticKind::DuplicateCoordinate, "duplicate g:a:1");
    diagnostics.error(DiagnosticKind::UnresolvedRange, "no version in [1,2)");
    assert_eq!(diagnostics.status(), Status::Degraded);
    assert!(diagnostics.has(DiagnosticKind::UnresolvedRange));
    assert_eq!(diagnostics.count(DiagnosticKind::DuplicateCoordinate), 1);
    assert_eq!(
      diagnostics.iter().next().map(ToString::to_string).unwrap(),
      "warning: duplicate g:a:1"
    );
  }

  #[test]
  fn failed_outcome_overrides_diagnostics() {
    let ok = Outcome::new((), Diagnostics::new());
    assert_eq!(ok.status(), Status::Ok);

    let mut diagnostics = Diagnostics::new();
    diagnostics.warn(DiagnosticKind::WalkFailed, "cannot read /src");
    let failed = Outcome::failed(0, diagnostics);
    assert_eq!(failed.status(), Status::Failed);
    let (value, diagnostics) = failed.into_parts();
    assert_eq!(value, 0);
    assert_eq!(diagnostics.status(), Status::Degraded);
  }
}
