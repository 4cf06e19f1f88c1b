//! Version ordering and the bracketed `[min,max)` range form.
//!
//! Versions are compared component-wise on their numeric release segments
//! (`1.2 < 1.10`, `1.0 == 1.0.0`). Anything after the release segments is a
//! qualifier; a qualified version sorts before the same release without one
//! (`1.0-rc1 < 1.0`).

use std::cmp::Ordering;
use std::fmt;

/// A parsed version.
#[derive(Debug, Clone, Eq)]
pub struct Version {
  release: Vec<u64>,
  qualifier: Option<String>,
}

impl Version {
  /// Parse a version string. Returns `None` unless it starts with a numeric release.
  pub fn parse(input: &str) -> Option<Self> {
    let input = input.trim();
    let split_at = input
      .find(|c: char| !c.is_ascii_digit() && c != '.')
      .unwrap_or(input.len());
    let (numeric, rest) = input.split_at(split_at);
    let numeric = numeric.trim_end_matches('.');
    if numeric.is_empty() {
      return None;
    }

    let release = numeric
      .split('.')
      .map(|segment| segment.parse::<u64>().ok())
      .collect::<Option<Vec<_>>>()?;

    let qualifier = rest.trim_start_matches(['-', '.', '_']);
    let qualifier = (!qualifier.is_empty()).then(|| qualifier.to_string());

    Some(Self { release, qualifier })
  }

  fn release_cmp(&self, other: &Self) -> Ordering {
    let len = self.release.len().max(other.release.len());
    for i in 0..len {
      let a = self.release.get(i).copied().unwrap_or(0);
      let b = other.release.get(i).copied().unwrap_or(0);
      match a.cmp(&b) {
        Ordering::Equal => continue,
        ord => return ord,
      }
    }
    Ordering::Equal
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .release_cmp(other)
      .then_with(|| match (&self.qualifier, &other.qualifier) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
      })
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
    write!(f, "{}", release.join("."))?;
    if let Some(q) = &self.qualifier {
      write!(f, "-{}", q)?;
    }
    Ok(())
  }
}

/// A half-open version range written as `[min,max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
  pub min: Version,
  pub max: Version,
}

impl VersionRange {
  /// Whether the text uses the bracketed range form at all.
  pub fn is_range(text: &str) -> bool {
    text.len() > 1 && text.starts_with('[') && text.ends_with(')')
  }

  /// Parse `[min,max)`. Returns `None` for any other form or unparsable bounds.
  pub fn parse(text: &str) -> Option<Self> {
    if !Self::is_range(text) {
      return None;
    }
    let inner = &text[1..text.len() - 1];
    let (min, max) = inner.split_once(',')?;
    Some(Self {
      min: Version::parse(min)?,
      max: Version::parse(max)?,
    })
  }

  /// `min <= version < max`.
  pub fn contains(&self, version: &Version) -> bool {
    *version >= self.min && *version < self.max
  }
}

/// Total order over raw version strings, used for listings.
///
/// Parsable versions sort numerically and before unparsable ones; ties and
/// unparsable pairs fall back to plain string order so the result is stable.
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
  match (Version::parse(a), Version::parse(b)) {
    (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => a.cmp(b),
  }
}
