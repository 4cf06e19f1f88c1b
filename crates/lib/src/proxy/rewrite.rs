//! Request path rewriting through the override tables.

use tracing::info;

use crate::config::ResolveConfig;
use crate::coord::Coordinate;

/// Apply the coordinate table, then the version table, to a repository path.
pub fn rewrite_path(resolve: &ResolveConfig, path: &str) -> String {
  let path = rewrite_coordinate(resolve, path);
  rewrite_version(resolve, &path)
}

/// `a/b/C/1.0/C-1.0.jar` with `a.b:C:1.0 -> x.y:Z:2.0` becomes `x/y/Z/2.0/Z-2.0.jar`.
fn rewrite_coordinate(resolve: &ResolveConfig, path: &str) -> String {
  for (from, to) in &resolve.coordinate_overrides {
    if let Some(rest) = path.strip_prefix(from.path_stem().as_str()) {
      info!(from = %from, to = %to, "overriding requested coordinate");
      return format!("{}{}", to.path_stem(), rest);
    }
  }
  path.to_string()
}

/// Swap the version directory and, when present, the version in the file name.
fn rewrite_version(resolve: &ResolveConfig, path: &str) -> String {
  for (from, version) in &resolve.version_overrides {
    let dir = format!("{}/", from.version_dir());
    let Some(file) = path.strip_prefix(dir.as_str()) else {
      continue;
    };

    let to: Coordinate = from.with_version(version.clone());
    let stem = format!("{}-{}", from.artifact, from.version);
    let file = match file.strip_prefix(stem.as_str()) {
      Some(rest) => format!("{}-{}{}", to.artifact, to.version, rest),
      None => file.to_string(),
    };
    info!(from = %from, version = %version, "overriding requested version");
    return format!("{}/{}", to.version_dir(), file);
  }
  path.to_string()
}
