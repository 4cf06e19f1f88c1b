//! Run configuration loaded from `autobuild.toml`.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Relative paths are resolved against the directory containing the file.
//!
//! ```toml
//! [paths]
//! sources = "sources"
//! repository = "local_repository"
//!
//! [resolve]
//! local_prefixes = ["platform", "projects.tanks"]
//! skip_build = ["platform.server.tools.pdp.maven:Plugin:1.4.5.0"]
//!
//! [resolve.coordinate_overrides]
//! "platform.server.libraries.javax:Mail:0.0.0.1" = "javax.mail:mail:1.4.3"
//!
//! [resolve.version_overrides]
//! "org.eclipse.osgi:org.eclipse.osgi:3.5.1" = "3.5.2"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::coord::Coordinate;
use crate::platform::paths;

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "autobuild.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Complete configuration for a run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub paths: PathsConfig,
  pub resolve: ResolveConfig,
  pub tool: ToolConfig,
  pub generated: GeneratedConfig,
  pub proxy: ProxyConfig,
  pub fingerprint: FingerprintConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
  /// Root of the source tree scanned for descriptors.
  pub sources: PathBuf,
  /// Local artifact store, also used as the mirror cache.
  pub repository: PathBuf,
  /// Scratch area where packages are copied before building.
  pub work: PathBuf,
  /// Where fingerprint baselines are kept. Defaults to the platform cache directory.
  pub fingerprints: Option<PathBuf>,
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      sources: PathBuf::from("sources"),
      repository: PathBuf::from("local_repository"),
      work: PathBuf::from("compilation_cache"),
      fingerprints: None,
    }
  }
}

impl PathsConfig {
  pub fn fingerprints_dir(&self) -> PathBuf {
    self.fingerprints.clone().unwrap_or_else(paths::fingerprints_dir)
  }
}

/// Graph resolution rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
  /// Group prefixes identifying packages built from source. Everything else is third-party.
  pub local_prefixes: Vec<String>,
  /// Local packages never built, treated as satisfied when depended upon.
  pub skip_build: BTreeSet<Coordinate>,
  /// Whole-coordinate replacements.
  pub coordinate_overrides: BTreeMap<Coordinate, Coordinate>,
  /// Version replacements keyed by the full original coordinate.
  pub version_overrides: BTreeMap<Coordinate, String>,
}

impl ResolveConfig {
  /// Whether a group belongs to a package buildable from source.
  pub fn is_local_group(&self, group: &str) -> bool {
    self.local_prefixes.iter().any(|prefix| group.starts_with(prefix.as_str()))
  }

  /// Apply the coordinate table, then the version table to the result.
  pub fn rewrite(&self, coord: &Coordinate) -> Coordinate {
    let coord = self.coordinate_overrides.get(coord).cloned().unwrap_or_else(|| coord.clone());
    match self.version_overrides.get(&coord) {
      Some(version) => coord.with_version(version.clone()),
      None => coord,
    }
  }
}

/// The external build tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
  pub program: String,
  pub build_args: Vec<String>,
  /// Extra environment variables for every invocation.
  pub env: BTreeMap<String, String>,
  /// Substring that must appear in stdout for a run to count as successful.
  pub success_marker: String,
  /// Candidate output files relative to the work directory, first match wins.
  /// `{artifact}` and `{version}` are substituted.
  pub artifact_layouts: Vec<String>,
}

impl Default for ToolConfig {
  fn default() -> Self {
    Self {
      program: "mvn".to_string(),
      build_args: vec!["clean".into(), "install".into(), "-P".into(), "release".into()],
      env: BTreeMap::new(),
      success_marker: "[INFO] BUILD SUCCESSFUL".to_string(),
      artifact_layouts: vec![
        "target/{artifact}-{version}.jar".into(),
        "target/release.swc".into(),
        "target/{artifact}-{version}.swc".into(),
      ],
    }
  }
}

impl ToolConfig {
  /// Expand the artifact layouts for one coordinate.
  pub fn artifact_candidates(&self, coord: &Coordinate) -> Vec<String> {
    self
      .artifact_layouts
      .iter()
      .map(|layout| {
        layout
          .replace("{artifact}", &coord.artifact)
          .replace("{version}", &coord.version)
      })
      .collect()
  }
}

/// Packages produced by a code-generation step of another package.
///
/// A generated package `a.client.x:FooSuffix:v` is produced by building
/// `a.server.x:Foo:v` and then running the generation arguments in its work
/// directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratedConfig {
  /// Artifact suffix marking a generated package.
  pub suffix: String,
  /// Group text of generated packages.
  pub generated_group: String,
  /// Group text of the generating packages.
  pub generator_group: String,
  /// File in the work directory whose presence after a build triggers generation.
  pub trigger: String,
  /// Directory in the work directory holding the generated package.
  pub output_dir: String,
  /// Tool arguments for the generation step.
  pub args: Vec<String>,
}

impl Default for GeneratedConfig {
  fn default() -> Self {
    Self {
      suffix: "ModelsBase".to_string(),
      generated_group: ".client".to_string(),
      generator_group: ".server".to_string(),
      trigger: "target/classes/models.xml".to_string(),
      output_dir: "target/client/fp10".to_string(),
      args: vec![
        "-U".into(),
        "install".into(),
        "platform.server.tools.generator.maven:Flash:1.0.2.0:generate".into(),
      ],
    }
  }
}

impl GeneratedConfig {
  /// For a generated package, the package whose build generates it.
  pub fn generator_of(&self, coord: &Coordinate) -> Option<Coordinate> {
    if self.suffix.is_empty() || coord.artifact.len() <= self.suffix.len() {
      return None;
    }
    let artifact = coord.artifact.strip_suffix(self.suffix.as_str())?;
    Some(Coordinate::new(
      coord.group.replace(&self.generated_group, &self.generator_group),
      artifact,
      coord.version.clone(),
    ))
  }

  /// The package generated by building `coord`.
  pub fn generated_by(&self, coord: &Coordinate) -> Coordinate {
    Coordinate::new(
      coord.group.replace(&self.generator_group, &self.generated_group),
      format!("{}{}", coord.artifact, self.suffix),
      coord.version.clone(),
    )
  }
}

/// Repository proxy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
  pub bind: String,
  pub port: u16,
  /// Remote repositories tried in order for anything not held locally.
  pub mirrors: Vec<String>,
}

impl Default for ProxyConfig {
  fn default() -> Self {
    Self {
      bind: "127.0.0.1".to_string(),
      port: 8001,
      mirrors: vec!["https://repo.maven.apache.org/maven2/".to_string()],
    }
  }
}

/// Source fingerprinting settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FingerprintConfig {
  /// Directory names never hashed (build output, version control).
  pub exclude: Vec<String>,
}

impl Default for FingerprintConfig {
  fn default() -> Self {
    Self {
      exclude: vec!["target".to_string(), ".svn".to_string(), ".git".to_string()],
    }
  }
}

impl Config {
  /// Load and validate a configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Self::from_toml(&content, base).map_err(|e| match e {
      ConfigError::Parse { source, .. } => ConfigError::Parse {
        path: path.to_path_buf(),
        source,
      },
      other => other,
    })
  }

  /// Parse configuration text, resolving relative paths against `base`.
  pub fn from_toml(content: &str, base: &Path) -> Result<Self, ConfigError> {
    let mut config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: PathBuf::new(),
      source,
    })?;
    config.resolve_paths(base);
    config.validate()?;
    Ok(config)
  }

  /// A default configuration with every directory placed under `root`.
  #[cfg(test)]
  pub(crate) fn rooted_at(root: &Path) -> Self {
    let mut config = Config::default();
    config.paths.fingerprints = Some(PathBuf::from("fingerprints"));
    config.resolve_paths(root);
    config
  }

  fn resolve_paths(&mut self, base: &Path) {
    let absolutize = |p: &mut PathBuf| {
      if p.is_relative() {
        *p = base.join(&*p);
      }
    };
    absolutize(&mut self.paths.sources);
    absolutize(&mut self.paths.repository);
    absolutize(&mut self.paths.work);
    if let Some(fingerprints) = self.paths.fingerprints.as_mut() {
      absolutize(fingerprints);
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.resolve.local_prefixes.iter().any(|p| p.trim().is_empty()) {
      return Err(ConfigError::Invalid("local_prefixes must not contain empty entries".into()));
    }
    if let Some((coord, _)) = self.resolve.version_overrides.iter().find(|(_, v)| v.trim().is_empty()) {
      return Err(ConfigError::Invalid(format!("version override for {} is empty", coord)));
    }
    if self.tool.program.trim().is_empty() {
      return Err(ConfigError::Invalid("tool.program must not be empty".into()));
    }
    if self.tool.success_marker.is_empty() {
      return Err(ConfigError::Invalid("tool.success_marker must not be empty".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn empty_file_uses_defaults() {
    let config = Config::from_toml("", Path::new("/base")).unwrap();
    assert_eq!(config.paths.sources, PathBuf::from("/base/sources"));
    assert_eq!(config.paths.repository, PathBuf::from("/base/local_repository"));
    assert_eq!(config.proxy.port, 8001);
    assert_eq!(config.tool.success_marker, "[INFO] BUILD SUCCESSFUL");
    assert_eq!(config.generated.suffix, "ModelsBase");
    assert!(config.resolve.local_prefixes.is_empty());
  }

  #[test]
  fn parses_override_tables() {
    let toml = r#"
      [resolve]
      local_prefixes = ["platform", "projects.tanks"]
      skip_build = ["platform.tools:Plugin:1.4.5.0"]

      [resolve.coordinate_overrides]
      "a.b:C:1.0" = "x.y:Z:2.0"

      [resolve.version_overrides]
      "x.y:Z:2.0" = "2.1"
    "#;
    let config = Config::from_toml(toml, Path::new("/base")).unwrap();
    let resolve = &config.resolve;

    assert!(resolve.is_local_group("projects.tanks.clients"));
    assert!(!resolve.is_local_group("org.eclipse"));
    assert!(resolve.skip_build.contains(&"platform.tools:Plugin:1.4.5.0".parse().unwrap()));
    assert_eq!(
      resolve.rewrite(&Coordinate::new("a.b", "C", "1.0")),
      Coordinate::new("x.y", "Z", "2.1")
    );
  }

  #[test]
  fn rewrite_leaves_unknown_coordinates() {
    let config = Config::default();
    let coord = Coordinate::new("g", "a", "1");
    assert_eq!(config.resolve.rewrite(&coord), coord);
  }

  #[test]
  fn rejects_malformed_override_key() {
    let toml = r#"
      [resolve.coordinate_overrides]
      "not-a-coordinate" = "x:y:1"
    "#;
    let err = Config::from_toml(toml, Path::new("/base")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
  }

  #[test]
  fn rejects_empty_version_override() {
    let toml = r#"
      [resolve.version_overrides]
      "g:a:1" = " "
    "#;
    let err = Config::from_toml(toml, Path::new("/base")).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
  }

  #[test]
  fn rejects_unknown_fields() {
    assert!(Config::from_toml("[proxy]\nprot = 1\n", Path::new("/")).is_err());
  }

  #[test]
  fn load_resolves_relative_to_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join(CONFIG_FILENAME);
    fs::write(&path, "[paths]\nsources = \"src\"\nfingerprints = \"/abs/fp\"\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.paths.sources, temp.path().join("src"));
    assert_eq!(config.paths.fingerprints_dir(), PathBuf::from("/abs/fp"));
  }

  #[test]
  fn load_missing_file_reports_path() {
    let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.toml"));
  }

  #[test]
  fn generated_package_mapping() {
    let generated = GeneratedConfig::default();
    let models = Coordinate::new("projects.tanks.client.battle", "BattleModelsBase", "1.0");
    let generator = generated.generator_of(&models).unwrap();
    assert_eq!(generator, Coordinate::new("projects.tanks.server.battle", "Battle", "1.0"));
    assert_eq!(generated.generated_by(&generator), models);
    assert!(generated.generator_of(&Coordinate::new("g", "ModelsBase", "1")).is_none());
    assert!(generated.generator_of(&Coordinate::new("g", "Plain", "1")).is_none());
  }

  #[test]
  fn artifact_candidates_substitute_placeholders() {
    let tool = ToolConfig::default();
    let candidates = tool.artifact_candidates(&Coordinate::new("g", "lib", "1.0"));
    assert_eq!(
      candidates,
      vec!["target/lib-1.0.jar", "target/release.swc", "target/lib-1.0.swc"]
    );
  }
}
