//! Index command implementation.

use anyhow::Result;

use autobuild_lib::config::Config;
use autobuild_lib::index::build_index;

use crate::output::{OutputFormat, plural, print_info, print_json, print_problems, print_stat};

/// List every package descriptor under the source root.
pub fn cmd_index(config: &Config, output: OutputFormat) -> Result<()> {
  let (index, diagnostics) = build_index(&config.paths.sources).into_parts();

  if output.is_json() {
    let entries: Vec<_> = index
      .iter()
      .map(|(coord, dir)| serde_json::json!({ "coordinate": coord, "dir": dir }))
      .collect();
    let problems: Vec<_> = diagnostics.iter().map(|d| d.to_string()).collect();
    return print_json(&serde_json::json!({ "packages": entries, "problems": problems }));
  }

  print_info(&format!(
    "{} under {}",
    plural(index.len(), "package"),
    config.paths.sources.display()
  ));
  for (coord, dir) in index.iter() {
    print_stat(&coord.to_string(), &dir.display().to_string());
  }
  print_problems(&diagnostics);
  Ok(())
}
