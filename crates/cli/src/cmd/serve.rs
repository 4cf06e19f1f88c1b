//! Serve command implementation.
//!
//! Runs the repository proxy in the foreground.

use std::sync::Arc;

use anyhow::{Context, Result};

use autobuild_lib::config::Config;
use autobuild_lib::proxy::{self, ProxyState};

use crate::output::{print_info, print_stat};

pub fn cmd_serve(config: &Config) -> Result<()> {
  print_info(&format!(
    "Serving {} on http://{}:{}",
    config.paths.repository.display(),
    config.proxy.bind,
    config.proxy.port
  ));
  for mirror in &config.proxy.mirrors {
    print_stat("Mirror", mirror);
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let state = Arc::new(ProxyState::from_config(config));
  rt.block_on(proxy::serve(&config.proxy, state))
    .context("Repository proxy stopped")
}
