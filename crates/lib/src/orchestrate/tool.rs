//! The external build tool.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolConfig;

/// The tool could not be run at all.
#[derive(Debug, Error)]
#[error("failed to run {program} in {workdir}: {source}")]
pub struct ToolError {
  pub program: String,
  pub workdir: String,
  #[source]
  pub source: std::io::Error,
}

/// What a finished tool run reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
  /// `None` when the process was killed by a signal.
  pub exit_code: Option<i32>,
  pub stdout: String,
}

impl ToolOutput {
  /// A run succeeded when it exited with 0 and printed the success marker.
  pub fn succeeded(&self, marker: &str) -> bool {
    self.exit_code == Some(0) && self.stdout.contains(marker)
  }
}

/// Runs the build tool in a working directory.
pub trait BuildTool {
  fn run(&self, workdir: &Path, args: &[String]) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

/// Spawns the configured program as a child process.
#[derive(Debug, Clone)]
pub struct ProcessTool {
  program: String,
  env: BTreeMap<String, String>,
}

impl ProcessTool {
  pub fn new(program: impl Into<String>, env: BTreeMap<String, String>) -> Self {
    Self {
      program: program.into(),
      env,
    }
  }

  pub fn from_config(config: &ToolConfig) -> Self {
    Self::new(config.program.clone(), config.env.clone())
  }
}

impl BuildTool for ProcessTool {
  async fn run(&self, workdir: &Path, args: &[String]) -> Result<ToolOutput, ToolError> {
    info!(program = %self.program, args = ?args, workdir = %workdir.display(), "running build tool");

    let mut command = Command::new(&self.program);
    command.args(args).current_dir(workdir);
    for (key, value) in &self.env {
      command.env(key, value);
    }

    let output = command.output().await.map_err(|source| ToolError {
      program: self.program.clone(),
      workdir: workdir.display().to_string(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "build tool stdout");
    }
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "build tool stderr");
    }

    Ok(ToolOutput {
      exit_code: output.status.code(),
      stdout,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn success_needs_exit_zero_and_marker() {
    let ok = ToolOutput {
      exit_code: Some(0),
      stdout: "...\n[INFO] BUILD SUCCESSFUL\n".to_string(),
    };
    assert!(ok.succeeded("[INFO] BUILD SUCCESSFUL"));

    let no_marker = ToolOutput {
      exit_code: Some(0),
      stdout: "[INFO] BUILD FAILURE".to_string(),
    };
    assert!(!no_marker.succeeded("[INFO] BUILD SUCCESSFUL"));

    let bad_exit = ToolOutput {
      exit_code: Some(1),
      stdout: "[INFO] BUILD SUCCESSFUL".to_string(),
    };
    assert!(!bad_exit.succeeded("[INFO] BUILD SUCCESSFUL"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn process_tool_captures_stdout_and_env() {
    let temp = tempdir().unwrap();
    let mut env = BTreeMap::new();
    env.insert("AUTOBUILD_TEST_VALUE".to_string(), "from-env".to_string());
    let tool = ProcessTool::new("sh", env);

    let output = tool
      .run(
        temp.path(),
        &["-c".to_string(), "echo $AUTOBUILD_TEST_VALUE; pwd".to_string()],
      )
      .await
      .unwrap();

    assert_eq!(output.exit_code, Some(0));
    assert!(output.stdout.starts_with("from-env\n"));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn process_tool_reports_exit_code() {
    let temp = tempdir().unwrap();
    let tool = ProcessTool::new("sh", BTreeMap::new());
    let output = tool
      .run(temp.path(), &["-c".to_string(), "exit 3".to_string()])
      .await
      .unwrap();
    assert_eq!(output.exit_code, Some(3));
  }

  #[tokio::test]
  async fn missing_program_is_an_error() {
    let temp = tempdir().unwrap();
    let tool = ProcessTool::new("autobuild-definitely-not-a-program", BTreeMap::new());
    let err = tool.run(temp.path(), &[]).await.unwrap_err();
    assert!(err.to_string().contains("autobuild-definitely-not-a-program"));
  }
}
