//! Shell-command collaborators
//!
//! - [`ShellBuild`] runs the configured build command and fires `build_finished`
//! - [`CommandEngine`] runs the coverage command with `{{tests}}` substituted

use std::path::PathBuf;
use std::process::Output;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use super::{BuildOutcome, BuildSystem, CoverageResult, ExecutionEngine};
use crate::config::{BuildConfig, EngineConfig, TESTS_PLACEHOLDER};
use crate::selection::SelectedTestSet;
use crate::subscription::Notification;

fn shell(command: &str, working_dir: Option<&PathBuf>) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

fn stderr_excerpt(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().rev().find(|l| !l.trim().is_empty());
    match line {
        Some(line) => line.trim().to_string(),
        None => format!("exit status {}", output.status),
    }
}

// ============================================================================
// BUILD
// ============================================================================

/// Build system backed by a shell command
///
/// Without a command every build succeeds immediately. Completion is always
/// reported from a runtime task, never from inside `start_build`.
pub struct ShellBuild {
    command: Option<String>,
    working_dir: Option<PathBuf>,
    finished: Notification<BuildOutcome>,
    runtime: Handle,
}

impl ShellBuild {
    /// Must be called inside a tokio runtime
    pub fn new(config: Option<&BuildConfig>) -> Result<Self> {
        let runtime =
            Handle::try_current().context("ShellBuild must be created inside a tokio runtime")?;
        Ok(Self {
            command: config.map(|c| c.command.clone()),
            working_dir: config.and_then(|c| c.working_dir.clone()),
            finished: Notification::new(),
            runtime,
        })
    }
}

impl BuildSystem for ShellBuild {
    #[instrument(skip(self), fields(command = self.command.as_deref().unwrap_or("<none>")))]
    fn start_build(&self) -> Result<()> {
        let finished = self.finished.clone();
        let command = self.command.clone();
        let working_dir = self.working_dir.clone();

        info!("Build requested");
        self.runtime.spawn(async move {
            let outcome = match command {
                None => BuildOutcome::Succeeded,
                Some(command) => match shell(&command, working_dir.as_ref()).output().await {
                    Ok(output) if output.status.success() => BuildOutcome::Succeeded,
                    Ok(output) => BuildOutcome::failed(stderr_excerpt(&output)),
                    Err(e) => BuildOutcome::failed(format!("failed to launch build: {}", e)),
                },
            };
            if let BuildOutcome::Failed { reason } = &outcome {
                warn!(reason = %reason, "Build failed");
            }
            finished.fire(&outcome);
        });
        Ok(())
    }

    fn build_finished(&self) -> &Notification<BuildOutcome> {
        &self.finished
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Coverage engine backed by a shell command
///
/// `{{tests}}` expands to the selected qualified names, each single-quoted and
/// joined by the configured separator. Stdout that parses as JSON becomes the
/// payload as-is; anything else is wrapped as a JSON string.
pub struct CommandEngine {
    command: String,
    separator: String,
    working_dir: Option<PathBuf>,
}

impl CommandEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            separator: config.separator.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Command line for a given selection
    pub fn render(&self, tests: &SelectedTestSet) -> String {
        // Names never contain quotes, so single-quoting is enough to keep
        // generic brackets away from the shell
        let joined = tests
            .iter()
            .map(|t| format!("'{}'", t.qualified_name()))
            .collect::<Vec<_>>()
            .join(&self.separator);
        self.command.replace(TESTS_PLACEHOLDER, &joined)
    }
}

#[async_trait]
impl ExecutionEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    #[instrument(skip(self, tests), fields(tests = tests.len()))]
    async fn execute(&self, tests: &SelectedTestSet) -> Result<CoverageResult> {
        let command = self.render(tests);
        debug!(command = %command, "Running coverage command");

        let output = shell(&command, self.working_dir.as_ref())
            .output()
            .await
            .context("Failed to launch coverage command")?;

        if !output.status.success() {
            bail!("coverage command failed: {}", stderr_excerpt(&output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let payload = serde_json::from_str::<Value>(&stdout).unwrap_or(Value::String(stdout));
        Ok(CoverageResult::new(payload))
    }
}
