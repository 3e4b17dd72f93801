//! Shell-command backed collaborators.
//!
//! Command templates may reference `{component}` and `{component_dir}`. The
//! integration and quality commands must print a single JSON object on
//! stdout.

use super::{IntegrationStats, IntegrationTestRunner, QualityChecker, QualityReport, Worker};
use crate::cancellation::CancellationToken;
use crate::core::ComponentResult;
use crate::errors::CollaboratorError;
use crate::graph::Component;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Instant;
use tracing::{debug, instrument};

const STDERR_TAIL_CHARS: usize = 2000;

/// Substitutes `{component}` and `{component_dir}` in a command template.
#[must_use]
pub fn render_command(template: &str, component: &str, components_dir: &Path) -> String {
    let component_dir = components_dir.join(component);
    template
        .replace("{component_dir}", &component_dir.to_string_lossy())
        .replace("{component}", component)
}

/// Runs `sh -c <command>` and captures its output.
///
/// The child process is killed if the returned future is dropped.
async fn run_shell(command: &str, cwd: Option<&Path>) -> Result<Output, CollaboratorError> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    Ok(cmd.output().await?)
}

fn tail(bytes: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - max_chars).collect()
    }
}

fn command_failure(command: &str, output: &Output) -> CollaboratorError {
    CollaboratorError::Command {
        command: command.to_string(),
        status: output.status.code(),
        stderr: tail(&output.stderr, STDERR_TAIL_CHARS),
    }
}

/// Parses the JSON object a command printed on stdout.
///
/// A non-zero exit with unparseable output is reported as a command failure,
/// so test runners that exit 1 on failing tests but still print counts are
/// judged by their counts.
fn parse_json_stdout<T: DeserializeOwned>(
    command: &str,
    output: &Output,
) -> Result<T, CollaboratorError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str(stdout.trim()) {
        Ok(value) => Ok(value),
        Err(_) if !output.status.success() => Err(command_failure(command, output)),
        Err(e) => Err(CollaboratorError::InvalidOutput(format!(
            "`{command}` printed no valid JSON: {e}"
        ))),
    }
}

/// Builds a component by running a shell command.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    template: String,
    components_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl CommandWorker {
    /// Creates a worker from a command template.
    #[must_use]
    pub fn new(template: impl Into<String>, components_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            components_dir: components_dir.into(),
            working_dir: None,
        }
    }

    /// Sets the directory commands run in.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl Worker for CommandWorker {
    #[instrument(skip(self, cancel), fields(component = %component.name))]
    async fn build(
        &self,
        component: &Component,
        cancel: &CancellationToken,
    ) -> Result<ComponentResult, CollaboratorError> {
        let command = render_command(&self.template, &component.name, &self.components_dir);
        debug!(command = %command, "Running worker command");
        let start = Instant::now();

        let output = tokio::select! {
            output = run_shell(&command, self.working_dir.as_deref()) => output?,
            () = cancel.cancelled() => {
                return Err(CollaboratorError::Cancelled(cancel.reason_or_default()));
            }
        };

        if !output.status.success() {
            return Err(command_failure(&command, &output));
        }
        Ok(ComponentResult::succeeded(&component.name)
            .with_duration_ms(start.elapsed().as_secs_f64() * 1000.0))
    }
}

/// Runs the integration suite with a shell command printing
/// `{"executed": N, "total": N, "failed": N}`.
#[derive(Debug, Clone)]
pub struct CommandIntegrationRunner {
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandIntegrationRunner {
    /// Creates a runner for a command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    /// Sets the directory the command runs in.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl IntegrationTestRunner for CommandIntegrationRunner {
    async fn run(&self) -> Result<IntegrationStats, CollaboratorError> {
        let output = run_shell(&self.command, self.working_dir.as_deref()).await?;
        parse_json_stdout(&self.command, &output)
    }
}

/// Checks a component with a shell command printing
/// `{"coverage_pct": F, "lint_ok": B, "fmt_ok": B, "docs_ok": B}`.
#[derive(Debug, Clone)]
pub struct CommandQualityChecker {
    template: String,
    components_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl CommandQualityChecker {
    /// Creates a checker from a command template.
    #[must_use]
    pub fn new(template: impl Into<String>, components_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            components_dir: components_dir.into(),
            working_dir: None,
        }
    }

    /// Sets the directory commands run in.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl QualityChecker for CommandQualityChecker {
    async fn check(&self, component: &Component) -> Result<QualityReport, CollaboratorError> {
        let command = render_command(&self.template, &component.name, &self.components_dir);
        let output = run_shell(&command, self.working_dir.as_deref()).await?;
        parse_json_stdout(&command, &output)
    }
}
