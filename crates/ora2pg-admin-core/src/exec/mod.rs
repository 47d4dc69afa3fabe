//! Supervised execution of one external command.
//!
//! [`ProcessSupervisor`] spawns the child, drains stdout and stderr through
//! two concurrent pumps, races exit against cancellation and timeout, and
//! folds everything into an [`ExecutionResult`].

pub mod classify;
mod pump;
mod supervisor;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use classify::ProgressModel;
pub use supervisor::ProcessSupervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Why an execution did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("no command given")]
    EmptyCommand,
    #[error("failed to start {program}: {message}")]
    Start { program: String, message: String },
    #[error("process exited with status {0}")]
    NonZeroExit(i32),
    #[error("process terminated by signal")]
    Terminated,
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("execution cancelled")]
    Cancelled,
    #[error("failed waiting for process: {0}")]
    Wait(String),
    #[error("failed to create {path}: {message}")]
    CreateFailed { path: String, message: String },
    #[error("config file not found: {0}")]
    ConfigNotFound(String),
}

/// Inputs for a single run. Empty paths and `false` flags are omitted from
/// the external tool's argument vector.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub config_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
    /// `None` or zero disables the timeout.
    pub timeout: Option<Duration>,
    pub working_dir: Option<PathBuf>,
    /// Applied on top of the inherited environment; these keys win.
    pub environment: BTreeMap<String, String>,
}

impl ExecutionOptions {
    pub(crate) fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}

/// Outcome of one supervised process.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    /// 0 on success, the child's code on failure, -1 when killed or never run.
    pub exit_code: i32,
    pub output: String,
    pub error_output: String,
    /// `None` when no line was recognized as progress.
    pub progress: Option<ProgressModel>,
    pub error: Option<ExecError>,
}

impl ExecutionResult {
    pub(crate) fn pending() -> Self {
        Self {
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            duration: Duration::ZERO,
            exit_code: -1,
            output: String::new(),
            error_output: String::new(),
            progress: None,
            error: None,
        }
    }

    /// A result for a step that failed before any process was spawned.
    pub fn failed_before_start(error: ExecError) -> Self {
        let mut result = Self::pending();
        result.finish(-1, Some(error));
        result
    }

    /// Freeze the result. Status is derived from the exit code alone.
    pub(crate) fn finish(&mut self, exit_code: i32, error: Option<ExecError>) {
        let ended = Utc::now();
        self.exit_code = exit_code;
        self.status = if exit_code == 0 && error.is_none() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        self.error = error;
        self.duration = (ended - self.started_at).to_std().unwrap_or_default();
        self.ended_at = Some(ended);
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == ExecutionStatus::Cancelled
            || matches!(self.error, Some(ExecError::Cancelled))
    }

    /// The captured error, for callers that want to short-circuit with `?`.
    pub fn check(&self) -> Result<(), ExecError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
