pub mod exec;
pub mod fsutil;
pub mod logging;
pub mod migration;
pub mod ora2pg;
pub mod oracle;
pub mod progress;
pub mod project;
pub mod template;
pub mod tracker;

pub use exec::{
    ExecError, ExecutionOptions, ExecutionResult, ExecutionStatus, ProcessSupervisor,
    ProgressModel,
};
pub use logging::{Logger, TracingLogger};
pub use migration::{MigrationError, MigrationOrchestrator, MigrationState};
pub use ora2pg::{MigrationPhase, MigrationType, Ora2pgService};
pub use progress::{ProgressRenderer, SilentRenderer, TrackerStatus};
pub use tracker::ProgressTracker;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Config(#[from] ora2pg_admin_config::ConfigError),
    #[error(transparent)]
    Template(#[from] template::TemplateError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("project already exists: {0}")]
    ProjectExists(String),
    #[error("no ora2pg-admin project found in {0}; run `ora2pg-admin init` first")]
    NotInitialized(String),
    #[error("{0}")]
    Validation(String),
    #[error("init I/O error: {0}")]
    InitIo(String),
    #[error("{failed} of {total} migration steps failed")]
    StepsFailed { failed: usize, total: usize },
    #[error("interrupted")]
    Interrupted,
    #[error("migration timed out after {0}")]
    TimedOut(String),
}
