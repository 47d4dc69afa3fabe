//! The ora2pg command line: migration types, argument building, and summaries.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::exec::{
    ExecError, ExecutionOptions, ExecutionResult, ExecutionStatus, ProcessSupervisor,
    ProgressModel,
};
use crate::fsutil;

pub const DEFAULT_TOOL: &str = "ora2pg";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Object types ora2pg can export, passed as `-t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MigrationType {
    Table,
    View,
    Sequence,
    Index,
    Trigger,
    Function,
    Procedure,
    Package,
    Type,
    Grant,
    Copy,
    Insert,
}

pub const STRUCTURE_STEPS: &[MigrationType] = &[
    MigrationType::Table,
    MigrationType::View,
    MigrationType::Sequence,
    MigrationType::Index,
    MigrationType::Trigger,
    MigrationType::Function,
    MigrationType::Procedure,
];
pub const DATA_STEPS: &[MigrationType] = &[MigrationType::Copy, MigrationType::Insert];
pub const FULL_STEPS: &[MigrationType] = &[
    MigrationType::Table,
    MigrationType::View,
    MigrationType::Sequence,
    MigrationType::Copy,
    MigrationType::Index,
    MigrationType::Trigger,
    MigrationType::Function,
    MigrationType::Procedure,
    MigrationType::Grant,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Structure,
    Data,
    Index,
    Function,
    Grant,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Structure => "structure",
            Self::Data => "data",
            Self::Index => "index",
            Self::Function => "function",
            Self::Grant => "grant",
        })
    }
}

impl MigrationType {
    pub const ALL: &[MigrationType] = &[
        Self::Table,
        Self::View,
        Self::Sequence,
        Self::Index,
        Self::Trigger,
        Self::Function,
        Self::Procedure,
        Self::Package,
        Self::Type,
        Self::Grant,
        Self::Copy,
        Self::Insert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Sequence => "SEQUENCE",
            Self::Index => "INDEX",
            Self::Trigger => "TRIGGER",
            Self::Function => "FUNCTION",
            Self::Procedure => "PROCEDURE",
            Self::Package => "PACKAGE",
            Self::Type => "TYPE",
            Self::Grant => "GRANT",
            Self::Copy => "COPY",
            Self::Insert => "INSERT",
        }
    }

    pub fn phase(self) -> MigrationPhase {
        match self {
            Self::Copy | Self::Insert => MigrationPhase::Data,
            Self::Index => MigrationPhase::Index,
            Self::Function | Self::Procedure | Self::Trigger => MigrationPhase::Function,
            Self::Grant => MigrationPhase::Grant,
            Self::Table | Self::View | Self::Sequence | Self::Package | Self::Type => {
                MigrationPhase::Structure
            }
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported migration type '{0}'")]
pub struct UnknownMigrationType(pub String);

impl FromStr for MigrationType {
    type Err = UnknownMigrationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMigrationType(s.to_string()))
    }
}

/// `[tool, -c conf, -t TYPE, -o out, -v, -n, -l log]`, each optional part
/// present only when set.
pub fn build_command_args(
    tool: &str,
    migration_type: MigrationType,
    options: &ExecutionOptions,
) -> Result<Vec<String>, ExecError> {
    let mut args = vec![tool.to_string()];

    if let Some(config) = non_empty(options.config_file.as_deref()) {
        if !fsutil::file_exists(config) {
            return Err(ExecError::ConfigNotFound(config.display().to_string()));
        }
        args.extend(["-c".to_string(), config.display().to_string()]);
    }
    args.extend(["-t".to_string(), migration_type.as_str().to_string()]);
    if let Some(out) = non_empty(options.output_dir.as_deref()) {
        args.extend(["-o".to_string(), out.display().to_string()]);
    }
    if options.verbose {
        args.push("-v".to_string());
    }
    if options.dry_run {
        args.push("-n".to_string());
    }
    if let Some(log) = non_empty(options.log_file.as_deref()) {
        args.extend(["-l".to_string(), log.display().to_string()]);
    }

    tracing::debug!(?args, "built ora2pg arguments");
    Ok(args)
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Create the output directory and the log file's parent.
pub fn prepare_environment(options: &ExecutionOptions) -> Result<(), ExecError> {
    let log_parent = non_empty(options.log_file.as_deref()).and_then(Path::parent);
    for dir in [non_empty(options.output_dir.as_deref()), log_parent]
        .into_iter()
        .flatten()
        .filter(|d| !d.as_os_str().is_empty())
    {
        fsutil::ensure_dir(dir).map_err(|e| ExecError::CreateFailed {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Runs ora2pg once per migration type under a [`ProcessSupervisor`].
pub struct Ora2pgService {
    tool: String,
    supervisor: ProcessSupervisor,
}

impl Ora2pgService {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            supervisor,
        }
    }

    /// Use another executable name or path instead of `ora2pg`.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Whether the tool resolves to an executable, either as a path or on `PATH`.
    pub fn is_available(&self) -> bool {
        if self.tool.contains(std::path::MAIN_SEPARATOR) || self.tool.contains('/') {
            fsutil::file_exists(Path::new(&self.tool))
        } else {
            fsutil::find_executable(&self.tool).is_some()
        }
    }

    /// Build arguments, prepare directories, then run. Failures before the
    /// spawn come back as a failed result without a process ever starting.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        migration_type: MigrationType,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let logger = self.supervisor.logger();
        logger.info(&format!("starting ora2pg migration, type: {migration_type}"));

        let args = match build_command_args(&self.tool, migration_type, options)
            .and_then(|args| prepare_environment(options).map(|()| args))
        {
            Ok(args) => args,
            Err(e) => {
                logger.error(&format!("cannot run {migration_type}: {e}"));
                return ExecutionResult::failed_before_start(e);
            }
        };
        self.supervisor.execute(cancel, &args, options).await
    }

    /// First non-empty line of `<tool> --version`.
    pub async fn version(&self, cancel: &CancellationToken) -> Result<String, ExecError> {
        let options = ExecutionOptions {
            timeout: Some(VERSION_PROBE_TIMEOUT),
            ..Default::default()
        };
        let args = [self.tool.clone(), "--version".to_string()];
        let result = self.supervisor.execute(cancel, &args, &options).await;
        result.check()?;
        Ok(result
            .output
            .lines()
            .chain(result.error_output.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string())
    }
}

/// One row of an [`ExecutionSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub migration_type: Option<MigrationType>,
    pub status: ExecutionStatus,
    pub duration: Duration,
    pub exit_code: i32,
    /// Stopped by cancellation or timeout rather than failing on its own.
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a migration run. Cancelled steps are counted apart
/// from other failures even though their status is `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_duration: Duration,
    pub steps: Vec<StepSummary>,
}

impl ExecutionSummary {
    pub fn all_succeeded(&self) -> bool {
        self.successful == self.total
    }
}

/// `types[i]` labels `results[i]`; extra results are left unlabeled.
pub fn summarize(types: &[MigrationType], results: &[ExecutionResult]) -> ExecutionSummary {
    let mut summary = ExecutionSummary {
        total: results.len(),
        successful: 0,
        failed: 0,
        cancelled: 0,
        total_duration: Duration::ZERO,
        steps: Vec::with_capacity(results.len()),
    };
    for (i, result) in results.iter().enumerate() {
        if result.succeeded() {
            summary.successful += 1;
        } else if result.was_cancelled() {
            summary.cancelled += 1;
        } else if result.status == ExecutionStatus::Failed {
            summary.failed += 1;
        }
        summary.total_duration += result.duration;
        summary.steps.push(StepSummary {
            migration_type: types.get(i).copied(),
            status: result.status,
            duration: result.duration,
            exit_code: result.exit_code,
            cancelled: result.was_cancelled(),
            progress: result.progress.clone(),
            error: result.error.as_ref().map(ToString::to_string),
        });
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use MigrationType::{Copy, Grant, Index, Insert, Package, Sequence, Table, Trigger, View};
    use crate::logging::CapturingLogger;

    #[test]
    fn parse_types() {
        assert_eq!("table".parse::<MigrationType>().unwrap(), Table);
        assert_eq!(" Copy ".parse::<MigrationType>().unwrap(), Copy);
        let err = "SYNONYM".parse::<MigrationType>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported migration type 'SYNONYM'");
        assert_eq!(MigrationType::ALL.len(), 12);
        for t in MigrationType::ALL {
            assert_eq!(t.to_string().parse::<MigrationType>().unwrap(), *t);
        }
    }

    #[test]
    fn phases() {
        assert_eq!(Table.phase(), MigrationPhase::Structure);
        assert_eq!(Package.phase(), MigrationPhase::Structure);
        assert_eq!(Insert.phase(), MigrationPhase::Data);
        assert_eq!(Index.phase(), MigrationPhase::Index);
        assert_eq!(Trigger.phase(), MigrationPhase::Function);
        assert_eq!(Grant.phase(), MigrationPhase::Grant);
    }

    #[test]
    fn presets() {
        assert_eq!(STRUCTURE_STEPS.len(), 7);
        assert_eq!(DATA_STEPS, &[Copy, Insert]);
        assert_eq!(FULL_STEPS.len(), 9);
        assert_eq!(FULL_STEPS[3], Copy);
    }

    #[test]
    fn minimal_args() {
        let args = build_command_args("ora2pg", View, &ExecutionOptions::default()).unwrap();
        assert_eq!(args, vec!["ora2pg", "-t", "VIEW"]);
    }

    #[test]
    fn full_args() {
        let tmp = tempfile::tempdir().unwrap();
        let conf = tmp.path().join("ora2pg.conf");
        std::fs::write(&conf, "").unwrap();
        let options = ExecutionOptions {
            config_file: Some(conf.clone()),
            output_dir: Some(PathBuf::from("out")),
            log_file: Some(PathBuf::from("logs/t.log")),
            dry_run: true,
            verbose: true,
            ..Default::default()
        };
        let args = build_command_args("ora2pg", Table, &options).unwrap();
        assert_eq!(
            args,
            vec![
                "ora2pg".to_string(),
                "-c".to_string(),
                conf.display().to_string(),
                "-t".to_string(),
                "TABLE".to_string(),
                "-o".to_string(),
                "out".to_string(),
                "-v".to_string(),
                "-n".to_string(),
                "-l".to_string(),
                "logs/t.log".to_string(),
            ]
        );
    }

    #[test]
    fn missing_config_file() {
        let options = ExecutionOptions {
            config_file: Some(PathBuf::from("/nonexistent/ora2pg.conf")),
            ..Default::default()
        };
        assert_eq!(
            build_command_args("ora2pg", Table, &options),
            Err(ExecError::ConfigNotFound("/nonexistent/ora2pg.conf".to_string()))
        );
    }

    #[test]
    fn prepare_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let options = ExecutionOptions {
            output_dir: Some(tmp.path().join("output/schema")),
            log_file: Some(tmp.path().join("logs/run/ora2pg.log")),
            ..Default::default()
        };
        prepare_environment(&options).unwrap();
        assert!(tmp.path().join("output/schema").is_dir());
        assert!(tmp.path().join("logs/run").is_dir());
        assert!(!tmp.path().join("logs/run/ora2pg.log").exists());
    }

    #[test]
    fn prepare_reports_create_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let options = ExecutionOptions {
            output_dir: Some(blocker.join("out")),
            ..Default::default()
        };
        let err = prepare_environment(&options).unwrap_err();
        assert!(matches!(err, ExecError::CreateFailed { ref path, .. } if path.ends_with("out")));
    }

    fn result(status: ExecutionStatus, error: Option<ExecError>, secs: u64) -> ExecutionResult {
        let mut r = ExecutionResult::failed_before_start(ExecError::EmptyCommand);
        r.status = status;
        r.error = error;
        r.exit_code = if status == ExecutionStatus::Completed { 0 } else { 1 };
        r.duration = Duration::from_secs(secs);
        r
    }

    #[test]
    fn summary_counts() {
        let results = vec![
            result(ExecutionStatus::Completed, None, 2),
            result(ExecutionStatus::Failed, Some(ExecError::NonZeroExit(1)), 3),
            result(ExecutionStatus::Failed, Some(ExecError::Cancelled), 1),
        ];
        let summary = summarize(&[Table, View], &results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.total_duration, Duration::from_secs(6));
        assert!(!summary.all_succeeded());
        assert_eq!(summary.steps[1].migration_type, Some(View));
        assert_eq!(summary.steps[2].migration_type, None);
        assert_eq!(
            summary.steps[1].error.as_deref(),
            Some("process exited with status 1")
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["steps"][0]["migration_type"], "TABLE");
        assert_eq!(json["steps"][0]["status"], "completed");
        assert!(json["steps"][0].get("error").is_none());
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("ora2pg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn service(logger: Arc<CapturingLogger>) -> Ora2pgService {
        Ora2pgService::new(ProcessSupervisor::new(logger))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_passes_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = fake_tool(tmp.path(), "echo \"args: $*\"");
        let svc = service(Arc::new(CapturingLogger::default())).with_tool(tool);
        assert!(svc.is_available());
        let options = ExecutionOptions {
            output_dir: Some(tmp.path().join("output")),
            dry_run: true,
            ..Default::default()
        };
        let result = svc
            .execute(&CancellationToken::new(), Sequence, &options)
            .await;
        assert!(result.succeeded());
        assert_eq!(
            result.output.trim(),
            format!("args: -t SEQUENCE -o {} -n", tmp.path().join("output").display())
        );
        assert!(tmp.path().join("output").is_dir());
    }

    #[tokio::test]
    async fn execute_fails_before_spawn_on_missing_config() {
        let logger = Arc::new(CapturingLogger::default());
        let svc = service(logger.clone()).with_tool("/nonexistent/ora2pg");
        let options = ExecutionOptions {
            config_file: Some(PathBuf::from("/nonexistent/ora2pg.conf")),
            ..Default::default()
        };
        let result = svc.execute(&CancellationToken::new(), Table, &options).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(matches!(result.error, Some(ExecError::ConfigNotFound(_))));
        assert!(!svc.is_available());
        assert!(logger.messages("error")[0].contains("cannot run TABLE"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn version_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = fake_tool(tmp.path(), "echo; echo 'Ora2Pg v24.3'");
        let svc = service(Arc::new(CapturingLogger::default())).with_tool(tool);
        assert_eq!(
            svc.version(&CancellationToken::new()).await.unwrap(),
            "Ora2Pg v24.3"
        );

        let other = tempfile::tempdir().unwrap();
        let broken = fake_tool(other.path(), "exit 1");
        let svc = service(Arc::new(CapturingLogger::default())).with_tool(broken);
        assert_eq!(
            svc.version(&CancellationToken::new()).await,
            Err(ExecError::NonZeroExit(1))
        );
    }
}
