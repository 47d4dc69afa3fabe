//! Sequential multi-step migration driving ora2pg once per object type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ora2pg_admin_config::ProjectConfig;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::exec::{ExecutionOptions, ExecutionResult};
use crate::fsutil;
use crate::ora2pg::{MigrationPhase, MigrationType, Ora2pgService};
use crate::template;
use crate::tracker::ProgressTracker;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const CONF_FILENAME: &str = "ora2pg.conf";
pub const LOGS_DIR: &str = "logs";
pub const BACKUP_DIR: &str = "backup";
const NLS_LANG: &str = "AMERICAN_AMERICA.UTF8";

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("failed to create {path}: {message}")]
    Prepare { path: String, message: String },
    /// Results of the steps that ran before the cancellation was noticed.
    #[error("migration cancelled after {} of {total} steps", .results.len())]
    Cancelled {
        results: Vec<ExecutionResult>,
        total: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationState {
    pub current_phase: Option<MigrationPhase>,
    pub current_type: Option<MigrationType>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub is_cancelled: bool,
}

pub struct MigrationOrchestrator {
    config: ProjectConfig,
    root: PathBuf,
    service: Ora2pgService,
    state: MigrationState,
    step_timeout: Duration,
    dry_run: bool,
    verbose: bool,
}

impl MigrationOrchestrator {
    /// `root` is the project directory; relative paths in `config` resolve against it.
    pub fn new(config: ProjectConfig, root: impl Into<PathBuf>, service: Ora2pgService) -> Self {
        Self {
            config,
            root: root.into(),
            service,
            state: MigrationState::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            dry_run: false,
            verbose: false,
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overrides `migration.parallel_jobs`, which ends up as `JOBS` in the generated conf.
    pub fn set_parallel_jobs(&mut self, jobs: u32) {
        self.config.migration.parallel_jobs = jobs;
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.migration.output_dir)
    }

    pub fn conf_path(&self) -> PathBuf {
        self.output_dir().join(CONF_FILENAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Completed steps as a percentage of the plan.
    pub fn progress(&self) -> f64 {
        if self.state.total_steps == 0 {
            return 0.0;
        }
        self.state.completed_steps as f64 / self.state.total_steps as f64 * 100.0
    }

    /// Wall time of the run; frozen once it completes or is cancelled.
    pub fn duration(&self) -> Duration {
        let Some(start) = self.state.started_at else {
            return Duration::ZERO;
        };
        let end = if self.state.is_completed || self.state.is_cancelled {
            self.state.last_update.unwrap_or(start)
        } else {
            Utc::now()
        };
        (end - start).to_std().unwrap_or_default()
    }

    /// Options for one ora2pg invocation.
    pub fn step_options(&self, migration_type: MigrationType) -> ExecutionOptions {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut environment = BTreeMap::new();
        if !self.config.oracle_client.home.is_empty() {
            environment.insert(
                "ORACLE_HOME".to_string(),
                self.config.oracle_client.home.clone(),
            );
        }
        environment.insert("NLS_LANG".to_string(), NLS_LANG.to_string());

        ExecutionOptions {
            config_file: Some(self.conf_path()),
            output_dir: Some(self.output_dir()),
            log_file: Some(
                self.logs_dir()
                    .join(format!("ora2pg-{migration_type}-{stamp}.log")),
            ),
            dry_run: self.dry_run,
            verbose: self.verbose,
            timeout: Some(self.step_timeout),
            working_dir: Some(self.root.clone()),
            environment,
        }
    }

    fn prepare(&self) -> Result<(), MigrationError> {
        for dir in [
            self.output_dir(),
            self.logs_dir(),
            self.root.join(BACKUP_DIR),
        ] {
            fsutil::ensure_dir(&dir).map_err(|e| MigrationError::Prepare {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn write_conf(&self) {
        let path = self.conf_path();
        if let Err(e) = template::write_ora2pg_conf(&self.config.resolve_env(), &path) {
            tracing::warn!(error = %e, "could not generate ora2pg.conf");
        }
    }

    /// Run `steps` in order, one ora2pg process at a time.
    ///
    /// A failed step does not stop the run. Cancellation is checked before
    /// each step; once seen, no further step starts and the results so far
    /// come back inside [`MigrationError::Cancelled`].
    pub async fn execute_with_progress(
        &mut self,
        cancel: &CancellationToken,
        steps: &[MigrationType],
        tracker: &ProgressTracker,
    ) -> Result<Vec<ExecutionResult>, MigrationError> {
        let now = Utc::now();
        self.state = MigrationState {
            total_steps: steps.len(),
            started_at: Some(now),
            last_update: Some(now),
            ..Default::default()
        };
        tracing::info!(steps = steps.len(), root = %self.root.display(), "starting migration");

        self.prepare()?;
        self.write_conf();

        let mut results = Vec::with_capacity(steps.len());
        for (i, &migration_type) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(self.cancelled(results));
            }

            self.state.current_type = Some(migration_type);
            self.state.current_phase = Some(migration_type.phase());
            tracker.set_message(&format!("running {migration_type}"));

            let options = self.step_options(migration_type);
            let result = self.service.execute(cancel, migration_type, &options).await;

            self.state.completed_steps += 1;
            self.state.last_update = Some(Utc::now());
            match &result.error {
                None => tracing::info!(%migration_type, "step completed"),
                Some(e) => tracing::error!(%migration_type, error = %e, "step failed"),
            }

            let outcome = if result.succeeded() { "done" } else { "failed" };
            tracker.update_step(i as u64 + 1, &format!("{migration_type} {outcome}"));
            if let Some(progress) = result.progress.as_ref().filter(|p| !p.message.is_empty()) {
                tracker.update_progress(
                    self.progress(),
                    &format!("{migration_type}: {}", progress.message),
                );
            }
            tracing::debug!(
                step = i + 1,
                total = steps.len(),
                remaining = ?tracker.estimated_time_remaining(),
                "migration progress"
            );
            results.push(result);
        }

        if results.last().is_some_and(ExecutionResult::was_cancelled) {
            return Err(self.cancelled(results));
        }

        self.state.is_completed = true;
        tracing::info!(elapsed = ?self.duration(), "migration finished");
        Ok(results)
    }

    fn cancelled(&mut self, results: Vec<ExecutionResult>) -> MigrationError {
        self.state.is_cancelled = true;
        self.state.last_update = Some(Utc::now());
        tracing::warn!(completed = results.len(), "migration cancelled");
        MigrationError::Cancelled {
            results,
            total: self.state.total_steps,
        }
    }
}

/// Path for a run summary under `logs_dir`.
pub fn summary_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(format!(
        "migration-summary-{}.json",
        Utc::now().format("%Y%m%d-%H%M%S")
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::exec::{ExecError, ExecutionStatus, ProcessSupervisor};
    use crate::logging::CapturingLogger;
    use crate::progress::SilentRenderer;

    const FAKE_ORA2PG: &str = r#"#!/bin/sh
echo "args: $*"
echo "nls: $NLS_LANG"
case "$4" in
  VIEW) echo "ERROR: view export failed" >&2; exit 1 ;;
esac
[ -f "$(dirname "$0")/slow" ] && sleep 5
echo "Processing $4: OBJ (1/1)"
echo "INFO: $4 exported"
"#;

    fn fake_tool(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-ora2pg");
        std::fs::write(&path, FAKE_ORA2PG).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn orchestrator(root: &Path, tool_dir: &Path) -> MigrationOrchestrator {
        let service = Ora2pgService::new(ProcessSupervisor::new(Arc::new(
            CapturingLogger::default(),
        )))
        .with_tool(fake_tool(tool_dir));
        MigrationOrchestrator::new(ProjectConfig::default_for("test"), root, service)
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::with_tick(Arc::new(SilentRenderer), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn failed_step_does_not_stop_the_run() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(root.path(), tools.path());
        let tracker = tracker();
        tracker.start("migrate", 3);

        let results = orch
            .execute_with_progress(
                &CancellationToken::new(),
                &[MigrationType::Table, MigrationType::View, MigrationType::Sequence],
                &tracker,
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ExecutionStatus::Completed);
        assert_eq!(results[1].status, ExecutionStatus::Failed);
        assert_eq!(results[1].error, Some(ExecError::NonZeroExit(1)));
        assert_eq!(results[2].status, ExecutionStatus::Completed);

        let state = orch.state();
        assert!(state.is_completed);
        assert!(!state.is_cancelled);
        assert_eq!(state.completed_steps, 3);
        assert_eq!(state.current_type, Some(MigrationType::Sequence));
        assert_eq!(orch.progress(), 100.0);

        let status = tracker.status();
        assert_eq!(status.current_step, 3);
        assert_eq!(status.percentage, 100.0);
        assert_eq!(status.message, "SEQUENCE: SEQUENCE exported");
        tracker.stop().await;
    }

    #[tokio::test]
    async fn prepares_dirs_conf_and_step_options() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(root.path(), tools.path()).with_dry_run(true);
        orch.set_parallel_jobs(7);
        let tracker = tracker();

        let results = orch
            .execute_with_progress(&CancellationToken::new(), &[MigrationType::Copy], &tracker)
            .await
            .unwrap();

        for dir in ["output", "logs", "backup"] {
            assert!(root.path().join(dir).is_dir());
        }
        let conf = std::fs::read_to_string(root.path().join("output/ora2pg.conf")).unwrap();
        assert!(conf.lines().any(|l| l.starts_with("JOBS") && l.ends_with('7')));

        let out = &results[0].output;
        let args = out.lines().next().unwrap();
        assert!(args.contains(&format!("-c {}", orch.conf_path().display())));
        assert!(args.contains("-t COPY"));
        assert!(args.contains(" -n "));
        assert!(args.contains(&format!("-l {}/ora2pg-COPY-", orch.logs_dir().display())));
        assert!(out.contains("nls: AMERICAN_AMERICA.UTF8"));
        assert_eq!(orch.state().current_phase, Some(MigrationPhase::Data));
    }

    #[test]
    fn step_options_environment() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(root.path(), tools.path())
            .with_step_timeout(Duration::from_secs(5))
            .with_verbose(true);
        orch.config.oracle_client.home = "/opt/oracle/client".to_string();

        let options = orch.step_options(MigrationType::Table);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert!(options.verbose);
        assert_eq!(options.working_dir.as_deref(), Some(root.path()));
        assert_eq!(
            options.environment.get("ORACLE_HOME").map(String::as_str),
            Some("/opt/oracle/client")
        );
        assert_eq!(
            options.environment.get("NLS_LANG").map(String::as_str),
            Some(NLS_LANG)
        );
        let log = options.log_file.unwrap();
        let name = log.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ora2pg-TABLE-") && name.ends_with(".log"));
        assert_eq!(name.len(), "ora2pg-TABLE-20240101-120000.log".len());
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(root.path(), tools.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch
            .execute_with_progress(&cancel, &[MigrationType::Table, MigrationType::View], &tracker())
            .await
            .unwrap_err();
        match err {
            MigrationError::Cancelled { results, total } => {
                assert!(results.is_empty());
                assert_eq!(total, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(orch.state().is_cancelled);
        assert_eq!(orch.state().completed_steps, 0);
    }

    #[tokio::test]
    async fn cancellation_mid_run_keeps_partial_results() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let mut orch = orchestrator(root.path(), tools.path());
        let cancel = CancellationToken::new();

        std::fs::write(tools.path().join("slow"), "").unwrap();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = orch
            .execute_with_progress(
                &cancel,
                &[MigrationType::Table, MigrationType::View, MigrationType::Index],
                &tracker(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "migration cancelled after 1 of 3 steps");

        let MigrationError::Cancelled { results, total } = err else {
            panic!("expected cancellation");
        };
        assert_eq!(total, 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error, Some(ExecError::Cancelled));
        assert!(orch.state().is_cancelled);
        assert!(!orch.state().is_completed);
    }

    #[tokio::test]
    async fn unwritable_output_dir_is_a_prepare_error() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("output"), "not a dir").unwrap();
        let mut orch = orchestrator(root.path(), tools.path());

        let err = orch
            .execute_with_progress(&CancellationToken::new(), &[MigrationType::Table], &tracker())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Prepare { .. }));
    }

    #[test]
    fn duration_and_progress_before_run() {
        let root = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let orch = orchestrator(root.path(), tools.path());
        assert_eq!(orch.progress(), 0.0);
        assert_eq!(orch.duration(), Duration::ZERO);
    }

    #[test]
    fn summary_file_name() {
        let path = summary_path(Path::new("/p/logs"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("migration-summary-") && name.ends_with(".json"));
        assert_eq!(path.parent(), Some(Path::new("/p/logs")));
    }
}
