use std::fmt;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ora2pg_admin_config as config;
use ora2pg_admin_core::migration::{self, MigrationError};
use ora2pg_admin_core::ora2pg::{
    DATA_STEPS, ExecutionSummary, FULL_STEPS, MigrationType, STRUCTURE_STEPS, summarize,
};
use ora2pg_admin_core::progress::{SilentRenderer, TextRenderer, format_duration};
use ora2pg_admin_core::{
    AdminError, ExecutionStatus, MigrationOrchestrator, Ora2pgService, ProcessSupervisor,
    ProgressModel, ProgressRenderer, ProgressTracker, TracingLogger,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::{self, GlobalArgs};
use crate::progress::IndicatifRenderer;
use crate::style;

const LIVE_UPDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MigrationKind {
    /// Schema objects: tables, views, sequences, indexes, triggers, functions, procedures
    Structure,
    /// Table data
    Data,
    /// Structure, data and grants in dependency order
    All,
}

impl MigrationKind {
    pub fn steps(self) -> &'static [MigrationType] {
        match self {
            Self::Structure => STRUCTURE_STEPS,
            Self::Data => DATA_STEPS,
            Self::All => FULL_STEPS,
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure => write!(f, "structure"),
            Self::Data => write!(f, "data"),
            Self::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct MigrateArgs {
    #[arg(value_enum)]
    pub kind: MigrationKind,

    /// Overall time limit, e.g. 2h, 90m, 1h30m
    #[arg(long, value_parser = positive_duration, default_value = "2h")]
    pub timeout: Duration,

    /// Time limit for each ora2pg run
    #[arg(long, value_parser = positive_duration, default_value = "30m")]
    pub step_timeout: Duration,

    /// Override the configured number of parallel jobs
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub parallel: Option<u32>,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    CtrlC,
    Timeout,
}

/// Any `humantime` duration (`2h`, `90m`, `1h 30m`) except zero.
fn positive_duration(s: &str) -> Result<Duration, String> {
    match humantime::parse_duration(s) {
        Ok(d) if d.is_zero() => Err("duration must be greater than zero".to_string()),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("invalid duration '{s}': {e}")),
    }
}

fn renderer(global: &GlobalArgs) -> Arc<dyn ProgressRenderer> {
    if global.quiet {
        Arc::new(SilentRenderer)
    } else if std::io::stderr().is_terminal() {
        Arc::new(IndicatifRenderer::new())
    } else {
        Arc::new(TextRenderer::stderr())
    }
}

/// Cancel `cancel` on Ctrl-C or once `limit` passes, whichever comes first.
/// Resolves to `None` if `done` fires before either.
fn watch(
    cancel: CancellationToken,
    done: CancellationToken,
    limit: Duration,
) -> tokio::task::JoinHandle<Option<Interrupt>> {
    tokio::spawn(async move {
        let reason = tokio::select! {
            _ = done.cancelled() => return None,
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    done.cancelled().await;
                    return None;
                }
                Interrupt::CtrlC
            }
            _ = tokio::time::sleep(limit) => Interrupt::Timeout,
        };
        tracing::warn!(?reason, "stopping migration");
        cancel.cancel();
        Some(reason)
    })
}

/// Mirror live ora2pg progress into the tracker message.
fn forward_live_progress(
    mut rx: mpsc::Receiver<ProgressModel>,
    tracker: Arc<ProgressTracker>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let text = if snapshot.current_step.is_empty() {
                &snapshot.message
            } else {
                &snapshot.current_step
            };
            if !text.is_empty() {
                tracker.set_message(text);
            }
        }
    })
}

pub async fn run(global: &GlobalArgs, args: MigrateArgs) -> Result<(), AdminError> {
    let project = context::locate(global)?;
    let cfg = config::load_validated(&project.config_path)?;
    let steps = args.kind.steps();

    let (tx, rx) = mpsc::channel(LIVE_UPDATES);
    let supervisor = ProcessSupervisor::new(Arc::new(TracingLogger)).with_progress_updates(tx);
    let mut orchestrator =
        MigrationOrchestrator::new(cfg, &project.root, Ora2pgService::new(supervisor))
            .with_step_timeout(args.step_timeout)
            .with_dry_run(global.dry_run)
            .with_verbose(global.verbose);
    if let Some(jobs) = args.parallel {
        orchestrator.set_parallel_jobs(jobs);
    }

    if !global.quiet {
        println!(
            "{} {} migration: {} step(s), {} job(s){}",
            style::arrow_mark(),
            style::bold(&args.kind.to_string()),
            steps.len(),
            orchestrator.config().migration.parallel_jobs,
            if global.dry_run { ", dry run" } else { "" }
        );
    }

    let tracker = Arc::new(ProgressTracker::new(renderer(global)));
    let forwarder = forward_live_progress(rx, Arc::clone(&tracker));
    let cancel = CancellationToken::new();
    let done = CancellationToken::new();
    let watcher = watch(cancel.clone(), done.clone(), args.timeout);

    tracker.start(&format!("{} migration", args.kind), steps.len() as u64);
    let outcome = orchestrator
        .execute_with_progress(&cancel, steps, &tracker)
        .await;
    done.cancel();
    let interrupt = watcher.await.ok().flatten();
    if outcome.is_ok() {
        tracker.complete("done");
    }
    tracker.stop().await;
    forwarder.abort();

    let results = match outcome {
        Ok(results) => results,
        Err(MigrationError::Cancelled { results, .. }) => results,
        Err(e) => return Err(e.into()),
    };
    let summary = summarize(steps, &results);
    print_summary(&summary);
    write_summary(&orchestrator.logs_dir(), args.kind, global.dry_run, &summary);

    match interrupt {
        Some(Interrupt::CtrlC) => return Err(AdminError::Interrupted),
        Some(Interrupt::Timeout) => {
            return Err(AdminError::TimedOut(format_duration(args.timeout)));
        }
        None => {}
    }

    if args.kind == MigrationKind::All {
        print_verdict(&summary, &orchestrator.output_dir());
    }
    if summary.all_succeeded() && summary.total == steps.len() {
        Ok(())
    } else {
        Err(AdminError::StepsFailed {
            failed: summary.total - summary.successful,
            total: summary.total,
        })
    }
}

fn print_summary(summary: &ExecutionSummary) {
    println!();
    println!("{}", style::heading("Migration summary"));
    for step in &summary.steps {
        let name = step
            .migration_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mark = match step.status {
            ExecutionStatus::Completed => style::check_mark(),
            _ if step.cancelled => style::warn_mark(),
            _ => style::cross_mark(),
        };
        let mut line = format!(
            "  {mark} {} {:<9} {:>8}",
            style::ident(&format!("{name:<10}")),
            step.status.to_string(),
            format_duration(step.duration)
        );
        if let Some(err) = &step.error {
            line.push_str(&format!("  {}", style::dim(err)));
        }
        println!("{line}");
    }
    println!();
    println!(
        "Total: {} step(s), {} succeeded, {} failed, {} cancelled in {}",
        summary.total,
        summary.successful,
        summary.failed,
        summary.cancelled,
        format_duration(summary.total_duration)
    );
}

fn print_verdict(summary: &ExecutionSummary, output_dir: &Path) {
    if summary.all_succeeded() {
        println!(
            "{} Validation passed: every step completed, output in {}",
            style::check_mark(),
            output_dir.display()
        );
    } else {
        println!(
            "{} Validation failed: {} step(s) need attention, see the logs directory",
            style::cross_mark(),
            summary.total - summary.successful
        );
    }
}

/// Best effort; a summary that cannot be written only warns.
fn write_summary(logs_dir: &Path, kind: MigrationKind, dry_run: bool, summary: &ExecutionSummary) {
    let path = migration::summary_path(logs_dir);
    let report = serde_json::json!({
        "kind": kind.to_string(),
        "dry_run": dry_run,
        "finished_at": chrono::Utc::now(),
        "summary": summary,
    });
    let written = serde_json::to_string_pretty(&report)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => println!("Summary written to {}", style::dim(&path.display().to_string())),
        Err(e) => eprintln!(
            "{} could not write {}: {e}",
            style::warning_prefix(),
            path.display()
        ),
    }
}
