use std::sync::Arc;

use ora2pg_admin_config as config;
use ora2pg_admin_core::fsutil;
use ora2pg_admin_core::oracle::{self, ClientDetector, ClientStatus, ClientStatusReport};
use ora2pg_admin_core::project::PROJECT_SUBDIRS;
use ora2pg_admin_core::{AdminError, Ora2pgService, ProcessSupervisor, TracingLogger};
use tokio_util::sync::CancellationToken;

use crate::context::{self, GlobalArgs};
use crate::style;

#[derive(Debug, clap::Subcommand)]
pub enum CheckCommand {
    /// Check ora2pg, the Oracle client and the project layout
    Env,
}

/// Problems block a migration; warnings only get reported.
#[derive(Debug, Default)]
struct Tally {
    problems: usize,
    warnings: usize,
}

impl Tally {
    fn ok(&self, msg: &str) {
        println!("  {} {msg}", style::check_mark());
    }

    fn warn(&mut self, msg: &str) {
        self.warnings += 1;
        println!("  {} {msg}", style::warn_mark());
    }

    fn fail(&mut self, msg: &str) {
        self.problems += 1;
        println!("  {} {msg}", style::cross_mark());
    }

    fn hint(&self, msg: &str) {
        println!("    {} {msg}", style::arrow_mark());
    }
}

pub async fn run(global: &GlobalArgs, command: CheckCommand) -> Result<(), AdminError> {
    match command {
        CheckCommand::Env => env(global).await,
    }
}

async fn env(global: &GlobalArgs) -> Result<(), AdminError> {
    let mut tally = Tally::default();

    println!("{}", style::heading("ora2pg"));
    check_ora2pg(&mut tally).await;

    println!("{}", style::heading("Oracle client"));
    let report = tokio::task::spawn_blocking(|| ClientDetector::from_env().status_report())
        .await
        .map_err(|e| AdminError::Validation(format!("client detection failed: {e}")))?;
    check_client(&mut tally, &report);

    println!("{}", style::heading("Project"));
    check_project(global, &mut tally);

    println!();
    if tally.problems == 0 {
        let note = if tally.warnings > 0 {
            format!(" ({} warning(s))", tally.warnings)
        } else {
            String::new()
        };
        println!("{} Environment ready{note}", style::check_mark());
        Ok(())
    } else {
        Err(AdminError::Validation(format!(
            "environment check found {} problem(s)",
            tally.problems
        )))
    }
}

async fn check_ora2pg(tally: &mut Tally) {
    let service = Ora2pgService::new(ProcessSupervisor::new(Arc::new(TracingLogger)));
    if !service.is_available() {
        tally.fail("ora2pg not found on PATH");
        tally.hint("install ora2pg from https://ora2pg.darold.net and make sure it is on PATH");
        return;
    }
    match service.version(&CancellationToken::new()).await {
        Ok(version) if !version.is_empty() => tally.ok(&format!("ora2pg found: {version}")),
        Ok(_) => tally.warn("ora2pg found, but it printed no version"),
        Err(e) => {
            tally.warn(&format!("ora2pg found, but `ora2pg --version` failed: {e}"));
        }
    }
}

fn check_client(tally: &mut Tally, report: &ClientStatusReport) {
    match report.status {
        ClientStatus::Compatible => tally.ok(&report.message),
        // ora2pg can still work through a client it finds by itself.
        ClientStatus::NotInstalled | ClientStatus::Incompatible | ClientStatus::UnknownVersion => {
            tally.warn(&report.message)
        }
    }
    let client = &report.client;
    if !client.home.is_empty() {
        println!("    home: {}", style::dim(&client.home));
    } else if !client.path.is_empty() {
        println!("    path: {}", style::dim(&client.path));
    }
    for rec in &report.recommendations {
        tally.hint(rec);
    }
    if report.status == ClientStatus::NotInstalled {
        let guide = oracle::installation_guide();
        tally.hint(&format!("download: {}", guide.download_url));
        for (i, step) in guide.instructions.iter().enumerate() {
            println!("      {}. {step}", i + 1);
        }
    }
}

fn check_project(global: &GlobalArgs, tally: &mut Tally) {
    let project = match context::locate(global) {
        Ok(p) => p,
        Err(AdminError::NotInitialized(dir)) => {
            tally.warn(&format!("no project found in {dir}"));
            tally.hint("run `ora2pg-admin init <name>` to create one");
            return;
        }
        Err(e) => {
            tally.fail(&e.to_string());
            return;
        }
    };

    match config::load_validated(&project.config_path) {
        Ok(_) => tally.ok(&format!(
            "config valid: {}",
            project.config_path.display()
        )),
        Err(config::ConfigError::Validation(summary)) => {
            tally.fail(&format!("config invalid: {}", project.config_path.display()));
            for line in summary.lines() {
                println!("    {}", style::dim(line.trim()));
            }
        }
        Err(e) => tally.fail(&e.to_string()),
    }

    let missing: Vec<&str> = PROJECT_SUBDIRS
        .iter()
        .copied()
        .filter(|d| !fsutil::dir_exists(&project.root.join(d)))
        .collect();
    if missing.is_empty() {
        tally.ok("project directories present");
    } else {
        tally.warn(&format!("missing directories: {}", missing.join(", ")));
        tally.hint("they are created on demand by `migrate`");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts() {
        let mut tally = Tally::default();
        tally.ok("fine");
        tally.warn("hmm");
        tally.fail("bad");
        tally.fail("worse");
        assert_eq!(tally.problems, 2);
        assert_eq!(tally.warnings, 1);
    }

    #[test]
    fn incompatible_client_is_only_a_warning() {
        let mut tally = Tally::default();
        let report = ClientStatusReport {
            checked_at: chrono::Utc::now(),
            status: ClientStatus::Incompatible,
            message: "Oracle client 10.2.0.1.0 may not be compatible".to_string(),
            client: Default::default(),
            recommendations: vec!["upgrade".to_string()],
        };
        check_client(&mut tally, &report);
        assert_eq!(tally.problems, 0);
        assert_eq!(tally.warnings, 1);
    }
}
