use ora2pg_admin_config as config;
use ora2pg_admin_core::fsutil;
use ora2pg_admin_core::ora2pg::DEFAULT_TOOL;
use ora2pg_admin_core::oracle::{ClientDetector, ClientStatus};
use ora2pg_admin_core::AdminError;

use crate::context::{self, GlobalArgs};
use crate::style;

pub fn run(global: &GlobalArgs) -> Result<(), AdminError> {
    let cwd = context::current_dir()?;
    println!("{}", style::heading("ora2pg-admin status"));
    row("Working directory", &cwd.display().to_string());

    match context::locate(global) {
        Ok(project) => {
            row("Config file", &project.config_path.display().to_string());
            match config::load(&project.config_path) {
                Ok(cfg) => {
                    let errors = config::validate(&cfg);
                    let verdict = if errors.is_empty() {
                        format!("{} valid", style::check_mark())
                    } else {
                        format!("{} {} problem(s)", style::cross_mark(), errors.len())
                    };
                    row(
                        "Project",
                        &format!("{} ({verdict})", style::bold(&cfg.project.name)),
                    );
                    row("Migration types", &cfg.migration.types.join(", "));
                }
                Err(e) => row("Project", &format!("{} {e}", style::cross_mark())),
            }
            row("Project root", &project.root.display().to_string());
        }
        Err(AdminError::NotInitialized(_)) => {
            row("Project", &format!("{} not initialized", style::cross_mark()));
        }
        Err(e) => return Err(e),
    }

    let ora2pg = match fsutil::find_executable(DEFAULT_TOOL) {
        Some(path) => format!("{} {}", style::check_mark(), path.display()),
        None => format!("{} not found", style::cross_mark()),
    };
    row("ora2pg", &ora2pg);

    let report = ClientDetector::from_env().status_report();
    let mark = if report.status == ClientStatus::Compatible {
        style::check_mark()
    } else {
        style::warn_mark()
    };
    row("Oracle client", &format!("{mark} {}", report.message));
    Ok(())
}

fn row(label: &str, value: &str) {
    println!("  {:<18} {value}", format!("{label}:"));
}
