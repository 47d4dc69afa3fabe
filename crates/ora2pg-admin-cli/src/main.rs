mod check;
mod config_cmd;
mod context;
mod init;
mod migrate;
mod progress;
mod prompts;
mod status;
mod style;
mod theme;

use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ora2pg_admin_core::{AdminError, MigrationError};
use tracing_subscriber::EnvFilter;

use crate::context::GlobalArgs;

#[derive(Parser)]
#[command(
    name = "ora2pg-admin",
    version,
    about = "Set up and run Oracle to PostgreSQL migrations with ora2pg"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a new migration project
    Init(init::InitArgs),

    /// Edit project configuration
    #[command(subcommand)]
    Config(config_cmd::ConfigCommand),

    /// Check the local environment
    #[command(subcommand)]
    Check(check::CheckCommand),

    /// Run a migration
    Migrate(migrate::MigrateArgs),

    /// Show project and tool status
    Status,

    /// Show version and build information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.global) {
        eprintln!("{} {e}", style::error_prefix());
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", style::error_prefix());
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<(), AdminError> {
    let global = cli.global;
    match cli.command {
        Commands::Init(args) => init::run(&global, args),
        Commands::Config(command) => config_cmd::run(&global, command),
        Commands::Check(command) => check::run(&global, command).await,
        Commands::Migrate(args) => migrate::run(&global, args).await,
        Commands::Status => status::run(&global),
        Commands::Version => {
            println!(
                "ora2pg-admin {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("ORA2PG_ADMIN_GIT_HASH"),
                env!("ORA2PG_ADMIN_BUILD_DATE")
            );
            Ok(())
        }
    }
}

fn default_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

/// `RUST_LOG` overrides the level picked from `-q`/`-v`.
fn init_tracing(global: &GlobalArgs) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(global)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(global.verbose);

    match &global.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {e}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn exit_code(err: &AdminError) -> u8 {
    match err {
        AdminError::Config(_) | AdminError::Validation(_) => 2,
        AdminError::NotInitialized(_) => 3,
        AdminError::StepsFailed { .. } => 4,
        AdminError::Interrupted | AdminError::Migration(MigrationError::Cancelled { .. }) => 130,
        AdminError::Template(_)
        | AdminError::Exec(_)
        | AdminError::Migration(MigrationError::Prepare { .. })
        | AdminError::ProjectExists(_)
        | AdminError::InitIo(_)
        | AdminError::TimedOut(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&AdminError::Validation("x".into())), 2);
        assert_eq!(exit_code(&AdminError::NotInitialized("/tmp".into())), 3);
        assert_eq!(
            exit_code(&AdminError::StepsFailed {
                failed: 1,
                total: 3
            }),
            4
        );
        assert_eq!(exit_code(&AdminError::Interrupted), 130);
        assert_eq!(exit_code(&AdminError::TimedOut("2h".into())), 1);
        assert_eq!(exit_code(&AdminError::ProjectExists("demo".into())), 1);
    }

    #[test]
    fn log_levels() {
        let mut global = GlobalArgs::default();
        assert_eq!(default_level(&global), "warn");
        global.verbose = true;
        assert_eq!(default_level(&global), "debug");
        global.quiet = true;
        assert_eq!(default_level(&global), "error");
    }

    #[test]
    fn cli_parses_migrate_flags() {
        let cli = Cli::try_parse_from([
            "ora2pg-admin",
            "--dry-run",
            "migrate",
            "data",
            "--timeout",
            "1h30m",
            "--parallel",
            "8",
        ])
        .unwrap();
        assert!(cli.global.dry_run);
        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(args.kind, migrate::MigrationKind::Data);
        assert_eq!(args.timeout, std::time::Duration::from_secs(5400));
        assert_eq!(args.step_timeout, std::time::Duration::from_secs(1800));
        assert_eq!(args.parallel, Some(8));
    }

    #[test]
    fn cli_rejects_out_of_range_parallel() {
        assert!(Cli::try_parse_from(["ora2pg-admin", "migrate", "all", "--parallel", "64"]).is_err());
        assert!(Cli::try_parse_from(["ora2pg-admin", "-v", "-q", "status"]).is_err());
    }

    #[test]
    fn cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
