use ora2pg_admin_config::validate::{ACCEPTED_TYPES, is_valid_host};
use ora2pg_admin_config::{self as config, ProjectConfig};
use ora2pg_admin_core::migration::CONF_FILENAME;
use ora2pg_admin_core::{AdminError, template};

use crate::context::{self, GlobalArgs, Project};
use crate::{prompts, style};

#[derive(Debug, clap::Subcommand)]
pub enum ConfigCommand {
    /// Configure the Oracle source and PostgreSQL target connections
    Db,
    /// Configure migration types, parallelism, batch size and output directory
    Options(OptionsArgs),
}

#[derive(Debug, Default, clap::Args)]
pub struct OptionsArgs {
    /// Comma-separated migration types, e.g. TABLE,VIEW,SEQUENCE
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<String>>,

    /// Parallel ora2pg jobs (1-32)
    #[arg(long)]
    pub parallel: Option<u32>,

    /// Rows per batch for data export
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Output directory, relative to the project root
    #[arg(long)]
    pub output_dir: Option<String>,
}

impl OptionsArgs {
    fn is_empty(&self) -> bool {
        self.types.is_none()
            && self.parallel.is_none()
            && self.batch_size.is_none()
            && self.output_dir.is_none()
    }

    fn apply(self, config: &mut ProjectConfig) {
        if let Some(types) = self.types {
            config.migration.types = types
                .iter()
                .map(|t| t.trim().to_ascii_uppercase())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(n) = self.parallel {
            config.migration.parallel_jobs = n;
        }
        if let Some(n) = self.batch_size {
            config.migration.batch_size = n;
        }
        if let Some(dir) = self.output_dir {
            config.migration.output_dir = dir;
        }
    }
}

pub fn run(global: &GlobalArgs, command: ConfigCommand) -> Result<(), AdminError> {
    let project = context::locate(global)?;
    let mut cfg = config::load(&project.config_path)?;
    match command {
        ConfigCommand::Db => {
            require_terminal("config db")?;
            prompt_oracle(&mut cfg).map_err(AdminError::Validation)?;
            prompt_postgres(&mut cfg).map_err(AdminError::Validation)?;
            check(&cfg)?;
            persist(global, &project, &mut cfg, false)?;
            print_db_summary(&cfg);
        }
        ConfigCommand::Options(args) => {
            if args.is_empty() {
                require_terminal("config options")?;
                prompt_options(&mut cfg).map_err(AdminError::Validation)?;
            } else {
                args.apply(&mut cfg);
            }
            check(&cfg)?;
            persist(global, &project, &mut cfg, true)?;
            print_options_summary(&cfg);
        }
    }
    Ok(())
}

fn require_terminal(command: &str) -> Result<(), AdminError> {
    if prompts::is_interactive() {
        Ok(())
    } else {
        Err(AdminError::Validation(format!(
            "`{command}` is interactive and needs a terminal"
        )))
    }
}

fn check(cfg: &ProjectConfig) -> Result<(), AdminError> {
    let errors = config::validate(cfg);
    if errors.is_empty() {
        return Ok(());
    }
    Err(AdminError::Validation(format!(
        "invalid settings:\n{}",
        config::validate::summary(&errors)
    )))
}

/// Save, and with `regenerate` also rewrite `ora2pg.conf`.
fn persist(
    global: &GlobalArgs,
    project: &Project,
    cfg: &mut ProjectConfig,
    regenerate: bool,
) -> Result<(), AdminError> {
    if global.dry_run {
        println!(
            "{} dry run, {} not written",
            style::arrow_mark(),
            project.config_path.display()
        );
        return Ok(());
    }
    config::save(cfg, &project.config_path)?;
    println!(
        "{} Saved {}",
        style::check_mark(),
        project.config_path.display()
    );
    if regenerate {
        let conf = project
            .root
            .join(&cfg.migration.output_dir)
            .join(CONF_FILENAME);
        template::write_ora2pg_conf(&cfg.resolve_env(), &conf)?;
        println!("{} Regenerated {}", style::check_mark(), conf.display());
    }
    Ok(())
}

fn host_rule(value: &str) -> Result<(), String> {
    if is_valid_host(value) {
        Ok(())
    } else {
        Err("not a valid host name or IP address".to_string())
    }
}

fn prompt_oracle(cfg: &mut ProjectConfig) -> Result<(), String> {
    eprintln!("{}", style::heading("Oracle source"));
    let oracle = &mut cfg.oracle;
    oracle.host = prompts::text_with("Host", &oracle.host, host_rule)?;
    oracle.port = prompts::port("Port", oracle.port)?;

    let by_service = !oracle.service.is_empty();
    let kind = prompts::select(
        "Connect by",
        &["SID", "Service name"],
        usize::from(by_service),
    )?;
    if kind == 0 {
        oracle.sid = prompts::required("SID", &oracle.sid)?;
        oracle.service.clear();
    } else {
        oracle.service = prompts::required("Service name", &oracle.service)?;
        oracle.sid.clear();
    }

    oracle.username = prompts::required("Username", &oracle.username)?;
    oracle.password = prompts::password("Password", &oracle.password)?;
    oracle.schema = prompts::text("Schema (empty for all)", &oracle.schema)?;
    Ok(())
}

fn prompt_postgres(cfg: &mut ProjectConfig) -> Result<(), String> {
    eprintln!("{}", style::heading("PostgreSQL target"));
    let pg = &mut cfg.postgresql;
    pg.host = prompts::text_with("Host", &pg.host, host_rule)?;
    pg.port = prompts::port("Port", pg.port)?;
    pg.database = prompts::required("Database", &pg.database)?;
    pg.username = prompts::required("Username", &pg.username)?;
    pg.password = prompts::password("Password", &pg.password)?;
    pg.schema = prompts::text("Schema", &pg.schema)?;
    Ok(())
}

fn prompt_options(cfg: &mut ProjectConfig) -> Result<(), String> {
    let migration = &mut cfg.migration;
    let checked: Vec<bool> = ACCEPTED_TYPES
        .iter()
        .map(|t| migration.types.iter().any(|s| s.eq_ignore_ascii_case(t)))
        .collect();
    let picked = prompts::multi_select("Migration types", ACCEPTED_TYPES, &checked)?;
    migration.types = picked
        .into_iter()
        .map(|i| ACCEPTED_TYPES[i].to_string())
        .collect();
    migration.parallel_jobs = prompts::number("Parallel jobs", migration.parallel_jobs, 1..=32)?;
    migration.batch_size = prompts::number("Batch size", migration.batch_size, 1..=u32::MAX)?;
    migration.output_dir = prompts::required("Output directory", &migration.output_dir)?;
    Ok(())
}

fn print_db_summary(cfg: &ProjectConfig) {
    let oracle = &cfg.oracle;
    let pg = &cfg.postgresql;
    println!();
    println!(
        "  Oracle      {}@{}:{}/{}{}",
        oracle.username,
        oracle.host,
        oracle.port,
        oracle.identifier(),
        schema_suffix(&oracle.schema)
    );
    println!(
        "  PostgreSQL  {}@{}:{}/{}{}",
        pg.username,
        pg.host,
        pg.port,
        pg.database,
        schema_suffix(&pg.schema)
    );
}

fn print_options_summary(cfg: &ProjectConfig) {
    let m = &cfg.migration;
    println!();
    println!("  Types       {}", style::ident(&m.types.join(", ")));
    println!("  Jobs        {}", m.parallel_jobs);
    println!("  Batch size  {}", m.batch_size);
    println!("  Output      {}", m.output_dir);
}

fn schema_suffix(schema: &str) -> String {
    if schema.is_empty() {
        String::new()
    } else {
        format!(" (schema {schema})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_flags_apply() {
        let mut cfg = ProjectConfig::default_for("x");
        let args = OptionsArgs {
            types: Some(vec!["table".to_string(), " view ".to_string(), String::new()]),
            parallel: Some(8),
            batch_size: None,
            output_dir: Some("out".to_string()),
        };
        assert!(!args.is_empty());
        args.apply(&mut cfg);
        assert_eq!(cfg.migration.types, vec!["TABLE", "VIEW"]);
        assert_eq!(cfg.migration.parallel_jobs, 8);
        assert_eq!(cfg.migration.batch_size, 1000);
        assert_eq!(cfg.migration.output_dir, "out");
    }

    #[test]
    fn empty_options_args() {
        assert!(OptionsArgs::default().is_empty());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut cfg = ProjectConfig::default_for("x");
        cfg.migration.parallel_jobs = 99;
        let err = check(&cfg).unwrap_err();
        assert!(err.to_string().contains("parallel"));
        assert!(check(&ProjectConfig::default_for("x")).is_ok());
    }

    #[test]
    fn schema_suffix_only_when_set() {
        assert_eq!(schema_suffix(""), "");
        assert_eq!(schema_suffix("HR"), " (schema HR)");
    }
}
