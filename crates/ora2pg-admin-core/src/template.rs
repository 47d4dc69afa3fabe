use std::fmt::Write as _;
use std::path::Path;

use ora2pg_admin_config::ProjectConfig;

#[derive(Debug, thiserror::Error)]
#[error("failed to write {path}: {source}")]
pub struct TemplateError {
    pub path: String,
    pub source: std::io::Error,
}

/// `dbi:Oracle:` DSN, preferring the service name over the SID.
pub fn oracle_dsn(config: &ProjectConfig) -> String {
    let oracle = &config.oracle;
    if oracle.service.is_empty() {
        format!(
            "dbi:Oracle:host={};sid={};port={}",
            oracle.host, oracle.sid, oracle.port
        )
    } else {
        format!(
            "dbi:Oracle:host={};service_name={};port={}",
            oracle.host, oracle.service, oracle.port
        )
    }
}

pub fn postgres_dsn(config: &ProjectConfig) -> String {
    let pg = &config.postgresql;
    format!("dbi:Pg:dbname={};host={};port={}", pg.database, pg.host, pg.port)
}

/// Render an `ora2pg.conf` for `config`. Pass a config that has already had
/// its `${VAR}` passwords resolved.
pub fn render_ora2pg_conf(config: &ProjectConfig) -> String {
    let mut out = String::new();
    let mut directive = |key: &str, value: &str| {
        let _ = writeln!(out, "{key:<16}{value}");
    };

    if !config.oracle_client.home.is_empty() {
        directive("ORACLE_HOME", &config.oracle_client.home);
    }
    directive("ORACLE_DSN", &oracle_dsn(config));
    directive("ORACLE_USER", &config.oracle.username);
    directive("ORACLE_PWD", &config.oracle.password);
    if !config.oracle.schema.is_empty() {
        directive("SCHEMA", &config.oracle.schema);
    }

    directive("PG_DSN", &postgres_dsn(config));
    directive("PG_USER", &config.postgresql.username);
    directive("PG_PWD", &config.postgresql.password);
    if !config.postgresql.schema.is_empty() {
        directive("PG_SCHEMA", &config.postgresql.schema);
    }

    let migration = &config.migration;
    let types: Vec<String> = migration
        .types
        .iter()
        .map(|t| t.trim().to_ascii_uppercase())
        .collect();
    directive("TYPE", &types.join(","));
    directive("JOBS", &migration.parallel_jobs.to_string());
    directive("DATA_LIMIT", &migration.batch_size.to_string());
    directive("OUTPUT_DIR", &migration.output_dir);
    let debug = migration.log_level.eq_ignore_ascii_case("DEBUG");
    directive("DEBUG", if debug { "1" } else { "0" });

    let mut header = format!(
        "# ora2pg configuration for project '{}'\n# generated by ora2pg-admin; edits are overwritten\n\n",
        config.project.name
    );
    header.push_str(&out);
    header
}

/// Render and write to `path`, creating parent directories.
pub fn write_ora2pg_conf(config: &ProjectConfig, path: &Path) -> Result<(), TemplateError> {
    let io_err = |p: &Path| {
        let path = p.display().to_string();
        move |source| TemplateError { path, source }
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::write(path, render_ora2pg_conf(config)).map_err(io_err(path))?;
    tracing::info!(path = %path.display(), "generated ora2pg.conf");
    Ok(())
}
