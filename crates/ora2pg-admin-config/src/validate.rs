use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::{
    MigrationConfig, OracleClientConfig, OracleConfig, PostgresConfig, ProjectConfig, ProjectInfo,
};

/// Object types accepted in `migration.types`.
pub const ACCEPTED_TYPES: &[&str] = &[
    "TABLE",
    "VIEW",
    "SEQUENCE",
    "INDEX",
    "TRIGGER",
    "FUNCTION",
    "PROCEDURE",
    "PACKAGE",
    "TYPE",
    "GRANT",
    "TABLESPACE",
    "PARTITION",
    "COPY",
    "INSERT",
    "FDW",
    "QUERY",
];

pub const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARN", "ERROR"];

const MAX_PARALLEL_JOBS: u32 = 32;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap()
});

/// A single invalid field, keyed by its dotted path in `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every section of `config`; an empty result means the config is usable.
pub fn validate(config: &ProjectConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_project(&config.project, &mut errors);
    check_oracle(&config.oracle, &mut errors);
    check_postgres(&config.postgresql, &mut errors);
    check_migration(&config.migration, &mut errors);
    check_client(&config.oracle_client, &mut errors);

    if errors.is_empty() {
        tracing::debug!("config validation passed");
    } else {
        tracing::warn!(count = errors.len(), "config validation failed");
    }
    errors
}

/// Numbered, one-per-line rendering of `errors`.
pub fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("  {}. {e}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// IP address, RFC 1123 hostname, or `localhost`.
pub fn is_valid_host(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
        || host.eq_ignore_ascii_case("localhost")
        || HOSTNAME.is_match(host)
}

pub fn is_valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

/// `x.y.z` with numeric components.
pub fn is_valid_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

pub fn is_accepted_type(name: &str) -> bool {
    ACCEPTED_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(name.trim()))
}

fn push(errors: &mut Vec<FieldError>, field: &'static str, message: impl Into<String>) {
    errors.push(FieldError {
        field,
        message: message.into(),
    });
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn check_project(project: &ProjectInfo, errors: &mut Vec<FieldError>) {
    if blank(&project.name) {
        push(errors, "project.name", "must not be empty");
    } else if project.name.chars().count() > 100 {
        push(errors, "project.name", "must be at most 100 characters");
    }

    if !project.version.is_empty() && !is_valid_version(&project.version) {
        push(errors, "project.version", "must use the x.y.z format");
    }
}

fn check_oracle(oracle: &OracleConfig, errors: &mut Vec<FieldError>) {
    if blank(&oracle.host) {
        push(errors, "oracle.host", "must not be empty");
    } else if !is_valid_host(&oracle.host) {
        push(errors, "oracle.host", format!("invalid host '{}'", oracle.host));
    }
    if !is_valid_port(oracle.port) {
        push(errors, "oracle.port", "must be between 1 and 65535");
    }
    if blank(&oracle.sid) && blank(&oracle.service) {
        push(errors, "oracle.sid_or_service", "either a SID or a service name is required");
    }
    if blank(&oracle.username) {
        push(errors, "oracle.username", "must not be empty");
    }
    if blank(&oracle.password) {
        push(errors, "oracle.password", "must not be empty");
    }
}

fn check_postgres(pg: &PostgresConfig, errors: &mut Vec<FieldError>) {
    if blank(&pg.host) {
        push(errors, "postgresql.host", "must not be empty");
    } else if !is_valid_host(&pg.host) {
        push(errors, "postgresql.host", format!("invalid host '{}'", pg.host));
    }
    if !is_valid_port(pg.port) {
        push(errors, "postgresql.port", "must be between 1 and 65535");
    }
    if blank(&pg.database) {
        push(errors, "postgresql.database", "must not be empty");
    }
    if blank(&pg.username) {
        push(errors, "postgresql.username", "must not be empty");
    }
    if blank(&pg.password) {
        push(errors, "postgresql.password", "must not be empty");
    }
}

fn check_migration(migration: &MigrationConfig, errors: &mut Vec<FieldError>) {
    if migration.types.is_empty() {
        push(errors, "migration.types", "at least one migration type is required");
    }
    for t in &migration.types {
        if !is_accepted_type(t) {
            push(errors, "migration.types", format!("unknown migration type '{t}'"));
        }
    }

    if migration.parallel_jobs == 0 {
        push(errors, "migration.parallel_jobs", "must be greater than 0");
    } else if migration.parallel_jobs > MAX_PARALLEL_JOBS {
        push(
            errors,
            "migration.parallel_jobs",
            format!("should not exceed {MAX_PARALLEL_JOBS}"),
        );
    }
    if migration.batch_size == 0 {
        push(errors, "migration.batch_size", "must be greater than 0");
    }
    if blank(&migration.output_dir) {
        push(errors, "migration.output_dir", "must not be empty");
    }
    if !migration.log_level.is_empty()
        && !LOG_LEVELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&migration.log_level))
    {
        push(
            errors,
            "migration.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        );
    }
}

fn check_client(client: &OracleClientConfig, errors: &mut Vec<FieldError>) {
    if !client.auto_detect && blank(&client.home) {
        push(
            errors,
            "oracle_client.home",
            "required when auto_detect is disabled",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(config: &ProjectConfig) -> Vec<&'static str> {
        validate(config).into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn hosts() {
        assert!(is_valid_host("localhost"));
        assert!(is_valid_host("LOCALHOST"));
        assert!(is_valid_host("10.1.2.3"));
        assert!(is_valid_host("::1"));
        assert!(is_valid_host("db-01.corp.example"));
        assert!(!is_valid_host("-bad.example"));
        assert!(!is_valid_host("has space"));
        assert!(!is_valid_host("under_score"));
    }

    #[test]
    fn versions() {
        assert!(is_valid_version("1.0.0"));
        assert!(is_valid_version("10.20.30"));
        assert!(!is_valid_version("1.0"));
        assert!(!is_valid_version("1.0.x"));
        assert!(!is_valid_version("1..0"));
    }

    #[test]
    fn ports() {
        assert!(is_valid_port(1));
        assert!(is_valid_port(65535));
        assert!(!is_valid_port(0));
        assert!(!is_valid_port(70000));
    }

    #[test]
    fn accepted_types_case_insensitive() {
        assert!(is_accepted_type("table"));
        assert!(is_accepted_type(" Copy "));
        assert!(!is_accepted_type("TABLES"));
    }

    #[test]
    fn empty_config_reports_every_section() {
        let found = fields(&ProjectConfig::default());
        for expected in [
            "project.name",
            "oracle.host",
            "oracle.port",
            "oracle.sid_or_service",
            "oracle.username",
            "oracle.password",
            "postgresql.host",
            "postgresql.database",
            "migration.types",
            "migration.parallel_jobs",
            "migration.batch_size",
            "migration.output_dir",
            "oracle_client.home",
        ] {
            assert!(found.contains(&expected), "missing {expected} in {found:?}");
        }
    }

    #[test]
    fn service_name_satisfies_identifier() {
        let mut config = ProjectConfig::default_for("svc");
        config.oracle.sid.clear();
        config.oracle.service = "ORCLPDB1".to_string();
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn unknown_type_and_too_many_jobs() {
        let mut config = ProjectConfig::default_for("x");
        config.migration.types.push("SYNONYM".to_string());
        config.migration.parallel_jobs = 64;
        let errors = validate(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("SYNONYM"));
        assert_eq!(errors[1].field, "migration.parallel_jobs");
    }

    #[test]
    fn bad_log_level() {
        let mut config = ProjectConfig::default_for("x");
        config.migration.log_level = "TRACE".to_string();
        assert_eq!(fields(&config), vec!["migration.log_level"]);
    }

    #[test]
    fn long_project_name() {
        let mut config = ProjectConfig::default_for(&"n".repeat(101));
        config.project.version = "v1".to_string();
        assert_eq!(fields(&config), vec!["project.name", "project.version"]);
    }

    #[test]
    fn summary_is_numbered() {
        let errors = vec![
            FieldError {
                field: "a.b",
                message: "bad".to_string(),
            },
            FieldError {
                field: "c.d",
                message: "worse".to_string(),
            },
        ];
        assert_eq!(summary(&errors), "  1. a.b: bad\n  2. c.d: worse");
    }
}
