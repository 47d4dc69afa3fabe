pub mod validate;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use validate::{FieldError, validate};

/// Directory holding per-project admin state, relative to the project root.
pub const PROJECT_DIR: &str = ".ora2pg-admin";
pub const CONFIG_FILENAME: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("config validation failed:\n{0}")]
    Validation(String),
}

/// Full `.ora2pg-admin/config.yaml` configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub postgresql: PostgresConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub oracle_client: OracleClientConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// Source database connection.
///
/// Exactly one of `sid` / `service` is normally set; `service` wins when both are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OracleConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u32,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub username: String,
    /// May be a `${VAR}` placeholder, see [`ProjectConfig::resolve_env`].
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub schema: String,
}

impl OracleConfig {
    /// The service name when configured, otherwise the SID.
    pub fn identifier(&self) -> &str {
        if self.service.is_empty() {
            &self.sid
        } else {
            &self.service
        }
    }
}

/// Target database connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PostgresConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u32,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MigrationConfig {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub parallel_jobs: u32,
    #[serde(default)]
    pub batch_size: u32,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default)]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OracleClientConfig {
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub auto_detect: bool,
}

impl ProjectConfig {
    /// Settings written by `init` before the user runs any wizard.
    pub fn default_for(project_name: &str) -> Self {
        let now = Utc::now();
        Self {
            project: ProjectInfo {
                name: project_name.to_string(),
                version: "1.0.0".to_string(),
                description: "Oracle to PostgreSQL migration project".to_string(),
                created: Some(now),
                updated: Some(now),
            },
            oracle: OracleConfig {
                host: "localhost".to_string(),
                port: 1521,
                sid: "ORCL".to_string(),
                service: String::new(),
                username: "system".to_string(),
                password: "${ORACLE_PASSWORD}".to_string(),
                schema: String::new(),
            },
            postgresql: PostgresConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "postgres".to_string(),
                username: "postgres".to_string(),
                password: "${PG_PASSWORD}".to_string(),
                schema: "public".to_string(),
            },
            migration: MigrationConfig {
                types: ["TABLE", "VIEW", "SEQUENCE", "INDEX"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                parallel_jobs: 4,
                batch_size: 1000,
                output_dir: "output".to_string(),
                log_level: "INFO".to_string(),
            },
            oracle_client: OracleClientConfig {
                home: String::new(),
                auto_detect: true,
            },
        }
    }

    /// Returns a copy with `${VAR}` password placeholders replaced from the
    /// process environment. Unset variables leave the placeholder untouched.
    pub fn resolve_env(&self) -> Self {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut resolved = self.clone();
        for password in [
            &mut resolved.oracle.password,
            &mut resolved.postgresql.password,
        ] {
            if let Some(name) = env_placeholder(password)
                && let Some(value) = lookup(name).filter(|v| !v.is_empty())
            {
                *password = value;
            }
        }
        resolved
    }
}

/// Extracts `NAME` from a `${NAME}` placeholder.
pub fn env_placeholder(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Path of the config file for the project rooted at `project_root`.
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join(CONFIG_FILENAME)
}

/// Load a project config file.
pub fn load(path: &Path) -> Result<ProjectConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: ProjectConfig =
        serde_yaml_ng::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    tracing::debug!(path = %path.display(), "loaded project config");
    Ok(config)
}

/// Write `config` to `path`, refreshing `project.updated`.
pub fn save(config: &mut ProjectConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    config.project.updated = Some(Utc::now());
    let yaml =
        serde_yaml_ng::to_string(config).map_err(|e| ConfigError::Serialize(e.to_string()))?;
    std::fs::write(path, yaml).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "saved project config");
    Ok(())
}

/// Load and validate in one step, folding field errors into [`ConfigError::Validation`].
pub fn load_validated(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let config = load(path)?;
    let errors = validate(&config);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(validate::summary(&errors)));
    }
    Ok(config)
}
