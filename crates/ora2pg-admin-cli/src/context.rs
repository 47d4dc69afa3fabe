use std::path::{Path, PathBuf};

use ora2pg_admin_config::{self as config, ConfigError, PROJECT_DIR};
use ora2pg_admin_core::AdminError;
use ora2pg_admin_core::project::find_project_root;

/// Flags shared by every subcommand.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct GlobalArgs {
    /// Explicit config file instead of searching upward for `.ora2pg-admin/`
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging and verbose ora2pg output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Pass `-n` to ora2pg and do not write files from wizards
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Write log output to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// An initialized project on disk.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config_path: PathBuf,
}

pub fn current_dir() -> Result<PathBuf, AdminError> {
    std::env::current_dir()
        .map_err(|e| AdminError::Validation(format!("cannot determine working directory: {e}")))
}

/// `--config` wins; otherwise the nearest ancestor of the working directory
/// that holds a project.
pub fn locate(global: &GlobalArgs) -> Result<Project, AdminError> {
    if let Some(path) = &global.config {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }
        return Ok(Project {
            root: root_of_config(path),
            config_path: path.clone(),
        });
    }

    let cwd = current_dir()?;
    let root = find_project_root(&cwd)
        .ok_or_else(|| AdminError::NotInitialized(cwd.display().to_string()))?;
    Ok(Project {
        config_path: config::config_path(&root),
        root,
    })
}

/// `<root>/.ora2pg-admin/config.yaml` maps to `<root>`; any other file to its
/// own directory.
fn root_of_config(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match parent.file_name() {
        Some(name) if name == PROJECT_DIR => parent
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf(),
        _ => parent.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_from_standard_config_path() {
        assert_eq!(
            root_of_config(Path::new("/srv/hr/.ora2pg-admin/config.yaml")),
            PathBuf::from("/srv/hr")
        );
        assert_eq!(
            root_of_config(Path::new(".ora2pg-admin/config.yaml")),
            PathBuf::from(".")
        );
    }

    #[test]
    fn root_from_other_config_path() {
        assert_eq!(
            root_of_config(Path::new("/etc/ora2pg-admin/hr.yaml")),
            PathBuf::from("/etc/ora2pg-admin")
        );
        assert_eq!(root_of_config(Path::new("hr.yaml")), PathBuf::from("."));
    }

    #[test]
    fn missing_explicit_config() {
        let global = GlobalArgs {
            config: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..Default::default()
        };
        let err = locate(&global).unwrap_err();
        assert!(matches!(err, AdminError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn explicit_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = config::config_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "project:\n  name: x\n").unwrap();
        let global = GlobalArgs {
            config: Some(path.clone()),
            ..Default::default()
        };
        let project = locate(&global).unwrap();
        assert_eq!(project.root, tmp.path());
        assert_eq!(project.config_path, path);
    }
}
