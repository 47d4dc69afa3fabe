use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ora2pg_admin_config::{self as config, PROJECT_DIR, ProjectConfig};

use crate::AdminError;

const TEMPLATE_README: &str = include_str!("templates/README.md");
const TEMPLATE_GITIGNORE: &str = include_str!("templates/gitignore.txt");
const TEMPLATE_EXAMPLE_SQL: &str = include_str!("templates/example.sql");

/// Directories created under a new project root.
pub const PROJECT_SUBDIRS: &[&str] = &[PROJECT_DIR, "logs", "output", "scripts", "backup", "docs"];

const MAX_NAME_LEN: usize = 50;
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectTemplate {
    Basic,
    Advanced,
    Custom,
}

impl ProjectTemplate {
    pub const ALL: &[ProjectTemplate] = &[Self::Basic, Self::Advanced, Self::Custom];

    pub fn description(self) -> &'static str {
        match self {
            Self::Basic => "core objects only, recommended for a first migration",
            Self::Advanced => "also indexes, triggers and functions",
            Self::Custom => "defaults, configure everything yourself",
        }
    }

    /// Adjust migration settings of a freshly defaulted config.
    pub fn apply(self, config: &mut ProjectConfig) {
        let types: &[&str] = match self {
            Self::Basic => &["TABLE", "VIEW", "SEQUENCE"],
            Self::Advanced => &["TABLE", "VIEW", "SEQUENCE", "INDEX", "TRIGGER", "FUNCTION"],
            Self::Custom => return,
        };
        config.migration.types = types.iter().map(|t| t.to_string()).collect();
        config.migration.parallel_jobs = if self == Self::Basic { 2 } else { 4 };
    }
}

impl FromStr for ProjectTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "unknown template '{s}'. Available: basic, advanced, custom"
            )),
        }
    }
}

impl fmt::Display for ProjectTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Advanced => write!(f, "advanced"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Directory name for a project: spaces become `_`, everything lowercased.
pub fn project_dir_name(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

pub fn validate_project_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("project name must not be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "project name must be at most {MAX_NAME_LEN} characters"
        ));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(format!("project name must not contain '{c}'"));
    }
    Ok(())
}

pub struct ScaffoldOptions {
    /// Directory the project directory is created in.
    pub parent: PathBuf,
    pub name: String,
    pub description: String,
    pub template: ProjectTemplate,
    /// Write into an existing project directory, overwriting generated files.
    pub force: bool,
}

/// What [`scaffold`] created, relative paths in creation order.
#[derive(Debug)]
pub struct ScaffoldReport {
    pub root: PathBuf,
    pub created: Vec<PathBuf>,
}

pub fn scaffold(options: &ScaffoldOptions) -> Result<ScaffoldReport, AdminError> {
    validate_project_name(&options.name).map_err(AdminError::Validation)?;
    let name = options.name.trim();
    let root = options.parent.join(project_dir_name(name));

    if root.exists() && !options.force {
        return Err(AdminError::ProjectExists(root.display().to_string()));
    }

    let mut created = Vec::new();
    for dir in PROJECT_SUBDIRS {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| AdminError::InitIo(format!("create dir {}: {e}", path.display())))?;
        created.push(PathBuf::from(dir));
    }

    let mut project = ProjectConfig::default_for(name);
    if !options.description.trim().is_empty() {
        project.project.description = options.description.trim().to_string();
    }
    options.template.apply(&mut project);
    let config_path = config::config_path(&root);
    config::save(&mut project, &config_path)?;
    created.push(PathBuf::from(PROJECT_DIR).join(config::CONFIG_FILENAME));

    let readme = TEMPLATE_README
        .replace("{{project_name}}", name)
        .replace("{{description}}", &project.project.description);
    for (rel, content) in [
        ("README.md", readme.as_str()),
        (".gitignore", TEMPLATE_GITIGNORE),
        ("scripts/example.sql", TEMPLATE_EXAMPLE_SQL),
    ] {
        write_file(&root.join(rel), content)?;
        created.push(PathBuf::from(rel));
    }

    tracing::info!(root = %root.display(), template = %options.template, "project initialized");
    Ok(ScaffoldReport { root, created })
}

fn write_file(path: &Path, content: &str) -> Result<(), AdminError> {
    std::fs::write(path, content)
        .map_err(|e| AdminError::InitIo(format!("write {}: {e}", path.display())))
}

/// Nearest ancestor of `start` (inclusive) holding a project directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(parent: &Path, name: &str, template: ProjectTemplate) -> ScaffoldOptions {
        ScaffoldOptions {
            parent: parent.to_path_buf(),
            name: name.to_string(),
            description: String::new(),
            template,
            force: false,
        }
    }

    #[test]
    fn dir_names() {
        assert_eq!(project_dir_name("My Migration"), "my_migration");
        assert_eq!(project_dir_name("  HR "), "hr");
    }

    #[test]
    fn name_rules() {
        assert!(validate_project_name("billing 2024").is_ok());
        assert!(validate_project_name("   ").is_err());
        assert!(validate_project_name(&"x".repeat(51)).is_err());
        assert!(validate_project_name(&"x".repeat(50)).is_ok());
        let err = validate_project_name("a/b").unwrap_err();
        assert!(err.contains("'/'"));
        assert!(validate_project_name("what?").is_err());
    }

    #[test]
    fn template_parse_and_apply() {
        assert_eq!("advanced".parse::<ProjectTemplate>(), Ok(ProjectTemplate::Advanced));
        assert!("fancy".parse::<ProjectTemplate>().unwrap_err().contains("basic"));

        let mut config = ProjectConfig::default_for("x");
        ProjectTemplate::Basic.apply(&mut config);
        assert_eq!(config.migration.types, vec!["TABLE", "VIEW", "SEQUENCE"]);
        assert_eq!(config.migration.parallel_jobs, 2);

        ProjectTemplate::Advanced.apply(&mut config);
        assert_eq!(config.migration.types.len(), 6);
        assert_eq!(config.migration.parallel_jobs, 4);

        let mut custom = ProjectConfig::default_for("x");
        let before = custom.clone();
        ProjectTemplate::Custom.apply(&mut custom);
        assert_eq!(custom, before);
    }

    #[test]
    fn scaffold_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let mut opts = options(tmp.path(), "Billing Move", ProjectTemplate::Basic);
        opts.description = "move billing".to_string();
        let report = scaffold(&opts).unwrap();

        assert_eq!(report.root, tmp.path().join("billing_move"));
        for dir in PROJECT_SUBDIRS {
            assert!(report.root.join(dir).is_dir(), "missing {dir}");
        }
        for file in ["README.md", ".gitignore", "scripts/example.sql"] {
            assert!(report.root.join(file).is_file(), "missing {file}");
        }
        let readme = std::fs::read_to_string(report.root.join("README.md")).unwrap();
        assert!(readme.starts_with("# Billing Move\n\nmove billing"));

        let config = config::load(&config::config_path(&report.root)).unwrap();
        assert_eq!(config.project.name, "Billing Move");
        assert_eq!(config.project.description, "move billing");
        assert_eq!(config.migration.parallel_jobs, 2);
        assert!(config::validate(&config).is_empty());
        assert_eq!(report.created.len(), PROJECT_SUBDIRS.len() + 4);
    }

    #[test]
    fn existing_project_needs_force() {
        let tmp = tempfile::tempdir().unwrap();
        scaffold(&options(tmp.path(), "demo", ProjectTemplate::Custom)).unwrap();
        let notes = tmp.path().join("demo/docs/notes.md");
        std::fs::write(&notes, "keep me").unwrap();

        let err = scaffold(&options(tmp.path(), "demo", ProjectTemplate::Custom)).unwrap_err();
        assert!(matches!(err, AdminError::ProjectExists(_)));

        let mut forced = options(tmp.path(), "demo", ProjectTemplate::Advanced);
        forced.force = true;
        scaffold(&forced).unwrap();
        assert_eq!(std::fs::read_to_string(&notes).unwrap(), "keep me");
        let config = config::load(&config::config_path(&tmp.path().join("demo"))).unwrap();
        assert_eq!(config.migration.types.len(), 6);
    }

    #[test]
    fn invalid_name_is_rejected_before_touching_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scaffold(&options(tmp.path(), "a:b", ProjectTemplate::Basic)).unwrap_err();
        assert!(matches!(err, AdminError::Validation(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn project_root_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let report = scaffold(&options(tmp.path(), "demo", ProjectTemplate::Basic)).unwrap();
        let nested = report.root.join("output/schema");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested), Some(report.root.clone()));
        assert_eq!(find_project_root(&report.root), Some(report.root));
        assert_eq!(find_project_root(tmp.path()), None);
    }
}
