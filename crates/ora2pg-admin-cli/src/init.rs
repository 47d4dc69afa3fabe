use ora2pg_admin_core::AdminError;
use ora2pg_admin_core::project::{
    self, PROJECT_SUBDIRS, ProjectTemplate, ScaffoldOptions, project_dir_name,
    validate_project_name,
};

use crate::context::{self, GlobalArgs};
use crate::{prompts, style};

#[derive(Debug, clap::Args)]
pub struct InitArgs {
    /// Project name; prompted for when omitted on a terminal
    pub name: Option<String>,

    /// Reuse an existing project directory, overwriting generated files
    #[arg(short, long)]
    pub force: bool,

    /// Project template: basic, advanced or custom
    #[arg(short, long)]
    pub template: Option<ProjectTemplate>,

    /// One-line project description
    #[arg(short, long)]
    pub description: Option<String>,
}

pub fn run(global: &GlobalArgs, args: InitArgs) -> Result<(), AdminError> {
    let interactive = prompts::is_interactive();
    let name = match args.name {
        Some(name) => name,
        None if interactive => {
            prompts::text_with("Project name", "", validate_project_name)
                .map_err(AdminError::Validation)?
        }
        None => {
            return Err(AdminError::Validation(
                "a project name is required when not running on a terminal".to_string(),
            ));
        }
    };
    validate_project_name(&name).map_err(AdminError::Validation)?;

    let description = match args.description {
        Some(d) => d,
        None if interactive => {
            prompts::text("Description", "").map_err(AdminError::Validation)?
        }
        None => String::new(),
    };

    let template = match args.template {
        Some(t) => t,
        None if interactive => {
            let items: Vec<String> = ProjectTemplate::ALL
                .iter()
                .map(|t| format!("{t:<9} {}", t.description()))
                .collect();
            let idx = prompts::select("Template", &items, 0).map_err(AdminError::Validation)?;
            ProjectTemplate::ALL[idx]
        }
        None => ProjectTemplate::Basic,
    };

    let parent = context::current_dir()?;
    let root = parent.join(project_dir_name(&name));
    let mut force = args.force;
    if root.exists() && !force && interactive {
        force = prompts::confirm(
            &format!("{} exists. Overwrite generated files?", root.display()),
            false,
        )
        .map_err(AdminError::Validation)?;
    }

    if global.dry_run {
        println!(
            "{} would create project '{name}' ({template}) at {}",
            style::arrow_mark(),
            root.display()
        );
        for dir in PROJECT_SUBDIRS {
            println!("  {}", style::dim(&format!("{dir}/")));
        }
        return Ok(());
    }

    let report = project::scaffold(&ScaffoldOptions {
        parent,
        name: name.clone(),
        description,
        template,
        force,
    })?;

    println!(
        "{} Created project {} at {}",
        style::check_mark(),
        style::bold(&name),
        report.root.display()
    );
    if global.verbose {
        for path in &report.created {
            println!("  {}", style::dim(&path.display().to_string()));
        }
    }
    println!();
    println!("Next steps:");
    let dir = report
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for (i, step) in [
        format!("cd {dir}"),
        "ora2pg-admin config db".to_string(),
        "ora2pg-admin check env".to_string(),
        "ora2pg-admin migrate structure".to_string(),
    ]
    .iter()
    .enumerate()
    {
        println!("  {}. {}", i + 1, style::ident(step));
    }
    Ok(())
}
