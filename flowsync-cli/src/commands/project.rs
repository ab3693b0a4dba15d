//! `flowsync project init <id>` and `flowsync project list`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use flowsync_core::{store, ProjectId};

/// Create and list projects.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project record. Does nothing if it already exists.
    Init(InitArgs),

    /// List all projects.
    List,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project id (e.g. "staging"). Used as the directory name.
    pub id: String,

    /// Human-readable name. Defaults to the id.
    #[arg(long)]
    pub name: Option<String>,
}

pub fn run(cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Init(args) => init(args),
        ProjectCommand::List => list(),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let home = super::home()?;
    let display_name = args.name.unwrap_or_else(|| args.id.clone());
    let project = store::init_project_at(&home, ProjectId::from(args.id.clone()), &display_name)
        .with_context(|| format!("failed to init project '{}'", args.id))?;

    println!("✓ Project '{}' ({})", project.id, project.display_name);
    println!(
        "  Saved to: {}",
        store::project_path_at(&home, &project.id).display()
    );
    Ok(())
}

fn list() -> Result<()> {
    let home = super::home()?;
    let projects = store::list_projects_at(&home).context("failed to list projects")?;

    if projects.is_empty() {
        println!("No projects.");
        println!("Run: flowsync project init <id>");
        return Ok(());
    }

    for id in &projects {
        let project = store::load_project_at(&home, id)
            .with_context(|| format!("failed to load project '{id}'"))?;
        let mapped = project.mapping.as_ref().map_or(0, |m| m.len());
        println!("{} ({}) — {} mapped flows", project.id, project.display_name, mapped);
    }
    Ok(())
}
