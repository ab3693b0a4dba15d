//! `flowsync mapping show|merge`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use flowsync_core::{store, FileId, ProjectId, ProjectMappingState};
use flowsync_sync::{release, Collaborators};

/// Inspect or seed the source → target flow id mapping.
#[derive(Subcommand, Debug)]
pub enum MappingCommand {
    /// Print the project's persisted mapping.
    Show(ShowArgs),

    /// Match the project's flows against a release by stable key and persist
    /// the merged mapping.
    Merge(MergeArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub project: String,

    /// Emit the mapping in its persisted JSON layout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    pub project: String,

    /// Release file holding the source-side flows.
    pub file_id: String,
}

#[derive(Tabled)]
struct MappingRow {
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "target")]
    target: String,
}

pub fn run(cmd: MappingCommand) -> Result<()> {
    match cmd {
        MappingCommand::Show(args) => show(args),
        MappingCommand::Merge(args) => merge(args),
    }
}

fn show(args: ShowArgs) -> Result<()> {
    let collab = super::local_collaborators(super::home()?);
    let project_id = ProjectId::from(args.project);
    let project = super::block_on(collab.projects.get(&project_id))?
        .with_context(|| format!("failed to load project '{project_id}'"))?;
    let mapping = project.mapping_or_empty();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        return Ok(());
    }
    print_mapping(&mapping);
    Ok(())
}

fn merge(args: MergeArgs) -> Result<()> {
    let home = super::home()?;
    let project = ProjectId::from(args.project);
    let file_id = FileId::from(args.file_id);

    let lock = store::lock_project_at(&home, &project)
        .with_context(|| format!("cannot merge mapping of '{project}'"))?;
    tracing::debug!(path = %lock.path().display(), "acquired apply lock");
    let collab = super::local_collaborators(home);
    let mapping = super::block_on(merge_and_persist(&collab, &project, &file_id))??;
    drop(lock);

    println!(
        "✓ Mapping of '{project}' now has {} entries",
        mapping.len()
    );
    print_mapping(&mapping);
    Ok(())
}

async fn merge_and_persist(
    collab: &Collaborators,
    project: &ProjectId,
    file_id: &FileId,
) -> Result<ProjectMappingState> {
    let target_flows = release::get_current_state(collab, project)
        .await
        .with_context(|| format!("failed to list flows of '{project}'"))?;
    let source_flows = release::get_new_state(collab, project, file_id)
        .await
        .with_context(|| format!("failed to load release '{file_id}'"))?;
    let mapping = release::get_mapping_state(collab, project, &target_flows, &source_flows)
        .await
        .context("failed to merge mapping")?;
    collab
        .projects
        .update_mapping(project, mapping.clone())
        .await
        .context("failed to persist mapping")?;
    Ok(mapping)
}

fn print_mapping(mapping: &ProjectMappingState) {
    if mapping.is_empty() {
        println!("{}", "No mapped flows.".dimmed());
        return;
    }
    let rows: Vec<MappingRow> = mapping
        .iter()
        .map(|(source, target)| MappingRow {
            source: source.to_string(),
            target: target.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
