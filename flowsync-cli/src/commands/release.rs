//! `flowsync release save|show`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use flowsync_core::{FileId, ProjectId};
use flowsync_sync::release;

/// Export and inspect project state releases.
#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// Snapshot the project's current flows into a release file.
    Save(SaveArgs),

    /// Print the flows stored in a release file as JSON.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    pub project: String,

    /// Release name; stored as `<name>.json`.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub project: String,
    pub file_id: String,
}

pub fn run(cmd: ReleaseCommand) -> Result<()> {
    match cmd {
        ReleaseCommand::Save(args) => save(args),
        ReleaseCommand::Show(args) => show(args),
    }
}

fn save(args: SaveArgs) -> Result<()> {
    let collab = super::local_collaborators(super::home()?);
    let project = ProjectId::from(args.project);
    let file_id = super::block_on(release::save(&collab, &project, &args.name))?
        .with_context(|| format!("failed to save release '{}' of '{project}'", args.name))?;

    println!("✓ Saved release '{}.json' of '{project}'", args.name);
    println!("{file_id}");
    Ok(())
}

fn show(args: ShowArgs) -> Result<()> {
    let collab = super::local_collaborators(super::home()?);
    let project = ProjectId::from(args.project);
    let file_id = FileId::from(args.file_id);
    let flows = super::block_on(release::get_new_state(&collab, &project, &file_id))?
        .with_context(|| format!("failed to load release '{file_id}' of '{project}'"))?;

    println!("{}", serde_json::to_string_pretty(&flows)?);
    Ok(())
}
