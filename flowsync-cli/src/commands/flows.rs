//! `flowsync flows list <project>`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use flowsync_core::{FlowState, ProjectId};
use flowsync_sync::release;

/// Inspect the flows of a project.
#[derive(Subcommand, Debug)]
pub enum FlowsCommand {
    /// Show every flow in a project.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub project: String,

    /// Emit the full flow listing as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct FlowRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "external id")]
    external_id: String,
    #[tabled(rename = "published")]
    published: String,
}

impl From<&FlowState> for FlowRow {
    fn from(flow: &FlowState) -> Self {
        let published = match &flow.published_version_id {
            Some(v) if *v == flow.version.id => "current",
            Some(_) => "outdated",
            None => "-",
        };
        Self {
            id: flow.id.to_string(),
            name: flow.version.display_name.clone(),
            status: flow.status.to_string(),
            external_id: flow.external_id.clone().unwrap_or_else(|| "-".to_string()),
            published: published.to_string(),
        }
    }
}

pub fn run(cmd: FlowsCommand) -> Result<()> {
    match cmd {
        FlowsCommand::List(args) => list(args),
    }
}

fn list(args: ListArgs) -> Result<()> {
    let collab = super::local_collaborators(super::home()?);
    let project = ProjectId::from(args.project);
    let flows = super::block_on(release::get_current_state(&collab, &project))?
        .with_context(|| format!("failed to list flows of '{project}'"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&flows)?);
        return Ok(());
    }

    if flows.is_empty() {
        println!("{}", format!("No flows in '{project}'.").dimmed());
        return Ok(());
    }

    let rows: Vec<FlowRow> = flows.iter().map(FlowRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
