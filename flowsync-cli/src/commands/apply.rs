//! `flowsync apply` — run an operation plan against a project.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use flowsync_core::{store, FlowId, ProjectId, ProjectOperation};
use flowsync_sync::{apply, is_selected, ApplyRequest, ApplyResponse};

/// Arguments for `flowsync apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Target project.
    pub project: String,

    /// JSON file holding the ordered list of operations.
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Only apply operations about these source flow ids. Repeatable.
    #[arg(long = "select", value_name = "FLOW_ID")]
    pub select: Vec<String>,

    /// Show which operations would run without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the apply result as JSON.
    #[arg(long, conflicts_with = "dry_run")]
    pub json: bool,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let project_id = ProjectId::from(self.project.clone());
        let operations = load_plan(&self.plan)?;
        let selected = (!self.select.is_empty())
            .then(|| self.select.iter().cloned().map(FlowId::from).collect::<BTreeSet<_>>());

        if self.dry_run {
            store::load_project_at(&home, &project_id)
                .with_context(|| format!("failed to load project '{project_id}'"))?;
            print_dry_run(&project_id, &operations, selected.as_ref());
            return Ok(());
        }

        // The mapping must be read under the lock, or a concurrent apply's
        // entries are overwritten.
        let lock = store::lock_project_at(&home, &project_id)
            .with_context(|| format!("cannot apply to '{project_id}'"))?;
        tracing::debug!(path = %lock.path().display(), "acquired apply lock");
        let project = store::load_project_at(&home, &project_id)
            .with_context(|| format!("failed to load project '{project_id}'"))?;

        let collab = super::local_collaborators(home);
        let request = ApplyRequest {
            project_id: project_id.clone(),
            operations,
            mapping_state: project.mapping_or_empty(),
            selected_operations: selected,
        };
        let response = super::block_on(apply(&collab, request))?
            .with_context(|| format!("apply to '{project_id}' failed"))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }
        print_response(&project_id, &response);
        Ok(())
    }
}

fn load_plan(path: &Path) -> Result<Vec<ProjectOperation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read plan '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid plan '{}'", path.display()))
}

fn print_dry_run(
    project_id: &ProjectId,
    operations: &[ProjectOperation],
    selected: Option<&BTreeSet<FlowId>>,
) {
    let mut would_apply = 0usize;
    for op in operations {
        let line = format!(
            "{} '{}' ({})",
            op.kind(),
            op.display_name(),
            op.subject_id()
        );
        if is_selected(selected, op) {
            would_apply += 1;
            println!("[dry-run]   {line}");
        } else {
            println!("[dry-run]   {}", format!("skip {line}").dimmed());
        }
    }
    println!(
        "[dry-run] ✓ '{project_id}': {would_apply} to apply, {} skipped",
        operations.len() - would_apply
    );
}

fn print_response(project_id: &ProjectId, response: &ApplyResponse) {
    println!(
        "✓ '{project_id}': {} applied, {} skipped, {} mapped flows",
        response.applied,
        response.skipped,
        response.mapping.len()
    );
    if response.errors.is_empty() {
        return;
    }
    println!(
        "{}",
        format!("{} flows failed to publish:", response.errors.len()).yellow()
    );
    for err in &response.errors {
        println!("  {} {}", "✗".red(), err);
    }
}
