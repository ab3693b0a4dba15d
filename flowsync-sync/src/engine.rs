//! Reconciliation engine: applies an ordered batch of [`ProjectOperation`]s
//! to a target project.
//!
//! ## `apply` protocol
//!
//! 1. Start from the caller's mapping.
//! 2. Run each selected operation in order; fold its result into the mapping
//!    and schedule a republish for enabled results.
//! 3. Persist the mapping.
//! 4. Join all publish jobs.
//!
//! A lifecycle failure stops the batch. The mapping built up to that point is
//! still persisted and already-scheduled publishes are still joined before
//! the error is returned, so a retry never re-creates flows that already
//! exist.

use std::collections::BTreeSet;

use serde::Serialize;

use flowsync_core::{FlowId, FlowState, ProjectId, ProjectMappingState, ProjectOperation};

use crate::error::{ProjectSyncError, SyncError};
use crate::lifecycle;
use crate::ports::Collaborators;
use crate::scheduler::PublishScheduler;

/// Input of [`apply`].
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub project_id: ProjectId,
    pub operations: Vec<ProjectOperation>,
    /// Mapping currently persisted for `project_id`.
    pub mapping_state: ProjectMappingState,
    /// Source-space ids to apply. `None` applies everything.
    pub selected_operations: Option<BTreeSet<FlowId>>,
}

/// Outcome of a completed [`apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyResponse {
    /// Per-flow publish failures. Never includes lifecycle failures.
    pub errors: Vec<ProjectSyncError>,
    /// The mapping that was persisted.
    pub mapping: ProjectMappingState,
    pub applied: usize,
    pub skipped: usize,
}

/// Whether `operation` passes the selection filter.
pub fn is_selected(selected: Option<&BTreeSet<FlowId>>, operation: &ProjectOperation) -> bool {
    selected.map_or(true, |ids| ids.contains(operation.subject_id()))
}

/// Apply `request.operations` to `request.project_id`.
pub async fn apply(
    collab: &Collaborators,
    request: ApplyRequest,
) -> Result<ApplyResponse, SyncError> {
    let ApplyRequest {
        project_id,
        operations,
        mapping_state,
        selected_operations,
    } = request;

    tracing::info!(
        project_id = %project_id,
        operations = operations.len(),
        selected = ?selected_operations.as_ref().map(BTreeSet::len),
        "applying project operations",
    );

    let mut mapping = mapping_state;
    let mut scheduler = PublishScheduler::new(collab.clone());
    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut failure = None;

    for (index, operation) in operations.iter().enumerate() {
        if !is_selected(selected_operations.as_ref(), operation) {
            tracing::debug!(
                index,
                kind = %operation.kind(),
                source_id = %operation.subject_id(),
                "skipped: not selected",
            );
            skipped += 1;
            continue;
        }

        match apply_operation(collab, &project_id, operation, &mapping, &mut scheduler).await {
            Ok(next) => {
                mapping = next;
                applied += 1;
            }
            Err(err) => {
                tracing::error!(
                    index,
                    kind = %operation.kind(),
                    source_id = %operation.subject_id(),
                    error = %err,
                    "operation failed; aborting remaining batch",
                );
                failure = Some(err);
                break;
            }
        }
    }

    let persisted = collab
        .projects
        .update_mapping(&project_id, mapping.clone())
        .await;
    match &persisted {
        Ok(()) => tracing::info!(project_id = %project_id, entries = mapping.len(), "persisted mapping"),
        Err(err) => tracing::error!(project_id = %project_id, error = %err, "failed to persist mapping"),
    }

    let pending = scheduler.len();
    let errors = scheduler.join().await;
    tracing::info!(
        project_id = %project_id,
        published = pending - errors.len(),
        failed = errors.len(),
        "publish jobs settled",
    );

    if let Some(err) = failure {
        return Err(err);
    }
    persisted?;

    Ok(ApplyResponse {
        errors,
        mapping,
        applied,
        skipped,
    })
}

/// Run one operation and return the mapping that reflects it.
async fn apply_operation(
    collab: &Collaborators,
    project_id: &ProjectId,
    operation: &ProjectOperation,
    mapping: &ProjectMappingState,
    scheduler: &mut PublishScheduler,
) -> Result<ProjectMappingState, SyncError> {
    match operation {
        ProjectOperation::CreateFlow { state } => {
            // A create that already ran in an earlier, interrupted cycle is
            // applied as an update of the flow it produced.
            let existing =
                lifecycle::find_mapped_flow(collab, mapping, &state.id, project_id).await?;
            let flow = match existing {
                Some(_) => {
                    tracing::info!(source_id = %state.id, "create: already mapped, updating instead");
                    lifecycle::update_flow_in_project(collab, mapping, state, state, project_id)
                        .await?
                }
                None => lifecycle::create_flow_in_project(collab, state, project_id).await?,
            };
            schedule_if_enabled(scheduler, &flow, project_id);
            Ok(mapping.clone().map_flow(state.id.clone(), flow.id))
        }
        ProjectOperation::UpdateFlow {
            old_state,
            new_state,
        } => {
            let flow = lifecycle::update_flow_in_project(
                collab, mapping, old_state, new_state, project_id,
            )
            .await?;
            schedule_if_enabled(scheduler, &flow, project_id);
            let mut next = mapping.clone();
            if old_state.id != new_state.id {
                next = next.delete_flow(&old_state.id);
            }
            Ok(next.map_flow(new_state.id.clone(), flow.id))
        }
        ProjectOperation::DeleteFlow { state } => {
            lifecycle::delete_flow_from_project(collab, mapping, &state.id, project_id).await?;
            Ok(mapping.clone().delete_flow(&state.id))
        }
    }
}

fn schedule_if_enabled(scheduler: &mut PublishScheduler, flow: &FlowState, project_id: &ProjectId) {
    if flow.is_enabled() {
        scheduler.schedule(flow.id.clone(), project_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowsync_core::{FlowStatus, FlowVersion};
    use serde_json::json;

    fn flow(id: &str) -> FlowState {
        let now = Utc::now();
        FlowState {
            id: FlowId::from(id),
            project_id: ProjectId::from("src"),
            external_id: None,
            status: FlowStatus::Disabled,
            folder_id: None,
            published_version_id: None,
            version: FlowVersion {
                id: "v".to_string(),
                display_name: id.to_string(),
                trigger: json!({}),
                schema_version: None,
                valid: true,
                updated_at: now,
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_selection_selects_everything() {
        let op = ProjectOperation::DeleteFlow { state: flow("a") };
        assert!(is_selected(None, &op));
    }

    #[test]
    fn selection_uses_source_subject_for_every_variant() {
        let selected: BTreeSet<FlowId> = [FlowId::from("keep")].into_iter().collect();
        let ops = [
            ProjectOperation::CreateFlow { state: flow("keep") },
            ProjectOperation::UpdateFlow {
                old_state: flow("other"),
                new_state: flow("keep"),
            },
            ProjectOperation::DeleteFlow { state: flow("keep") },
        ];
        assert!(ops.iter().all(|op| is_selected(Some(&selected), op)));

        let dropped = ProjectOperation::DeleteFlow { state: flow("drop") };
        assert!(!is_selected(Some(&selected), &dropped));
    }
}
