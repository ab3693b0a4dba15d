//! Single-flow lifecycle operations against a target project.
//!
//! Each operation touches exactly one flow. Target ids are always resolved
//! through the mapping handed in by the caller, never taken from the
//! source-space snapshot.

use flowsync_core::{FlowDraft, FlowId, FlowState, ProjectId, ProjectMappingState};

use crate::error::{flow_store_err, ProjectSyncError, SyncError};
use crate::ports::Collaborators;

/// Create a flow in `project_id` mirroring `source`.
///
/// The new flow gets a freshly generated id and inherits the source's stable
/// key as its external id.
pub async fn create_flow_in_project(
    collab: &Collaborators,
    source: &FlowState,
    project_id: &ProjectId,
) -> Result<FlowState, SyncError> {
    let created = collab
        .flows
        .create(project_id, FlowDraft::mirror(source))
        .await?;
    tracing::info!(
        project_id = %project_id,
        source_id = %source.id,
        target_id = %created.id,
        "created flow",
    );
    Ok(created)
}

/// Overwrite the target flow mapped from `old_state` with `new_state`'s
/// content.
///
/// Resolution order: the mapping entry for `old_state.id`, then the entry
/// for `new_state.id`.
pub async fn update_flow_in_project(
    collab: &Collaborators,
    mapping: &ProjectMappingState,
    old_state: &FlowState,
    new_state: &FlowState,
    project_id: &ProjectId,
) -> Result<FlowState, SyncError> {
    let target_id = mapping
        .find_target_id(&old_state.id)
        .or_else(|| mapping.find_target_id(&new_state.id))
        .ok_or_else(|| SyncError::NotFound {
            entity: "mapping for flow",
            id: old_state.id.0.clone(),
        })?;

    let updated = collab
        .flows
        .update(project_id, target_id, FlowDraft::mirror(new_state))
        .await
        .map_err(flow_store_err)?;
    tracing::info!(
        project_id = %project_id,
        source_id = %new_state.id,
        target_id = %updated.id,
        "updated flow",
    );
    Ok(updated)
}

/// Delete the target flow mapped from `source_id`.
///
/// Idempotent: an unmapped source or an already-deleted target is a no-op.
pub async fn delete_flow_from_project(
    collab: &Collaborators,
    mapping: &ProjectMappingState,
    source_id: &FlowId,
    project_id: &ProjectId,
) -> Result<(), SyncError> {
    let Some(target_id) = mapping.find_target_id(source_id) else {
        tracing::debug!(project_id = %project_id, source_id = %source_id, "delete: no mapping, nothing to do");
        return Ok(());
    };

    let removed = collab.flows.delete(project_id, target_id).await?;
    if removed {
        tracing::info!(project_id = %project_id, source_id = %source_id, target_id = %target_id, "deleted flow");
    } else {
        tracing::debug!(project_id = %project_id, target_id = %target_id, "delete: target already absent");
    }
    Ok(())
}

/// The live target flow currently mapped from `source_id`, if any.
pub async fn find_mapped_flow(
    collab: &Collaborators,
    mapping: &ProjectMappingState,
    source_id: &FlowId,
    project_id: &ProjectId,
) -> Result<Option<FlowState>, SyncError> {
    match mapping.find_target_id(source_id) {
        Some(target_id) => Ok(collab.flows.get(project_id, target_id).await?),
        None => Ok(None),
    }
}

/// Publish `flow_id` again after its definition changed.
///
/// Never fails: every problem is returned as a [`ProjectSyncError`].
pub async fn republish_flow(
    collab: &Collaborators,
    flow_id: &FlowId,
    project_id: &ProjectId,
) -> Option<ProjectSyncError> {
    match collab.flows.get(project_id, flow_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Some(ProjectSyncError::new(flow_id.clone(), "flow not found")),
        Err(err) => {
            return Some(ProjectSyncError::new(
                flow_id.clone(),
                format!("failed to load flow for publish: {err}"),
            ))
        }
    }

    match collab.publisher.publish(project_id, flow_id).await {
        Ok(()) => {
            tracing::info!(project_id = %project_id, flow_id = %flow_id, "republished flow");
            None
        }
        Err(err) => {
            tracing::warn!(project_id = %project_id, flow_id = %flow_id, error = %err, "republish failed");
            Some(ProjectSyncError::new(
                flow_id.clone(),
                format!("failed to publish flow after sync: {err}"),
            ))
        }
    }
}
