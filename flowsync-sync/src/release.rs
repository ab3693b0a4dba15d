//! Project state export/import.
//!
//! A release is the project's flow listing encoded as a JSON array and
//! stored uncompressed as a [`FileType::ProjectRelease`] file named
//! `<name>.json`.

use chrono::Utc;

use flowsync_core::{
    FileCompression, FileId, FileRecord, FileType, FlowState, ProjectId, ProjectMappingState,
};

use crate::error::SyncError;
use crate::ports::Collaborators;

/// Encode a flow listing into the release payload.
pub fn encode_state(state: &[FlowState]) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(state).map_err(|e| SyncError::Persistence(e.into()))
}

/// Decode a release payload back into its flow listing.
pub fn decode_state(file_id: &FileId, data: &[u8]) -> Result<Vec<FlowState>, SyncError> {
    serde_json::from_slice(data).map_err(|source| SyncError::Decode {
        file_id: file_id.0.clone(),
        source,
    })
}

/// Every flow currently in `project_id`.
pub async fn get_current_state(
    collab: &Collaborators,
    project_id: &ProjectId,
) -> Result<Vec<FlowState>, SyncError> {
    let flows = collab.flows.list(project_id).await?;
    tracing::debug!(project_id = %project_id, flows = flows.len(), "loaded current state");
    Ok(flows)
}

/// Snapshot the current state of `project_id` as a release named `name`.
pub async fn save(
    collab: &Collaborators,
    project_id: &ProjectId,
    name: &str,
) -> Result<FileId, SyncError> {
    let state = get_current_state(collab, project_id).await?;
    let data = encode_state(&state)?;

    let file = FileRecord {
        id: FileId::generate(),
        project_id: project_id.clone(),
        file_type: FileType::ProjectRelease,
        file_name: format!("{name}.json"),
        size: data.len(),
        compression: FileCompression::None,
        data,
        created_at: Utc::now(),
    };
    let file_id = collab.files.save(file).await?;
    tracing::info!(
        project_id = %project_id,
        file_id = %file_id,
        flows = state.len(),
        "saved release",
    );
    Ok(file_id)
}

/// Load the flow listing stored in release `file_id`.
pub async fn get_new_state(
    collab: &Collaborators,
    project_id: &ProjectId,
    file_id: &FileId,
) -> Result<Vec<FlowState>, SyncError> {
    let file = collab
        .files
        .get(project_id, file_id, FileType::ProjectRelease)
        .await?;
    decode_state(file_id, &file.data)
}

/// Seed a mapping for `project_id` by matching `state_one` (target space)
/// against `state_two` (source space), on top of the persisted mapping.
///
/// The result is returned, not persisted; it is the mapping to hand to the
/// next [`apply`](crate::engine::apply).
pub async fn get_mapping_state(
    collab: &Collaborators,
    project_id: &ProjectId,
    state_one: &[FlowState],
    state_two: &[FlowState],
) -> Result<ProjectMappingState, SyncError> {
    let project = collab.projects.get(project_id).await?;
    let mapping = project.mapping_or_empty().merge(state_one, state_two);
    tracing::debug!(project_id = %project_id, entries = mapping.len(), "merged mapping state");
    Ok(mapping)
}
