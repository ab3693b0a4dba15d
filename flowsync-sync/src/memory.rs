//! In-memory collaborators, for tests and embedding.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use flowsync_core::{
    FileId, FileRecord, FileType, FlowDraft, FlowId, FlowState, Project, ProjectId,
    ProjectMappingState, StoreError,
};

use crate::error::PublishError;
use crate::ports::{FileStore, FlowPublisher, FlowRepository, ProjectRepository};

#[derive(Default)]
struct MemoryState {
    projects: BTreeMap<ProjectId, Project>,
    /// Flows per project in insertion order.
    flows: BTreeMap<ProjectId, Vec<FlowState>>,
    files: HashMap<(ProjectId, FileId), FileRecord>,
}

impl MemoryState {
    fn project_flows(&mut self, project: &ProjectId) -> Result<&mut Vec<FlowState>, StoreError> {
        if !self.projects.contains_key(project) {
            return Err(project_not_found(project));
        }
        Ok(self.flows.entry(project.clone()).or_default())
    }
}

/// Projects, flows and files held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project, replacing any previous record with the same id.
    pub async fn insert_project(&self, project: Project) {
        let mut state = self.state.write().await;
        state.flows.entry(project.id.clone()).or_default();
        state.projects.insert(project.id.clone(), project);
    }

    /// Insert a flow as-is, keeping its id. The project must exist.
    pub async fn insert_flow(&self, flow: FlowState) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let flows = state.project_flows(&flow.project_id)?;
        flows.retain(|f| f.id != flow.id);
        flows.push(flow);
        Ok(())
    }

    /// Number of flows in `project`.
    pub async fn flow_count(&self, project: &ProjectId) -> usize {
        let state = self.state.read().await;
        state.flows.get(project).map_or(0, Vec::len)
    }
}

#[async_trait]
impl FlowRepository for InMemoryStore {
    async fn list(&self, project: &ProjectId) -> Result<Vec<FlowState>, StoreError> {
        let state = self.state.read().await;
        if !state.projects.contains_key(project) {
            return Err(project_not_found(project));
        }
        Ok(state.flows.get(project).cloned().unwrap_or_default())
    }

    async fn get(
        &self,
        project: &ProjectId,
        flow: &FlowId,
    ) -> Result<Option<FlowState>, StoreError> {
        let state = self.state.read().await;
        if !state.projects.contains_key(project) {
            return Err(project_not_found(project));
        }
        Ok(state
            .flows
            .get(project)
            .and_then(|flows| flows.iter().find(|f| &f.id == flow))
            .cloned())
    }

    async fn create(&self, project: &ProjectId, draft: FlowDraft) -> Result<FlowState, StoreError> {
        let mut state = self.state.write().await;
        let flows = state.project_flows(project)?;
        let flow = draft.into_new_flow(project.clone(), Utc::now());
        flows.push(flow.clone());
        Ok(flow)
    }

    async fn update(
        &self,
        project: &ProjectId,
        flow: &FlowId,
        draft: FlowDraft,
    ) -> Result<FlowState, StoreError> {
        let mut state = self.state.write().await;
        let flows = state.project_flows(project)?;
        let Some(slot) = flows.iter_mut().find(|f| &f.id == flow) else {
            return Err(StoreError::FlowNotFound {
                project_id: project.0.clone(),
                flow_id: flow.0.clone(),
            });
        };
        *slot = draft.apply_to(slot, Utc::now());
        Ok(slot.clone())
    }

    async fn delete(&self, project: &ProjectId, flow: &FlowId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let flows = state.project_flows(project)?;
        let before = flows.len();
        flows.retain(|f| &f.id != flow);
        Ok(flows.len() != before)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn get(&self, project: &ProjectId) -> Result<Project, StoreError> {
        let state = self.state.read().await;
        state
            .projects
            .get(project)
            .cloned()
            .ok_or_else(|| project_not_found(project))
    }

    async fn update_mapping(
        &self,
        project: &ProjectId,
        mapping: ProjectMappingState,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .projects
            .get_mut(project)
            .ok_or_else(|| project_not_found(project))?;
        record.mapping = Some(mapping);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl FileStore for InMemoryStore {
    async fn save(&self, file: FileRecord) -> Result<FileId, StoreError> {
        let mut state = self.state.write().await;
        if !state.projects.contains_key(&file.project_id) {
            return Err(project_not_found(&file.project_id));
        }
        let id = file.id.clone();
        state.files.insert((file.project_id.clone(), id.clone()), file);
        Ok(id)
    }

    async fn get(
        &self,
        project: &ProjectId,
        file: &FileId,
        file_type: FileType,
    ) -> Result<FileRecord, StoreError> {
        let state = self.state.read().await;
        state
            .files
            .get(&(project.clone(), file.clone()))
            .filter(|record| record.file_type == file_type)
            .cloned()
            .ok_or_else(|| StoreError::FileNotFound {
                project_id: project.0.clone(),
                file_id: file.0.clone(),
            })
    }
}

/// Publisher that records every publish and fails for chosen flows.
#[derive(Default)]
pub struct RecordingPublisher {
    failing: BTreeSet<FlowId>,
    published: RwLock<Vec<FlowId>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that rejects every flow in `ids`.
    pub fn failing_for(ids: impl IntoIterator<Item = FlowId>) -> Self {
        Self {
            failing: ids.into_iter().collect(),
            published: RwLock::default(),
        }
    }

    /// Flows successfully published so far, in completion order.
    pub async fn published(&self) -> Vec<FlowId> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl FlowPublisher for RecordingPublisher {
    async fn publish(&self, _project: &ProjectId, flow: &FlowId) -> Result<(), PublishError> {
        if self.failing.contains(flow) {
            return Err(PublishError::Rejected(format!("publishing {flow} is disabled")));
        }
        self.published.write().await.push(flow.clone());
        Ok(())
    }
}

fn project_not_found(project: &ProjectId) -> StoreError {
    StoreError::ProjectNotFound {
        id: project.0.clone(),
    }
}
