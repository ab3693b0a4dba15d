//! Collaborator seams: the stores and the publisher the engine drives.
//!
//! Implementations live in [`crate::memory`] and [`crate::local`]. All of
//! them are shared across spawned publish tasks, hence `Send + Sync` and
//! [`Arc`].

use std::sync::Arc;

use async_trait::async_trait;

use flowsync_core::{
    FileId, FileRecord, FileType, FlowDraft, FlowId, FlowState, Project, ProjectId,
    ProjectMappingState, StoreError,
};

use crate::error::PublishError;

/// Flow persistence for target projects.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Every flow of `project`, fully populated.
    async fn list(&self, project: &ProjectId) -> Result<Vec<FlowState>, StoreError>;

    async fn get(&self, project: &ProjectId, flow: &FlowId)
        -> Result<Option<FlowState>, StoreError>;

    /// Create a flow with a freshly generated id.
    async fn create(&self, project: &ProjectId, draft: FlowDraft)
        -> Result<FlowState, StoreError>;

    /// Overwrite the content of an existing flow.
    ///
    /// Fails with [`StoreError::FlowNotFound`] if `flow` does not exist.
    async fn update(
        &self,
        project: &ProjectId,
        flow: &FlowId,
        draft: FlowDraft,
    ) -> Result<FlowState, StoreError>;

    /// Returns `false` when the flow was already gone.
    async fn delete(&self, project: &ProjectId, flow: &FlowId) -> Result<bool, StoreError>;
}

/// Project metadata persistence, including the identity mapping.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn get(&self, project: &ProjectId) -> Result<Project, StoreError>;

    /// Replace the project's mapping wholesale.
    async fn update_mapping(
        &self,
        project: &ProjectId,
        mapping: ProjectMappingState,
    ) -> Result<(), StoreError>;
}

/// Deploys a flow so its live trigger bindings match its current version.
#[async_trait]
pub trait FlowPublisher: Send + Sync {
    async fn publish(&self, project: &ProjectId, flow: &FlowId) -> Result<(), PublishError>;
}

/// Opaque named artifacts (release files).
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, file: FileRecord) -> Result<FileId, StoreError>;

    /// Fails with [`StoreError::FileNotFound`] when the file is missing or is
    /// not of `file_type`.
    async fn get(
        &self,
        project: &ProjectId,
        file: &FileId,
        file_type: FileType,
    ) -> Result<FileRecord, StoreError>;
}

/// Everything a sync call needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct Collaborators {
    pub flows: Arc<dyn FlowRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub files: Arc<dyn FileStore>,
    pub publisher: Arc<dyn FlowPublisher>,
}

impl Collaborators {
    /// Wire a single store that implements every persistence seam.
    pub fn from_store<S>(store: Arc<S>, publisher: Arc<dyn FlowPublisher>) -> Self
    where
        S: FlowRepository + ProjectRepository + FileStore + 'static,
    {
        Self {
            flows: store.clone(),
            projects: store.clone(),
            files: store,
            publisher,
        }
    }
}
