//! Collaborators backed by the local file store in `flowsync_core::store`.
//!
//! Store calls are blocking filesystem I/O and run on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use flowsync_core::{
    store, FileId, FileRecord, FileType, FlowDraft, FlowId, FlowState, Project, ProjectId,
    ProjectMappingState, StoreError,
};

use crate::error::PublishError;
use crate::ports::{FileStore, FlowPublisher, FlowRepository, ProjectRepository};

/// Flow, project and file persistence rooted at one home directory.
///
/// Clones share one rewrite guard, so read-modify-write cycles on flow files
/// (updates and publishes) never interleave.
#[derive(Debug, Clone)]
pub struct LocalStore {
    home: PathBuf,
    rewrite: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            rewrite: Arc::new(Mutex::new(())),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let home = self.home.clone();
        let fallback = home.clone();
        tokio::task::spawn_blocking(move || f(&home))
            .await
            .map_err(|join_err| StoreError::Io {
                path: fallback,
                source: std::io::Error::other(join_err.to_string()),
            })?
    }

    /// Like [`blocking`](Self::blocking), holding the rewrite guard.
    async fn blocking_rewrite<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let rewrite = Arc::clone(&self.rewrite);
        self.blocking(move |home| {
            let _guard = rewrite.lock().unwrap_or_else(PoisonError::into_inner);
            f(home)
        })
        .await
    }
}

#[async_trait]
impl FlowRepository for LocalStore {
    async fn list(&self, project: &ProjectId) -> Result<Vec<FlowState>, StoreError> {
        let project = project.clone();
        self.blocking(move |home| store::list_flows_at(home, &project))
            .await
    }

    async fn get(
        &self,
        project: &ProjectId,
        flow: &FlowId,
    ) -> Result<Option<FlowState>, StoreError> {
        let (project, flow) = (project.clone(), flow.clone());
        self.blocking(move |home| store::load_flow_at(home, &project, &flow))
            .await
    }

    async fn create(&self, project: &ProjectId, draft: FlowDraft) -> Result<FlowState, StoreError> {
        let project = project.clone();
        self.blocking(move |home| {
            let flow = draft.into_new_flow(project, Utc::now());
            store::save_flow_at(home, &flow)?;
            Ok(flow)
        })
        .await
    }

    async fn update(
        &self,
        project: &ProjectId,
        flow: &FlowId,
        draft: FlowDraft,
    ) -> Result<FlowState, StoreError> {
        let (project, flow) = (project.clone(), flow.clone());
        self.blocking_rewrite(move |home| {
            let existing =
                store::load_flow_at(home, &project, &flow)?.ok_or_else(|| {
                    StoreError::FlowNotFound {
                        project_id: project.0.clone(),
                        flow_id: flow.0.clone(),
                    }
                })?;
            let updated = draft.apply_to(&existing, Utc::now());
            store::save_flow_at(home, &updated)?;
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, project: &ProjectId, flow: &FlowId) -> Result<bool, StoreError> {
        let (project, flow) = (project.clone(), flow.clone());
        self.blocking_rewrite(move |home| store::delete_flow_at(home, &project, &flow))
            .await
    }
}

#[async_trait]
impl ProjectRepository for LocalStore {
    async fn get(&self, project: &ProjectId) -> Result<Project, StoreError> {
        let project = project.clone();
        self.blocking(move |home| store::load_project_at(home, &project))
            .await
    }

    async fn update_mapping(
        &self,
        project: &ProjectId,
        mapping: ProjectMappingState,
    ) -> Result<(), StoreError> {
        let project = project.clone();
        self.blocking(move |home| store::update_mapping_at(home, &project, mapping).map(|_| ()))
            .await
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn save(&self, file: FileRecord) -> Result<FileId, StoreError> {
        self.blocking(move |home| {
            store::save_file_at(home, &file)?;
            Ok(file.id)
        })
        .await
    }

    async fn get(
        &self,
        project: &ProjectId,
        file: &FileId,
        file_type: FileType,
    ) -> Result<FileRecord, StoreError> {
        let (project, file) = (project.clone(), file.clone());
        self.blocking(move |home| {
            let record = store::load_file_at(home, &project, &file)?;
            if record.file_type != file_type {
                return Err(StoreError::FileNotFound {
                    project_id: project.0,
                    file_id: file.0,
                });
            }
            Ok(record)
        })
        .await
    }
}

/// Publishes by pinning the flow's current version as its published one.
///
/// Invalid versions are refused.
#[derive(Debug, Clone)]
pub struct LocalPublisher {
    store: LocalStore,
}

impl LocalPublisher {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FlowPublisher for LocalPublisher {
    async fn publish(&self, project: &ProjectId, flow: &FlowId) -> Result<(), PublishError> {
        let (project, flow) = (project.clone(), flow.clone());
        self.store
            .blocking_rewrite(move |home| {
                let Some(mut state) = store::load_flow_at(home, &project, &flow)? else {
                    return Ok(Err(PublishError::FlowMissing { flow_id: flow.0 }));
                };
                if !state.version.valid {
                    return Ok(Err(PublishError::InvalidVersion {
                        version_id: state.version.id,
                    }));
                }
                state.published_version_id = Some(state.version.id.clone());
                state.updated_at = Utc::now();
                store::save_flow_at(home, &state)?;
                Ok(Ok(()))
            })
            .await?
    }
}
