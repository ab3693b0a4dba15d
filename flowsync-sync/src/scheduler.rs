//! Concurrent post-apply publish jobs with a single join point.

use tokio::task::JoinHandle;

use flowsync_core::{FlowId, ProjectId};

use crate::error::ProjectSyncError;
use crate::lifecycle::republish_flow;
use crate::ports::Collaborators;

/// Spawns republish jobs as they are scheduled and collects their outcomes in
/// [`join`](Self::join).
///
/// Jobs start running immediately, concurrently with each other and with
/// whatever the caller does next. Every scheduled job is awaited exactly once.
pub struct PublishScheduler {
    collab: Collaborators,
    jobs: Vec<(FlowId, JoinHandle<Option<ProjectSyncError>>)>,
}

impl PublishScheduler {
    pub fn new(collab: Collaborators) -> Self {
        Self {
            collab,
            jobs: Vec::new(),
        }
    }

    /// Start a republish of `flow_id`. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, flow_id: FlowId, project_id: ProjectId) {
        let collab = self.collab.clone();
        let id = flow_id.clone();
        let handle = tokio::spawn(async move { republish_flow(&collab, &id, &project_id).await });
        self.jobs.push((flow_id, handle));
    }

    /// Number of scheduled jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Wait for every job and return the failures in scheduling order.
    ///
    /// A job that panicked is reported as a failure of its flow.
    pub async fn join(self) -> Vec<ProjectSyncError> {
        let mut errors = Vec::new();
        for (flow_id, handle) in self.jobs {
            match handle.await {
                Ok(None) => {}
                Ok(Some(err)) => errors.push(err),
                Err(join_err) => {
                    tracing::error!(flow_id = %flow_id, error = %join_err, "publish task aborted");
                    errors.push(ProjectSyncError::new(
                        flow_id,
                        format!("publish task aborted: {join_err}"),
                    ));
                }
            }
        }
        errors
    }
}
