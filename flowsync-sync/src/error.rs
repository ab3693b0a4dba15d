//! Error types for flowsync-sync.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowsync_core::{FlowId, StoreError};

/// Errors that abort a sync call.
///
/// Lifecycle failures (create/update/delete) surface as one of these and stop
/// the batch. Publish failures never do; see [`ProjectSyncError`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// A referenced mapping entry or entity is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A read or write against a store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A persisted release artifact could not be decoded.
    #[error("failed to decode release {file_id}: {source}")]
    Decode {
        file_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Typed failure returned by a [`FlowPublisher`](crate::ports::FlowPublisher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("flow {flow_id} does not exist")]
    FlowMissing { flow_id: String },

    #[error("flow version {version_id} is not valid")]
    InvalidVersion { version_id: String },

    #[error("publish rejected: {0}")]
    Rejected(String),

    #[error("store error during publish: {0}")]
    Store(String),
}

impl From<StoreError> for PublishError {
    fn from(err: StoreError) -> Self {
        PublishError::Store(err.to_string())
    }
}

/// One flow's post-apply side-effect failure, returned as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSyncError {
    pub flow_id: FlowId,
    pub message: String,
}

impl ProjectSyncError {
    pub fn new(flow_id: FlowId, message: impl Into<String>) -> Self {
        Self {
            flow_id,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProjectSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.flow_id, self.message)
    }
}

/// Map a store miss on a flow into [`SyncError::NotFound`]; everything else
/// is a persistence failure.
pub(crate) fn flow_store_err(err: StoreError) -> SyncError {
    match err {
        StoreError::FlowNotFound { flow_id, .. } => SyncError::NotFound {
            entity: "flow",
            id: flow_id,
        },
        other => SyncError::Persistence(other),
    }
}
