//! Error types for flowsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored document could not be decoded.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or FLOWSYNC_HOME")]
    HomeNotFound,

    #[error("project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("flow {flow_id} not found in project {project_id}")]
    FlowNotFound { project_id: String, flow_id: String },

    #[error("file {file_id} not found in project {project_id}")]
    FileNotFound { project_id: String, file_id: String },

    /// Id that cannot be used as a path segment.
    #[error("invalid identifier '{id}'")]
    InvalidId { id: String },

    /// Another apply holds the project lock. `holder` is the pid recorded in
    /// the lock file, if readable.
    #[error(
        "project is locked by another apply (pid {}); if no apply is running, delete {}",
        .holder.as_deref().unwrap_or("unknown"),
        .path.display()
    )]
    Locked {
        path: PathBuf,
        holder: Option<String>,
    },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
