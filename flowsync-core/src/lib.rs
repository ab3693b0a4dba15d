//! flowsync core library — domain types, identity mapping, local store.
//!
//! - [`types`] — newtypes, flow snapshots, project and file records
//! - [`operation`] — [`ProjectOperation`]
//! - [`mapping`] — [`ProjectMappingState`]
//! - [`store`] — file-backed persistence under `~/.flowsync/`
//! - [`error`] — [`StoreError`]

pub mod error;
pub mod mapping;
pub mod operation;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use mapping::ProjectMappingState;
pub use operation::{OperationKind, ProjectOperation};
pub use types::{
    FileCompression, FileId, FileRecord, FileType, FlowDraft, FlowId, FlowState, FlowStatus,
    FlowVersion, Project, ProjectId,
};
