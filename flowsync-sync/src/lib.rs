//! # flowsync-sync
//!
//! Reconciliation of a target project against a batch of flow operations.
//!
//! Call [`apply`] to run a batch of [`ProjectOperation`](flowsync_core::ProjectOperation)s
//! against a project, [`release::save`] / [`release::get_new_state`] to export
//! and import project state, and [`release::get_mapping_state`] to seed an
//! identity mapping between two projects.
//!
//! The engine only talks to the traits in [`ports`]; [`memory`] and [`local`]
//! provide implementations.

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod local;
pub mod memory;
pub mod ports;
pub mod release;
pub mod scheduler;

pub use engine::{apply, is_selected, ApplyRequest, ApplyResponse};
pub use error::{ProjectSyncError, PublishError, SyncError};
pub use local::{LocalPublisher, LocalStore};
pub use memory::{InMemoryStore, RecordingPublisher};
pub use ports::{Collaborators, FileStore, FlowPublisher, FlowRepository, ProjectRepository};
pub use scheduler::PublishScheduler;
