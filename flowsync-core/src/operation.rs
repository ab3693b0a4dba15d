//! Change operations handed to the reconciliation engine.
//!
//! Operations are produced by an external comparison step and arrive as an
//! ordered list, usually deserialized from a JSON plan:
//!
//! ```json
//! [{"type": "CREATE_FLOW", "state": {...}},
//!  {"type": "UPDATE_FLOW", "oldState": {...}, "newState": {...}},
//!  {"type": "DELETE_FLOW", "state": {...}}]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{FlowId, FlowState};

/// One change to apply to a target project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectOperation {
    CreateFlow {
        state: FlowState,
    },
    #[serde(rename_all = "camelCase")]
    UpdateFlow {
        old_state: FlowState,
        new_state: FlowState,
    },
    DeleteFlow {
        state: FlowState,
    },
}

impl ProjectOperation {
    /// Source-space id of the flow this operation is about. Selection filters
    /// and mapping entries are keyed by it.
    pub fn subject_id(&self) -> &FlowId {
        match self {
            ProjectOperation::CreateFlow { state } => &state.id,
            ProjectOperation::UpdateFlow { new_state, .. } => &new_state.id,
            ProjectOperation::DeleteFlow { state } => &state.id,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            ProjectOperation::CreateFlow { .. } => OperationKind::Create,
            ProjectOperation::UpdateFlow { .. } => OperationKind::Update,
            ProjectOperation::DeleteFlow { .. } => OperationKind::Delete,
        }
    }

    /// Display name of the flow as it will look after the operation.
    pub fn display_name(&self) -> &str {
        match self {
            ProjectOperation::CreateFlow { state } | ProjectOperation::DeleteFlow { state } => {
                &state.version.display_name
            }
            ProjectOperation::UpdateFlow { new_state, .. } => &new_state.version.display_name,
        }
    }
}

/// Variant tag of a [`ProjectOperation`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}
