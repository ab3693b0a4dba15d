//! Domain types for flowsync.
//!
//! Flows are stored as [`FlowState`] snapshots. All types are serializable via
//! serde; JSON field names follow the camelCase layout of exported releases.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mapping::ProjectMappingState;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifier of a project owning flows.
    ProjectId
);

string_id!(
    /// Identifier of a flow. Source-space and target-space ids share this type;
    /// which space an id belongs to is determined by where it came from.
    FlowId
);

string_id!(
    /// Identifier of a stored file (release artifact).
    FileId
);

impl FlowId {
    /// Generate a fresh target-space identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl FileId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a flow's triggers are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Enabled,
    #[default]
    Disabled,
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStatus::Enabled => write!(f, "enabled"),
            FlowStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Kind of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    ProjectRelease,
}

/// Compression applied to a stored file payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCompression {
    #[default]
    None,
}

// ---------------------------------------------------------------------------
// Flow snapshots
// ---------------------------------------------------------------------------

/// Definition body of a flow: its trigger tree (steps hang off the trigger)
/// and display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowVersion {
    pub id: String,
    pub display_name: String,
    pub trigger: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub valid: bool,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a single flow at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub id: FlowId,
    pub project_id: ProjectId,
    /// Identity that survives id regeneration across projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub status: FlowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version_id: Option<String>,
    pub version: FlowVersion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowState {
    /// Stable content key used to match the same logical flow across
    /// identifier spaces: `external_id` when present, the id otherwise.
    pub fn stable_key(&self) -> &str {
        self.external_id.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn is_enabled(&self) -> bool {
        self.status == FlowStatus::Enabled
    }
}

/// Content written into a target project when creating or updating a flow.
///
/// Ids and timestamps are owned by the store; a draft only carries content.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDraft {
    pub external_id: Option<String>,
    pub status: FlowStatus,
    pub folder_id: Option<String>,
    pub display_name: String,
    pub trigger: serde_json::Value,
    pub schema_version: Option<String>,
    pub valid: bool,
}

impl FlowDraft {
    /// Mirror the content of `source`, carrying its stable key over as the
    /// external id.
    pub fn mirror(source: &FlowState) -> Self {
        Self {
            external_id: Some(source.stable_key().to_owned()),
            status: source.status,
            folder_id: source.folder_id.clone(),
            display_name: source.version.display_name.clone(),
            trigger: source.version.trigger.clone(),
            schema_version: source.version.schema_version.clone(),
            valid: source.version.valid,
        }
    }

    /// Materialize the draft as a new flow with a generated id.
    pub fn into_new_flow(self, project_id: ProjectId, now: DateTime<Utc>) -> FlowState {
        FlowState {
            id: FlowId::generate(),
            project_id,
            external_id: self.external_id,
            status: self.status,
            folder_id: self.folder_id,
            published_version_id: None,
            version: FlowVersion {
                id: Uuid::new_v4().to_string(),
                display_name: self.display_name,
                trigger: self.trigger,
                schema_version: self.schema_version,
                valid: self.valid,
                updated_at: now,
            },
            created_at: now,
            updated_at: now,
        }
    }

    /// Produce the next snapshot of `existing` carrying this draft's content.
    ///
    /// The id, project and creation time are kept; the version gets a new id.
    pub fn apply_to(self, existing: &FlowState, now: DateTime<Utc>) -> FlowState {
        FlowState {
            id: existing.id.clone(),
            project_id: existing.project_id.clone(),
            external_id: self.external_id.or_else(|| existing.external_id.clone()),
            status: self.status,
            folder_id: self.folder_id,
            published_version_id: existing.published_version_id.clone(),
            version: FlowVersion {
                id: Uuid::new_v4().to_string(),
                display_name: self.display_name,
                trigger: self.trigger,
                schema_version: self.schema_version,
                valid: self.valid,
                updated_at: now,
            },
            created_at: existing.created_at,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Project and file records
// ---------------------------------------------------------------------------

/// A project record. Owns the persisted identity mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<ProjectMappingState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: ProjectId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            mapping: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The persisted mapping, or an empty one if none was ever stored.
    pub fn mapping_or_empty(&self) -> ProjectMappingState {
        self.mapping.clone().unwrap_or_default()
    }
}

/// A stored file. `data` holds the raw payload; metadata fields describe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub project_id: ProjectId,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub file_name: String,
    pub size: usize,
    pub compression: FileCompression,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
