//! Identity mapping between source-space and target-space flow ids.
//!
//! Persisted on the project record as
//! `{"flows": {"<sourceId>": {"targetId": "<targetId>"}}}`.
//!
//! Every mutation consumes the mapping and returns the next value, so a
//! caller always holds a complete snapshot.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{FlowId, FlowState};

/// Target side of a mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedFlow {
    pub target_id: FlowId,
}

/// Source id → target id correspondence for one project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectMappingState {
    #[serde(default)]
    flows: BTreeMap<FlowId, MappedFlow>,
}

impl ProjectMappingState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record that `source_id` now corresponds to `target_id`.
    ///
    /// Overwrites any previous target for `source_id`. A target id is held
    /// by at most one source, so any other entry pointing at `target_id` is
    /// dropped.
    pub fn map_flow(mut self, source_id: FlowId, target_id: FlowId) -> Self {
        self.flows
            .retain(|source, mapped| mapped.target_id != target_id || *source == source_id);
        self.flows.insert(source_id, MappedFlow { target_id });
        self
    }

    /// Remove the entry for `source_id`, if any.
    pub fn delete_flow(mut self, source_id: &FlowId) -> Self {
        self.flows.remove(source_id);
        self
    }

    pub fn find_target_id(&self, source_id: &FlowId) -> Option<&FlowId> {
        self.flows.get(source_id).map(|mapped| &mapped.target_id)
    }

    pub fn find_source_id(&self, target_id: &FlowId) -> Option<&FlowId> {
        self.flows
            .iter()
            .find(|(_, mapped)| &mapped.target_id == target_id)
            .map(|(source, _)| source)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Entries as `(source_id, target_id)`, ordered by source id.
    pub fn iter(&self) -> impl Iterator<Item = (&FlowId, &FlowId)> {
        self.flows
            .iter()
            .map(|(source, mapped)| (source, &mapped.target_id))
    }

    /// Layer matches between two full listings on top of this mapping.
    ///
    /// `state_one` is the target-space listing and `state_two` the
    /// source-space listing. Flows are matched on [`FlowState::stable_key`];
    /// a flow present in only one listing contributes nothing. When several
    /// source flows share a key the first one wins.
    pub fn merge(self, state_one: &[FlowState], state_two: &[FlowState]) -> Self {
        let mut by_key: HashMap<&str, &FlowState> = HashMap::with_capacity(state_two.len());
        for flow in state_two {
            by_key.entry(flow.stable_key()).or_insert(flow);
        }

        state_one.iter().fold(self, |mapping, target| {
            match by_key.get(target.stable_key()) {
                Some(source) => mapping.map_flow(source.id.clone(), target.id.clone()),
                None => mapping,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
