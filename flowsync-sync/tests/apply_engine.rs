//! End-to-end behaviour of `apply` against the in-memory collaborators.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flowsync_core::{
    FlowId, FlowState, FlowStatus, FlowVersion, Project, ProjectId, ProjectMappingState,
    ProjectOperation, StoreError,
};
use flowsync_sync::{
    apply, ApplyRequest, Collaborators, FlowPublisher, FlowRepository, InMemoryStore,
    ProjectRepository, PublishError, RecordingPublisher, SyncError,
};
use rstest::rstest;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;

fn target() -> ProjectId {
    ProjectId::from("prod")
}

fn source_flow(id: &str, status: FlowStatus) -> FlowState {
    let now = Utc::now();
    FlowState {
        id: FlowId::from(id),
        project_id: ProjectId::from("dev"),
        external_id: None,
        status,
        folder_id: None,
        published_version_id: None,
        version: FlowVersion {
            id: format!("{id}-v1"),
            display_name: format!("Flow {id}"),
            trigger: json!({"type": "WEBHOOK", "nextAction": {"name": "step_1"}}),
            schema_version: Some("1".to_string()),
            valid: true,
            updated_at: now,
        },
        created_at: now,
        updated_at: now,
    }
}

fn target_flow(id: &str, status: FlowStatus) -> FlowState {
    FlowState {
        project_id: target(),
        ..source_flow(id, status)
    }
}

fn create(state: FlowState) -> ProjectOperation {
    ProjectOperation::CreateFlow { state }
}

fn update(old_state: FlowState, new_state: FlowState) -> ProjectOperation {
    ProjectOperation::UpdateFlow {
        old_state,
        new_state,
    }
}

fn delete(state: FlowState) -> ProjectOperation {
    ProjectOperation::DeleteFlow { state }
}

fn request(operations: Vec<ProjectOperation>, mapping: ProjectMappingState) -> ApplyRequest {
    ApplyRequest {
        project_id: target(),
        operations,
        mapping_state: mapping,
        selected_operations: None,
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    publisher: Arc<RecordingPublisher>,
    collab: Collaborators,
}

async fn harness_with(publisher: RecordingPublisher) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_project(Project::new(target(), "Production"))
        .await;
    let publisher = Arc::new(publisher);
    let collab = Collaborators::from_store(store.clone(), publisher.clone());
    Harness {
        store,
        publisher,
        collab,
    }
}

async fn harness() -> Harness {
    harness_with(RecordingPublisher::new()).await
}

async fn persisted_mapping(h: &Harness) -> ProjectMappingState {
    ProjectRepository::get(h.store.as_ref(), &target())
        .await
        .expect("project")
        .mapping_or_empty()
}

// ---------------------------------------------------------------------------
// 1. Basic operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_batch_persists_and_returns_input_mapping() {
    let h = harness().await;
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));

    let response = apply(&h.collab, request(vec![], mapping.clone()))
        .await
        .expect("apply");

    assert!(response.errors.is_empty());
    assert_eq!(response.mapping, mapping);
    assert_eq!(response.applied, 0);
    assert_eq!(persisted_mapping(&h).await, mapping);
}

#[tokio::test]
async fn create_maps_source_to_fresh_target_id() {
    let h = harness().await;

    let response = apply(
        &h.collab,
        request(
            vec![create(source_flow("a", FlowStatus::Disabled))],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect("apply");

    let target_id = response
        .mapping
        .find_target_id(&FlowId::from("a"))
        .expect("mapped")
        .clone();
    assert_ne!(target_id, FlowId::from("a"));

    let created = FlowRepository::get(h.store.as_ref(), &target(), &target_id)
        .await
        .expect("get")
        .expect("created flow exists");
    assert_eq!(created.external_id.as_deref(), Some("a"));
    assert_eq!(created.version.display_name, "Flow a");
    assert_eq!(persisted_mapping(&h).await, response.mapping);
}

#[tokio::test]
async fn update_targets_mapped_flow() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-a", FlowStatus::Disabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));

    let old = source_flow("a", FlowStatus::Disabled);
    let mut new = old.clone();
    new.version.display_name = "Renamed".to_string();

    let response = apply(&h.collab, request(vec![update(old, new)], mapping.clone()))
        .await
        .expect("apply");

    assert_eq!(response.mapping, mapping);
    let flow = FlowRepository::get(h.store.as_ref(), &target(), &FlowId::from("t-a"))
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(flow.version.display_name, "Renamed");
    assert_eq!(h.store.flow_count(&target()).await, 1);
}

#[tokio::test]
async fn update_without_mapping_is_not_found() {
    let h = harness().await;
    let old = source_flow("ghost", FlowStatus::Disabled);

    let err = apply(
        &h.collab,
        request(vec![update(old.clone(), old)], ProjectMappingState::empty()),
    )
    .await
    .expect_err("unmapped update must fail");

    assert!(matches!(err, SyncError::NotFound { ref id, .. } if id == "ghost"));
}

#[tokio::test]
async fn delete_removes_flow_and_entry() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-a", FlowStatus::Enabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));

    let response = apply(
        &h.collab,
        request(vec![delete(source_flow("a", FlowStatus::Enabled))], mapping),
    )
    .await
    .expect("apply");

    assert!(response.mapping.is_empty());
    assert_eq!(h.store.flow_count(&target()).await, 0);
    assert!(h.publisher.published().await.is_empty());
}

#[tokio::test]
async fn delete_of_unmapped_source_is_noop() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-b", FlowStatus::Disabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("b"), FlowId::from("t-b"));

    let response = apply(
        &h.collab,
        request(
            vec![delete(source_flow("zzz", FlowStatus::Disabled))],
            mapping.clone(),
        ),
    )
    .await
    .expect("apply");

    assert_eq!(response.mapping, mapping);
    assert_eq!(h.store.flow_count(&target()).await, 1);
}

// ---------------------------------------------------------------------------
// 2. Ordering and idempotency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_update_in_one_batch_hits_created_flow() {
    let h = harness().await;
    let a = source_flow("a", FlowStatus::Disabled);
    let mut a2 = a.clone();
    a2.version.display_name = "Second revision".to_string();

    let response = apply(
        &h.collab,
        request(
            vec![create(a.clone()), update(a, a2)],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect("apply");

    assert_eq!(response.applied, 2);
    assert_eq!(h.store.flow_count(&target()).await, 1);
    let target_id = response
        .mapping
        .find_target_id(&FlowId::from("a"))
        .expect("mapped");
    let flow = FlowRepository::get(h.store.as_ref(), &target(), target_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(flow.version.display_name, "Second revision");
}

#[tokio::test]
async fn replaying_create_does_not_duplicate() {
    let h = harness().await;
    let op = create(source_flow("a", FlowStatus::Disabled));

    let first = apply(
        &h.collab,
        request(vec![op.clone()], ProjectMappingState::empty()),
    )
    .await
    .expect("first apply");
    let second = apply(&h.collab, request(vec![op], first.mapping.clone()))
        .await
        .expect("second apply");

    assert_eq!(h.store.flow_count(&target()).await, 1);
    assert_eq!(first.mapping, second.mapping);
}

#[tokio::test]
async fn update_with_changed_source_id_rekeys_mapping() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-a", FlowStatus::Disabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));

    let response = apply(
        &h.collab,
        request(
            vec![update(
                source_flow("a", FlowStatus::Disabled),
                source_flow("a2", FlowStatus::Disabled),
            )],
            mapping,
        ),
    )
    .await
    .expect("apply");

    assert!(response.mapping.find_target_id(&FlowId::from("a")).is_none());
    assert_eq!(
        response.mapping.find_target_id(&FlowId::from("a2")),
        Some(&FlowId::from("t-a"))
    );
}

// ---------------------------------------------------------------------------
// 3. Selection
// ---------------------------------------------------------------------------

#[rstest]
#[case::none_selects_all(None, 2, 0)]
#[case::only_b(Some(vec!["b"]), 1, 1)]
#[case::empty_selection(Some(vec![]), 0, 2)]
#[tokio::test]
async fn selection_filters_by_source_id(
    #[case] selected: Option<Vec<&'static str>>,
    #[case] applied: usize,
    #[case] skipped: usize,
) {
    let h = harness().await;
    let mut req = request(
        vec![
            create(source_flow("a", FlowStatus::Disabled)),
            create(source_flow("b", FlowStatus::Disabled)),
        ],
        ProjectMappingState::empty(),
    );
    req.selected_operations =
        selected.map(|ids| ids.into_iter().map(FlowId::from).collect::<BTreeSet<_>>());

    let response = apply(&h.collab, req).await.expect("apply");

    assert_eq!(response.applied, applied);
    assert_eq!(response.skipped, skipped);
    assert_eq!(response.mapping.len(), applied);
    assert_eq!(h.store.flow_count(&target()).await, applied);
}

#[tokio::test]
async fn deselected_update_leaves_target_untouched() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-a", FlowStatus::Disabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));
    let old = source_flow("a", FlowStatus::Disabled);
    let mut new = old.clone();
    new.version.display_name = "Should not land".to_string();

    let mut req = request(vec![update(old, new)], mapping);
    req.selected_operations = Some([FlowId::from("other")].into_iter().collect());
    apply(&h.collab, req).await.expect("apply");

    let flow = FlowRepository::get(h.store.as_ref(), &target(), &FlowId::from("t-a"))
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(flow.version.display_name, "Flow t-a");
}

// ---------------------------------------------------------------------------
// 4. Publish side effects
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_enabled_results_are_republished() {
    let h = harness().await;

    let response = apply(
        &h.collab,
        request(
            vec![
                create(source_flow("on", FlowStatus::Enabled)),
                create(source_flow("off", FlowStatus::Disabled)),
            ],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect("apply");

    let on_target = response
        .mapping
        .find_target_id(&FlowId::from("on"))
        .expect("mapped")
        .clone();
    assert!(response.errors.is_empty());
    assert_eq!(h.publisher.published().await, vec![on_target]);
}

#[tokio::test]
async fn publish_failure_is_collected_not_raised() {
    let h = harness_with(RecordingPublisher::failing_for([FlowId::from("t-bad")])).await;
    h.store
        .insert_flow(target_flow("t-bad", FlowStatus::Enabled))
        .await
        .expect("seed");
    let mapping =
        ProjectMappingState::empty().map_flow(FlowId::from("bad"), FlowId::from("t-bad"));
    let bad = source_flow("bad", FlowStatus::Enabled);

    let response = apply(
        &h.collab,
        request(
            vec![
                update(bad.clone(), bad),
                create(source_flow("good", FlowStatus::Enabled)),
            ],
            mapping,
        ),
    )
    .await
    .expect("publish failures never fail the call");

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].flow_id, FlowId::from("t-bad"));
    assert!(response.errors[0]
        .message
        .starts_with("failed to publish flow after sync"));
    assert_eq!(h.publisher.published().await.len(), 1);
    assert_eq!(response.mapping.len(), 2);
}

// ---------------------------------------------------------------------------
// 5. Mid-batch lifecycle failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_failure_stops_batch_and_keeps_partial_mapping() {
    let h = harness().await;
    let b = source_flow("b", FlowStatus::Disabled);

    let err = apply(
        &h.collab,
        request(
            vec![
                create(source_flow("a", FlowStatus::Enabled)),
                update(b.clone(), b),
                create(source_flow("c", FlowStatus::Disabled)),
            ],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect_err("unmapped update aborts the batch");

    assert!(matches!(err, SyncError::NotFound { .. }));
    assert_eq!(h.store.flow_count(&target()).await, 1);

    let persisted = persisted_mapping(&h).await;
    assert_eq!(persisted.len(), 1);
    let a_target = persisted
        .find_target_id(&FlowId::from("a"))
        .expect("a persisted")
        .clone();
    assert!(persisted.find_target_id(&FlowId::from("c")).is_none());
    // The publish scheduled before the failure still ran.
    assert_eq!(h.publisher.published().await, vec![a_target]);
}

#[tokio::test]
async fn missing_project_is_a_persistence_error() {
    let h = harness().await;
    let mut req = request(
        vec![create(source_flow("a", FlowStatus::Disabled))],
        ProjectMappingState::empty(),
    );
    req.project_id = ProjectId::from("nope");

    let err = apply(&h.collab, req).await.expect_err("unknown project");
    assert!(matches!(err, SyncError::Persistence(_)));
}

// ---------------------------------------------------------------------------
// 6. Scheduling and failure paths
// ---------------------------------------------------------------------------

/// Publisher that takes `delay` per flow and records completions.
struct SlowPublisher {
    delay: Duration,
    published: Mutex<Vec<FlowId>>,
}

impl SlowPublisher {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            published: Mutex::default(),
        }
    }
}

#[async_trait]
impl FlowPublisher for SlowPublisher {
    async fn publish(&self, _project: &ProjectId, flow: &FlowId) -> Result<(), PublishError> {
        tokio::time::sleep(self.delay).await;
        self.published.lock().await.push(flow.clone());
        Ok(())
    }
}

struct PanickingPublisher;

#[async_trait]
impl FlowPublisher for PanickingPublisher {
    async fn publish(&self, _project: &ProjectId, flow: &FlowId) -> Result<(), PublishError> {
        panic!("publisher crashed on {flow}");
    }
}

/// Reads go to the wrapped store; mapping writes always fail.
struct MappingWriteFails(Arc<InMemoryStore>);

#[async_trait]
impl ProjectRepository for MappingWriteFails {
    async fn get(&self, project: &ProjectId) -> Result<Project, StoreError> {
        ProjectRepository::get(self.0.as_ref(), project).await
    }

    async fn update_mapping(
        &self,
        _project: &ProjectId,
        _mapping: ProjectMappingState,
    ) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("project.yaml"),
            source: std::io::Error::other("disk full"),
        })
    }
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_project(Project::new(target(), "Production"))
        .await;
    store
}

#[tokio::test(start_paused = true)]
async fn publishes_overlap_each_other_and_later_operations() {
    let store = seeded_store().await;
    let publisher = Arc::new(SlowPublisher::new(Duration::from_millis(300)));
    let collab = Collaborators::from_store(store.clone(), publisher.clone());
    let ops = (0..5)
        .map(|i| create(source_flow(&format!("f{i}"), FlowStatus::Enabled)))
        .collect();

    let started = Instant::now();
    let response = apply(&collab, request(ops, ProjectMappingState::empty()))
        .await
        .expect("apply");
    let elapsed = started.elapsed();

    assert!(response.errors.is_empty());
    assert_eq!(response.mapping.len(), 5);
    assert_eq!(publisher.published.lock().await.len(), 5);
    // Sequential publishing would take 5 × 300ms.
    assert!(
        elapsed < Duration::from_millis(600),
        "publishes did not overlap: {elapsed:?}"
    );
}

#[tokio::test]
async fn panicked_publish_becomes_sync_error() {
    let store = seeded_store().await;
    let collab = Collaborators::from_store(store.clone(), Arc::new(PanickingPublisher));

    let response = apply(
        &collab,
        request(
            vec![create(source_flow("a", FlowStatus::Enabled))],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect("a crashed publish never fails the call");

    let target_id = response
        .mapping
        .find_target_id(&FlowId::from("a"))
        .expect("mapped")
        .clone();
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].flow_id, target_id);
    assert!(response.errors[0].message.starts_with("publish task aborted"));
}

#[tokio::test]
async fn delete_of_already_gone_target_drops_entry() {
    let h = harness().await;
    let mapping =
        ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-gone"));

    let response = apply(
        &h.collab,
        request(vec![delete(source_flow("a", FlowStatus::Enabled))], mapping),
    )
    .await
    .expect("delete after a partial cycle succeeds");

    assert!(response.mapping.is_empty());
    assert!(persisted_mapping(&h).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn mapping_write_failure_is_reported_after_publishes_settle() {
    let store = seeded_store().await;
    let publisher = Arc::new(SlowPublisher::new(Duration::from_millis(200)));
    let collab = Collaborators {
        flows: store.clone(),
        projects: Arc::new(MappingWriteFails(store.clone())),
        files: store.clone(),
        publisher: publisher.clone(),
    };

    let err = apply(
        &collab,
        request(
            vec![create(source_flow("a", FlowStatus::Enabled))],
            ProjectMappingState::empty(),
        ),
    )
    .await
    .expect_err("mapping write failure surfaces");

    assert!(matches!(err, SyncError::Persistence(StoreError::Io { .. })));
    assert_eq!(publisher.published.lock().await.len(), 1);
    assert_eq!(store.flow_count(&target()).await, 1);
}

#[tokio::test]
async fn deselected_delete_keeps_flow_and_entry() {
    let h = harness().await;
    h.store
        .insert_flow(target_flow("t-a", FlowStatus::Enabled))
        .await
        .expect("seed");
    let mapping = ProjectMappingState::empty().map_flow(FlowId::from("a"), FlowId::from("t-a"));

    let mut req = request(
        vec![delete(source_flow("a", FlowStatus::Enabled))],
        mapping.clone(),
    );
    req.selected_operations = Some([FlowId::from("b")].into_iter().collect());
    let response = apply(&h.collab, req).await.expect("apply");

    assert_eq!(response.skipped, 1);
    assert_eq!(response.mapping, mapping);
    assert_eq!(persisted_mapping(&h).await, mapping);
    assert_eq!(h.store.flow_count(&target()).await, 1);
    assert!(h.publisher.published().await.is_empty());
}
