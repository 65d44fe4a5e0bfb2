//! Integration tests for the synchronization protocols using wiremock
//!
//! Each test stands up a mocked controller and drives the client through
//! one protocol, checking both the local mirror and the exact set of
//! requests that reached the server. Mock expectations (`expect(0)`,
//! `expect(1)`) are verified when the mock server drops.

use gns3_client::{
    ChildKind, ClientError, Controller, ControllerConfig, Entity, EntityState, NodeSpec, PortRef,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_ID: &str = "aaaaaaaa-1111-2222-3333-444444444444";
const NODE_A: &str = "bbbbbbbb-1111-2222-3333-444444444444";
const NODE_B: &str = "cccccccc-1111-2222-3333-444444444444";
const NODE_C: &str = "dddddddd-1111-2222-3333-444444444444";
const LINK_ID: &str = "eeeeeeee-1111-2222-3333-444444444444";
const DRAWING_ID: &str = "ffffffff-1111-2222-3333-444444444444";
const SNAPSHOT_ID: &str = "99999999-1111-2222-3333-444444444444";

fn project_doc(name: &str) -> serde_json::Value {
    json!({"project_id": PROJECT_ID, "name": name, "status": "opened"})
}

fn node_doc(node_id: &str, name: &str) -> serde_json::Value {
    json!({
        "node_id": node_id,
        "project_id": PROJECT_ID,
        "compute_id": "local",
        "name": name,
        "node_type": "vpcs",
        "status": "stopped",
        "ports": [
            {"name": "Ethernet0", "adapter_number": 0, "port_number": 0, "link_type": "ethernet"},
            {"name": "Ethernet1", "adapter_number": 0, "port_number": 1, "link_type": "ethernet"}
        ]
    })
}

fn link_doc(a: &str, b: &str) -> serde_json::Value {
    json!({
        "link_id": LINK_ID,
        "project_id": PROJECT_ID,
        "nodes": [
            {"node_id": a, "adapter_number": 0, "port_number": 0},
            {"node_id": b, "adapter_number": 0, "port_number": 0}
        ]
    })
}

fn link_doc_on_ports(link_id: &str, a: &str, pa: u32, b: &str, pb: u32) -> serde_json::Value {
    json!({
        "link_id": link_id,
        "project_id": PROJECT_ID,
        "nodes": [
            {"node_id": a, "adapter_number": 0, "port_number": pa},
            {"node_id": b, "adapter_number": 0, "port_number": pb}
        ]
    })
}

fn port(node_id: &str, port_number: u32) -> PortRef {
    PortRef {
        node_id: Uuid::parse_str(node_id).unwrap(),
        adapter_number: 0,
        port_number,
    }
}

fn controller_for(server: &MockServer) -> Controller {
    let config = ControllerConfig::from_url(&server.uri()).unwrap();
    Controller::new(&config).unwrap()
}

fn project_id() -> Uuid {
    Uuid::parse_str(PROJECT_ID).unwrap()
}

/// Mount the compute listing so node creation can resolve "local"
async fn mount_computes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/computes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"compute_id": "local", "name": "Main server", "connected": true,
             "protocol": "http", "host": "127.0.0.1", "port": 3080,
             "capabilities": {"node_types": ["vpcs", "qemu"]}}
        ])))
        .mount(server)
        .await;
}

/// Mount empty child listings for the project
async fn mount_empty_children(server: &MockServer) {
    for child in ["nodes", "links", "drawings"] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/projects/{PROJECT_ID}/{child}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }
}

/// create() followed by refresh() yields the same cache as the create
/// response itself
#[tokio::test]
async fn create_then_refresh_is_stable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    mount_empty_children(&server).await;

    let mut controller = controller_for(&server);
    let created = controller.create_project("lab").await.unwrap();
    assert_eq!(created.state(), EntityState::Bound);
    assert_eq!(created.name, "lab");

    let refreshed = controller.refresh_project(project_id()).await.unwrap();
    assert_eq!(refreshed.name, created.name);
    assert_eq!(refreshed.status, created.status);
    assert_eq!(refreshed.state(), EntityState::Bound);
}

/// delete() is idempotent: the second call succeeds without another request
#[tokio::test]
async fn delete_is_idempotent_locally() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();

    controller.delete_project(project_id()).await.unwrap();
    // Second delete: already Deleted locally, no request goes out
    controller.delete_project(project_id()).await.unwrap();

    assert_eq!(
        controller.project(project_id()).unwrap().state(),
        EntityState::Deleted
    );
}

/// delete() also succeeds when the server already lost the resource
#[tokio::test]
async fn delete_tolerates_remote_404() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();
    controller.delete_project(project_id()).await.unwrap();
}

/// Node creation with an unresolved compute fails fast: ValidationError,
/// zero requests to the controller
#[tokio::test]
async fn node_creation_requires_known_compute() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();

    // Computes were never refreshed, so "local" is unknown to the client
    let err = controller
        .create_node(project_id(), &NodeSpec::new("r1", "vpcs", "local"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

/// Linking an already-occupied port fails with ValidationError and issues
/// zero requests
#[tokio::test]
async fn link_creation_rejects_occupied_port() {
    let server = MockServer::start().await;

    mount_computes(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .and(body_partial_json(json!({"name": "r1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_doc(NODE_A, "r1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .and(body_partial_json(json!({"name": "r2"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_doc(NODE_B, "r2")))
        .mount(&server)
        .await;
    // Exactly one link-create may reach the server
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(201).set_body_json(link_doc(NODE_A, NODE_B)))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_computes().await.unwrap();
    controller.create_project("lab").await.unwrap();
    controller
        .create_node(project_id(), &NodeSpec::new("r1", "vpcs", "local"))
        .await
        .unwrap();
    controller
        .create_node(project_id(), &NodeSpec::new("r2", "vpcs", "local"))
        .await
        .unwrap();

    controller
        .create_link(project_id(), port(NODE_A, 0), port(NODE_B, 0))
        .await
        .unwrap();

    // NODE_B port 0 is taken now
    let err = controller
        .create_link(project_id(), port(NODE_A, 1), port(NODE_B, 0))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

/// After a refresh, the index's child set equals exactly the server listing:
/// server has {A, B}, local mirror had {A, C}
#[tokio::test]
async fn refresh_reconciles_child_sets() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_doc("lab")])))
        .mount(&server)
        .await;

    // First listing: {A, C}. Second listing: {A, B}.
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            node_doc(NODE_A, "a"),
            node_doc(NODE_C, "c")
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            node_doc(NODE_A, "a"),
            node_doc(NODE_B, "b")
        ])))
        .mount(&server)
        .await;
    for child in ["links", "drawings"] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/projects/{PROJECT_ID}/{child}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }

    let mut controller = controller_for(&server);
    controller.refresh_projects().await.unwrap();
    controller.refresh_project(project_id()).await.unwrap();

    let a = Uuid::parse_str(NODE_A).unwrap();
    let b = Uuid::parse_str(NODE_B).unwrap();
    let c = Uuid::parse_str(NODE_C).unwrap();
    assert_eq!(
        controller.index().children_of(project_id(), ChildKind::Node),
        &[a, c]
    );

    controller.refresh_project(project_id()).await.unwrap();
    assert_eq!(
        controller.index().children_of(project_id(), ChildKind::Node),
        &[a, b]
    );
    assert_eq!(controller.node(c).unwrap().state(), EntityState::Deleted);
    assert_eq!(controller.node(b).unwrap().state(), EntityState::Bound);
}

/// Deleting a project cascades Deleted state to every registered child with
/// a single DELETE call
#[tokio::test]
async fn project_delete_cascades_children_locally() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_doc("lab")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            node_doc(NODE_A, "a"),
            node_doc(NODE_B, "b")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([link_doc(NODE_A, NODE_B)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/drawings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"drawing_id": DRAWING_ID, "project_id": PROJECT_ID, "svg": "<svg/>", "x": 0, "y": 0}
        ])))
        .mount(&server)
        .await;
    // The only DELETE the server may see is for the project itself
    Mock::given(method("DELETE"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_projects().await.unwrap();
    controller.refresh_project(project_id()).await.unwrap();
    controller.delete_project(project_id()).await.unwrap();

    for node_id in [NODE_A, NODE_B] {
        let node_id = Uuid::parse_str(node_id).unwrap();
        assert_eq!(controller.node(node_id).unwrap().state(), EntityState::Deleted);
    }
    let link_id = Uuid::parse_str(LINK_ID).unwrap();
    assert_eq!(controller.link(link_id).unwrap().state(), EntityState::Deleted);
    let drawing_id = Uuid::parse_str(DRAWING_ID).unwrap();
    assert_eq!(
        controller.drawing(drawing_id).unwrap().state(),
        EntityState::Deleted
    );
    assert!(controller
        .index()
        .children_of(project_id(), ChildKind::Node)
        .is_empty());
}

/// End to end: project, two compute-backed nodes, one link, then a refresh.
/// The child sets and port occupancy must line up exactly.
#[tokio::test]
async fn topology_scenario_survives_refresh() {
    let server = MockServer::start().await;

    mount_computes(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .and(body_partial_json(json!({"name": "n1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_doc(NODE_A, "n1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .and(body_partial_json(json!({"name": "n2"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_doc(NODE_B, "n2")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(201).set_body_json(link_doc(NODE_A, NODE_B)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            node_doc(NODE_A, "n1"),
            node_doc(NODE_B, "n2")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([link_doc(NODE_A, NODE_B)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/drawings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_computes().await.unwrap();
    controller.create_project("lab").await.unwrap();
    let n1 = controller
        .create_node(project_id(), &NodeSpec::new("n1", "vpcs", "local"))
        .await
        .unwrap();
    let n2 = controller
        .create_node(project_id(), &NodeSpec::new("n2", "vpcs", "local"))
        .await
        .unwrap();
    let link = controller
        .create_link(project_id(), port(NODE_A, 0), port(NODE_B, 0))
        .await
        .unwrap();

    controller.refresh_project(project_id()).await.unwrap();

    let node_ids: Vec<_> = controller
        .nodes_of(project_id())
        .iter()
        .filter_map(|n| n.id())
        .collect();
    assert_eq!(node_ids, vec![n1.id().unwrap(), n2.id().unwrap()]);

    let link_ids: Vec<_> = controller
        .links_of(project_id())
        .iter()
        .filter_map(|l| l.id())
        .collect();
    assert_eq!(link_ids, vec![link.id().unwrap()]);

    // Each node has the link on exactly one of its two ports
    for node in [NODE_A, NODE_B] {
        let occupied: Vec<u32> = (0..2u32)
            .filter(|p| controller.link_at(port(node, *p)).is_some())
            .collect();
        assert_eq!(occupied, vec![0]);
    }
}

/// A 409 on update leaves the entity Stale with its cache untouched and
/// surfaces Conflict
#[tokio::test]
async fn conflicting_update_leaves_cache_stale() {
    let server = MockServer::start().await;

    mount_computes(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(201).set_body_json(node_doc(NODE_A, "n1")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes/{NODE_A}")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "Node already modified", "status": 409
        })))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_computes().await.unwrap();
    controller.create_project("lab").await.unwrap();
    let node = controller
        .create_node(project_id(), &NodeSpec::new("n1", "vpcs", "local"))
        .await
        .unwrap();
    let node_id = node.id().unwrap();

    let err = controller
        .update_node(node_id, json!({"name": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Conflict));

    let node = controller.node(node_id).unwrap();
    assert_eq!(node.state(), EntityState::Stale);
    assert_eq!(node.name, "n1");
}

/// A refresh that finds the project gone marks it Deleted; further
/// operations fail with a Gone error
#[tokio::test]
async fn refresh_of_vanished_project_marks_deleted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();

    let err = controller.refresh_project(project_id()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        controller.project(project_id()).unwrap().state(),
        EntityState::Deleted
    );

    let err = controller.open_project(project_id()).await.unwrap_err();
    assert!(matches!(err, ClientError::Gone { .. }));
}

/// Snapshot creation requires a fully synced project; a stale cache is
/// rejected before any request goes out
#[tokio::test]
async fn snapshot_requires_synced_project() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/snapshots")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();

    // Force the project cache into Stale via a rejected update
    let _ = controller
        .update_project(project_id(), json!({"name": "renamed"}))
        .await
        .unwrap_err();
    assert_eq!(
        controller.project(project_id()).unwrap().state(),
        EntityState::Stale
    );

    let err = controller
        .create_snapshot(project_id(), "s1")
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

/// Restoring a snapshot forces a full project refresh
#[tokio::test]
async fn snapshot_restore_triggers_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/snapshots")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "snapshot_id": SNAPSHOT_ID,
            "project_id": PROJECT_ID,
            "name": "s1",
            "created_at": 1700000000
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v2/projects/{PROJECT_ID}/snapshots/{SNAPSHOT_ID}/restore"
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([node_doc(NODE_A, "a")])))
        .mount(&server)
        .await;
    for child in ["links", "drawings"] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/projects/{PROJECT_ID}/{child}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();
    let snapshot = controller.create_snapshot(project_id(), "s1").await.unwrap();

    let project = controller
        .restore_snapshot(snapshot.id().unwrap())
        .await
        .unwrap();
    assert_eq!(project.state(), EntityState::Bound);

    // The restore pulled the restored topology into the mirror
    let a = Uuid::parse_str(NODE_A).unwrap();
    assert_eq!(controller.node(a).unwrap().state(), EntityState::Bound);
}

/// An external edit moves a link off its ports and a new link takes them.
/// The refresh must end with the index equal to the server's listing even
/// when the new link is listed before the moved one.
#[tokio::test]
async fn refresh_rebinds_links_moved_by_external_edits() {
    let server = MockServer::start().await;

    const LINK_NEW: &str = "abababab-1111-2222-3333-444444444444";

    Mock::given(method("GET"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_doc("lab")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            node_doc(NODE_A, "a"),
            node_doc(NODE_B, "b")
        ])))
        .mount(&server)
        .await;
    // First listing: the original link on ports 0/0
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            link_doc_on_ports(LINK_ID, NODE_A, 0, NODE_B, 0)
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Second listing: a new link took those ports, the old one moved to 1/1
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/links")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            link_doc_on_ports(LINK_NEW, NODE_A, 0, NODE_B, 0),
            link_doc_on_ports(LINK_ID, NODE_A, 1, NODE_B, 1)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/drawings")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut controller = controller_for(&server);
    controller.refresh_projects().await.unwrap();
    controller.refresh_project(project_id()).await.unwrap();
    controller.refresh_project(project_id()).await.unwrap();

    let moved = Uuid::parse_str(LINK_ID).unwrap();
    let new = Uuid::parse_str(LINK_NEW).unwrap();
    let links = controller.index().children_of(project_id(), ChildKind::Link);
    assert_eq!(links.len(), 2);
    assert!(links.contains(&moved) && links.contains(&new));

    assert_eq!(controller.index().link_at(port(NODE_A, 0)), Some(new));
    assert_eq!(controller.index().link_at(port(NODE_B, 0)), Some(new));
    assert_eq!(controller.index().link_at(port(NODE_A, 1)), Some(moved));
    assert_eq!(controller.index().link_at(port(NODE_B, 1)), Some(moved));
    assert_eq!(
        controller.index().endpoints_of(moved),
        Some([port(NODE_A, 1), port(NODE_B, 1)])
    );
}

/// A listed child referencing a foreign project is dropped from the index
/// instead of failing the whole refresh
#[tokio::test]
async fn refresh_drops_children_of_foreign_projects() {
    let server = MockServer::start().await;

    let foreign = Uuid::new_v4();
    let mut stray = node_doc(NODE_B, "stray");
    stray["project_id"] = json!(foreign.to_string());

    Mock::given(method("POST"))
        .and(path("/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(project_doc("lab")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/projects/{PROJECT_ID}/nodes")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([node_doc(NODE_A, "a"), stray])),
        )
        .mount(&server)
        .await;
    for child in ["links", "drawings"] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/projects/{PROJECT_ID}/{child}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }

    let mut controller = controller_for(&server);
    controller.create_project("lab").await.unwrap();
    controller.refresh_project(project_id()).await.unwrap();

    let a = Uuid::parse_str(NODE_A).unwrap();
    assert_eq!(
        controller.index().children_of(project_id(), ChildKind::Node),
        &[a]
    );
}
