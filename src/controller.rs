//! Controller facade
//!
//! Top-level entry point: connects to a controller, exposes listing and
//! lookup of projects, computes, VM engines and images, and delegates every
//! mutation to the synchronizer it owns. There is no process-wide registry;
//! all mirrored state lives inside this value.

use crate::config::ControllerConfig;
use crate::entity::str_field;
use crate::error::Result;
use crate::http::ControllerHttp;
use crate::index::{PortRef, RelationshipIndex};
use crate::resources::{
    Compute, Drawing, DrawingSpec, Image, Link, Node, NodeSpec, Project, Snapshot, Vm, VmEngine,
};
use crate::sync::Synchronizer;
use serde_json::Value;
use uuid::Uuid;

/// Version information reported by the controller
#[derive(Debug, Clone)]
pub struct ControllerVersion {
    pub version: String,
    pub local: bool,
}

/// Client for one controller
pub struct Controller {
    sync: Synchronizer,
}

impl Controller {
    /// Build a client from controller settings without touching the network
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let http = ControllerHttp::new(config)?;
        Ok(Self {
            sync: Synchronizer::new(http),
        })
    }

    /// Build a client and verify the controller answers, then mirror the
    /// top-level scope (projects and computes)
    pub async fn connect(config: &ControllerConfig) -> Result<Self> {
        let mut controller = Self::new(config)?;
        let version = controller.version().await?;
        tracing::info!("connected to controller {}", version.version);
        controller.sync.refresh_computes().await?;
        controller.sync.refresh_projects().await?;
        Ok(controller)
    }

    /// Ask the controller for its version
    pub async fn version(&self) -> Result<ControllerVersion> {
        let doc = self.sync.http().get("/v2/version").await?;
        Ok(ControllerVersion {
            version: str_field(&doc, "version", "unknown"),
            local: doc.get("local").and_then(|v| v.as_bool()).unwrap_or(false),
        })
    }

    /// Read-only view of the relationship index
    pub fn index(&self) -> &RelationshipIndex {
        self.sync.index()
    }

    /// Direct access to the synchronizer driving this controller
    pub fn sync(&mut self) -> &mut Synchronizer {
        &mut self.sync
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Re-list projects from the controller
    pub async fn refresh_projects(&mut self) -> Result<Vec<Project>> {
        self.sync.refresh_projects().await
    }

    /// A project by id, from the local mirror
    pub fn project(&self, project_id: Uuid) -> Option<&Project> {
        self.sync.project(project_id)
    }

    /// A live project by name, from the local mirror
    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.sync.project_by_name(name)
    }

    pub async fn create_project(&mut self, name: &str) -> Result<Project> {
        self.sync.create_project(name).await
    }

    pub async fn refresh_project(&mut self, project_id: Uuid) -> Result<Project> {
        self.sync.refresh_project(project_id).await
    }

    pub async fn update_project(&mut self, project_id: Uuid, patch: Value) -> Result<Project> {
        self.sync.update_project(project_id, patch).await
    }

    pub async fn delete_project(&mut self, project_id: Uuid) -> Result<()> {
        self.sync.delete_project(project_id).await
    }

    pub async fn open_project(&mut self, project_id: Uuid) -> Result<Project> {
        self.sync.open_project(project_id).await
    }

    pub async fn close_project(&mut self, project_id: Uuid) -> Result<Project> {
        self.sync.close_project(project_id).await
    }

    // =========================================================================
    // Computes, VM engines, images
    // =========================================================================

    /// Re-list computes from the controller
    pub async fn refresh_computes(&mut self) -> Result<Vec<Compute>> {
        self.sync.refresh_computes().await
    }

    /// A compute by id, from the local mirror
    pub fn compute(&self, compute_id: &str) -> Option<&Compute> {
        self.sync.compute(compute_id)
    }

    pub async fn refresh_compute(&mut self, compute_id: &str) -> Result<Compute> {
        self.sync.refresh_compute(compute_id).await
    }

    /// VM engines the controller can drive
    pub async fn vm_engines(&self) -> Result<Vec<VmEngine>> {
        let doc = self.sync.http().get("/v2/gns3vm/engines").await?;
        Ok(doc
            .as_array()
            .map(|arr| arr.iter().map(VmEngine::from).collect())
            .unwrap_or_default())
    }

    /// VMs known to one engine
    pub async fn vms(&self, engine_id: &str) -> Result<Vec<Vm>> {
        let doc = self
            .sync
            .http()
            .get(&format!("/v2/gns3vm/engines/{engine_id}/vms"))
            .await?;
        Ok(doc
            .as_array()
            .map(|arr| arr.iter().map(Vm::from).collect())
            .unwrap_or_default())
    }

    /// Images available on a compute for one emulator
    pub async fn images(&self, compute_id: &str, emulator: &str) -> Result<Vec<Image>> {
        let doc = self
            .sync
            .http()
            .get(&format!("/v2/computes/{compute_id}/{emulator}/images"))
            .await?;
        Ok(doc
            .as_array()
            .map(|arr| arr.iter().map(Image::from).collect())
            .unwrap_or_default())
    }

    // =========================================================================
    // Topology within a project
    // =========================================================================

    pub fn nodes_of(&self, project_id: Uuid) -> Vec<&Node> {
        self.sync.nodes_of(project_id)
    }

    pub fn links_of(&self, project_id: Uuid) -> Vec<&Link> {
        self.sync.links_of(project_id)
    }

    pub fn drawings_of(&self, project_id: Uuid) -> Vec<&Drawing> {
        self.sync.drawings_of(project_id)
    }

    pub fn node(&self, node_id: Uuid) -> Option<&Node> {
        self.sync.node(node_id)
    }

    pub fn link(&self, link_id: Uuid) -> Option<&Link> {
        self.sync.link(link_id)
    }

    pub fn drawing(&self, drawing_id: Uuid) -> Option<&Drawing> {
        self.sync.drawing(drawing_id)
    }

    pub fn snapshot(&self, snapshot_id: Uuid) -> Option<&Snapshot> {
        self.sync.snapshot(snapshot_id)
    }

    /// The link occupying a port, if any
    pub fn link_at(&self, port: PortRef) -> Option<&Link> {
        self.sync.link_at(port)
    }

    pub async fn create_node(&mut self, project_id: Uuid, spec: &NodeSpec) -> Result<Node> {
        self.sync.create_node(project_id, spec).await
    }

    pub async fn refresh_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.sync.refresh_node(node_id).await
    }

    pub async fn update_node(&mut self, node_id: Uuid, patch: Value) -> Result<Node> {
        self.sync.update_node(node_id, patch).await
    }

    pub async fn delete_node(&mut self, node_id: Uuid) -> Result<()> {
        self.sync.delete_node(node_id).await
    }

    pub async fn start_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.sync.start_node(node_id).await
    }

    pub async fn stop_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.sync.stop_node(node_id).await
    }

    pub async fn suspend_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.sync.suspend_node(node_id).await
    }

    /// Link two node ports within a project
    pub async fn create_link(&mut self, project_id: Uuid, a: PortRef, b: PortRef) -> Result<Link> {
        self.sync.create_link(project_id, a, b).await
    }

    pub async fn delete_link(&mut self, link_id: Uuid) -> Result<()> {
        self.sync.delete_link(link_id).await
    }

    pub async fn create_drawing(
        &mut self,
        project_id: Uuid,
        spec: &DrawingSpec,
    ) -> Result<Drawing> {
        self.sync.create_drawing(project_id, spec).await
    }

    pub async fn update_drawing(&mut self, drawing_id: Uuid, patch: Value) -> Result<Drawing> {
        self.sync.update_drawing(drawing_id, patch).await
    }

    pub async fn delete_drawing(&mut self, drawing_id: Uuid) -> Result<()> {
        self.sync.delete_drawing(drawing_id).await
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn create_snapshot(&mut self, project_id: Uuid, name: &str) -> Result<Snapshot> {
        self.sync.create_snapshot(project_id, name).await
    }

    pub async fn list_snapshots(&mut self, project_id: Uuid) -> Result<Vec<Snapshot>> {
        self.sync.list_snapshots(project_id).await
    }

    pub async fn restore_snapshot(&mut self, snapshot_id: Uuid) -> Result<Project> {
        self.sync.restore_snapshot(snapshot_id).await
    }

    pub async fn delete_snapshot(&mut self, snapshot_id: Uuid) -> Result<()> {
        self.sync.delete_snapshot(snapshot_id).await
    }
}
