//! Synchronizer
//!
//! Drives the create/refresh/update/delete protocols per entity kind and
//! keeps the relationship index consistent with whatever the controller
//! actually has. Dependency order is enforced up front: a node's compute
//! must be known before the node-create call goes out, a link's endpoint
//! ports must exist and be free before the link-create call goes out.
//! Validation failures are raised before any request is sent, so a failed
//! precondition never leaves partial remote state behind.
//!
//! All protocol steps run sequentially; nothing proceeds past a failed
//! prerequisite. Local caches are never treated as authoritative - only a
//! successful response updates them.

use crate::entity::{uuid_field, Entity, EntityState};
use crate::error::{ClientError, Result};
use crate::http::ControllerHttp;
use crate::index::{ChildKind, PortRef, RelationshipIndex};
use crate::resources::{
    Compute, Drawing, DrawingSpec, Link, Node, NodeSpec, Project, Snapshot,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Entity stores plus the relationship index, reconciled against the
/// controller by the protocol methods below
pub struct Synchronizer {
    http: ControllerHttp,
    index: RelationshipIndex,
    projects: HashMap<Uuid, Project>,
    computes: HashMap<String, Compute>,
    nodes: HashMap<Uuid, Node>,
    links: HashMap<Uuid, Link>,
    drawings: HashMap<Uuid, Drawing>,
    snapshots: HashMap<Uuid, Snapshot>,
}

/// Controller responses occasionally omit ids they are required to carry;
/// treat that as a decode failure rather than guessing
fn missing_id(kind: &str) -> ClientError {
    use serde::de::Error as _;
    ClientError::Decode(serde_json::Error::custom(format!(
        "controller returned a {kind} document without an id"
    )))
}

fn as_array(value: Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

impl Synchronizer {
    pub fn new(http: ControllerHttp) -> Self {
        Self {
            http,
            index: RelationshipIndex::new(),
            projects: HashMap::new(),
            computes: HashMap::new(),
            nodes: HashMap::new(),
            links: HashMap::new(),
            drawings: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    pub(crate) fn http(&self) -> &ControllerHttp {
        &self.http
    }

    /// Read-only view of the relationship index
    pub fn index(&self) -> &RelationshipIndex {
        &self.index
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn project(&self, project_id: Uuid) -> Option<&Project> {
        self.projects.get(&project_id)
    }

    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects
            .values()
            .find(|p| p.name == name && p.state() != EntityState::Deleted)
    }

    pub fn compute(&self, compute_id: &str) -> Option<&Compute> {
        self.computes.get(compute_id)
    }

    pub fn node(&self, node_id: Uuid) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn link(&self, link_id: Uuid) -> Option<&Link> {
        self.links.get(&link_id)
    }

    pub fn drawing(&self, drawing_id: Uuid) -> Option<&Drawing> {
        self.drawings.get(&drawing_id)
    }

    pub fn snapshot(&self, snapshot_id: Uuid) -> Option<&Snapshot> {
        self.snapshots.get(&snapshot_id)
    }

    /// Nodes of a project in registration order
    pub fn nodes_of(&self, project_id: Uuid) -> Vec<&Node> {
        self.index
            .children_of(project_id, ChildKind::Node)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Links of a project in registration order
    pub fn links_of(&self, project_id: Uuid) -> Vec<&Link> {
        self.index
            .children_of(project_id, ChildKind::Link)
            .iter()
            .filter_map(|id| self.links.get(id))
            .collect()
    }

    /// Drawings of a project in registration order
    pub fn drawings_of(&self, project_id: Uuid) -> Vec<&Drawing> {
        self.index
            .children_of(project_id, ChildKind::Drawing)
            .iter()
            .filter_map(|id| self.drawings.get(id))
            .collect()
    }

    /// The link occupying a port, if any
    pub fn link_at(&self, port: PortRef) -> Option<&Link> {
        self.index.link_at(port).and_then(|id| self.links.get(&id))
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Create a project on the controller and start tracking it
    pub async fn create_project(&mut self, name: &str) -> Result<Project> {
        let doc = self
            .http
            .post("/v2/projects", Some(&json!({ "name": name })))
            .await?;

        let project = Project::from_doc(&doc);
        let project_id = project.id().ok_or_else(|| missing_id("project"))?;

        self.projects.insert(project_id, project.clone());
        self.index.insert_project(project_id);
        tracing::info!("created project {} ({})", project.name, project_id);
        Ok(project)
    }

    /// List projects from the controller and reconcile the local set:
    /// unknown projects are added, vanished projects are marked deleted with
    /// their children cascaded.
    pub async fn refresh_projects(&mut self) -> Result<Vec<Project>> {
        let docs = as_array(self.http.get("/v2/projects").await?);

        let mut remote = Vec::new();
        let mut listed = Vec::new();
        for doc in &docs {
            let Some(project_id) = uuid_field(doc, "project_id") else {
                tracing::warn!("dropping project listing entry without an id");
                continue;
            };
            remote.push(project_id);
            match self.projects.get_mut(&project_id) {
                Some(project) => {
                    project.apply(doc);
                    project.meta_mut().mark_bound();
                }
                None => {
                    self.projects.insert(project_id, Project::from_doc(doc));
                }
            }
            self.index.insert_project(project_id);
            listed.push(self.projects[&project_id].clone());
        }

        let vanished: Vec<Uuid> = self
            .projects
            .iter()
            .filter(|(id, p)| !remote.contains(id) && p.state() != EntityState::Deleted)
            .map(|(id, _)| *id)
            .collect();
        for project_id in vanished {
            tracing::debug!("project {} vanished from the controller", project_id);
            self.forget_project(project_id);
        }

        Ok(listed)
    }

    /// Refresh one project and reconcile its full child sets against the
    /// controller's listings. Fails with `NotFound` (and marks the project
    /// deleted locally) if the controller no longer has it.
    pub async fn refresh_project(&mut self, project_id: Uuid) -> Result<Project> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        let doc = match self.http.get(&format!("/v2/projects/{project_id}")).await {
            Ok(doc) => doc,
            Err(ClientError::NotFound) => {
                self.forget_project(project_id);
                return Err(ClientError::NotFound);
            }
            Err(err) => return Err(err),
        };

        if let Some(project) = self.projects.get_mut(&project_id) {
            project.apply(&doc);
        }
        self.index.insert_project(project_id);

        // Nodes first so link endpoint validation sees fresh ports
        self.reconcile_nodes(project_id).await?;
        self.reconcile_links(project_id).await?;
        self.reconcile_drawings(project_id).await?;

        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| missing_id("project"))?;
        project.meta_mut().mark_bound();
        Ok(project.clone())
    }

    /// Send a partial update for a project. Exactly the supplied fields go
    /// out; on a conflict the local cache is left stale and untouched.
    pub async fn update_project(&mut self, project_id: Uuid, patch: Value) -> Result<Project> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        match self
            .http
            .put(&format!("/v2/projects/{project_id}"), &patch)
            .await
        {
            Ok(doc) => {
                let project = self
                    .projects
                    .get_mut(&project_id)
                    .ok_or_else(|| missing_id("project"))?;
                project.apply(&doc);
                project.meta_mut().mark_bound();
                Ok(project.clone())
            }
            Err(ClientError::Conflict) => {
                if let Some(project) = self.projects.get_mut(&project_id) {
                    project.meta_mut().mark_stale();
                }
                Err(ClientError::Conflict)
            }
            Err(ClientError::NotFound) => {
                self.forget_project(project_id);
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a project. Idempotent: an already-deleted project (locally or
    /// remotely) succeeds silently. Children are cascaded in memory only;
    /// the controller cascades the remote side itself.
    pub async fn delete_project(&mut self, project_id: Uuid) -> Result<()> {
        let Some(project) = self.projects.get(&project_id) else {
            return Err(ClientError::Validation(format!(
                "unknown project {project_id}"
            )));
        };
        if project.state() == EntityState::Deleted {
            return Ok(());
        }

        match self.http.delete(&format!("/v2/projects/{project_id}")).await {
            Ok(_) | Err(ClientError::NotFound) => {
                self.forget_project(project_id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Open a project on the controller
    pub async fn open_project(&mut self, project_id: Uuid) -> Result<Project> {
        self.project_action(project_id, "open").await
    }

    /// Close a project on the controller
    pub async fn close_project(&mut self, project_id: Uuid) -> Result<Project> {
        self.project_action(project_id, "close").await
    }

    async fn project_action(&mut self, project_id: Uuid, action: &str) -> Result<Project> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        let doc = self
            .http
            .post(&format!("/v2/projects/{project_id}/{action}"), None)
            .await?;

        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| missing_id("project"))?;
        project.apply(&doc);
        project.meta_mut().mark_bound();
        Ok(project.clone())
    }

    /// Mark a project deleted locally and cascade to everything it owns.
    /// No remote calls.
    fn forget_project(&mut self, project_id: Uuid) {
        if let Some(project) = self.projects.get_mut(&project_id) {
            project.meta_mut().mark_deleted();
        }
        let removed = self.index.unregister_project(project_id);
        for node_id in removed.nodes {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.meta_mut().mark_deleted();
            }
        }
        for link_id in removed.links {
            if let Some(link) = self.links.get_mut(&link_id) {
                link.meta_mut().mark_deleted();
            }
        }
        for drawing_id in removed.drawings {
            if let Some(drawing) = self.drawings.get_mut(&drawing_id) {
                drawing.meta_mut().mark_deleted();
            }
        }
        for snapshot in self.snapshots.values_mut() {
            if snapshot.project_id == project_id {
                snapshot.meta_mut().mark_deleted();
            }
        }
    }

    // =========================================================================
    // Computes
    // =========================================================================

    /// List computes from the controller and reconcile the local set
    pub async fn refresh_computes(&mut self) -> Result<Vec<Compute>> {
        let docs = as_array(self.http.get("/v2/computes").await?);

        let mut remote = Vec::new();
        let mut listed = Vec::new();
        for doc in &docs {
            let Some(compute_id) = doc.get("compute_id").and_then(|v| v.as_str()) else {
                tracing::warn!("dropping compute listing entry without an id");
                continue;
            };
            remote.push(compute_id.to_string());
            match self.computes.get_mut(compute_id) {
                Some(compute) => {
                    compute.apply(doc);
                    compute.mark_bound();
                }
                None => {
                    self.computes
                        .insert(compute_id.to_string(), Compute::from_doc(doc));
                }
            }
            listed.push(self.computes[compute_id].clone());
        }

        for (compute_id, compute) in self.computes.iter_mut() {
            if !remote.contains(compute_id) {
                compute.mark_deleted();
            }
        }

        Ok(listed)
    }

    /// Refresh one compute; 404 marks it deleted locally
    pub async fn refresh_compute(&mut self, compute_id: &str) -> Result<Compute> {
        let compute = self
            .computes
            .get(compute_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown compute {compute_id}")))?;
        compute.require_live()?;

        match self.http.get(&format!("/v2/computes/{compute_id}")).await {
            Ok(doc) => {
                let compute = self
                    .computes
                    .get_mut(compute_id)
                    .ok_or_else(|| missing_id("compute"))?;
                compute.apply(&doc);
                compute.mark_bound();
                Ok(compute.clone())
            }
            Err(ClientError::NotFound) => {
                if let Some(compute) = self.computes.get_mut(compute_id) {
                    compute.mark_deleted();
                }
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Node creation protocol: the referenced compute must already be known
    /// locally, otherwise the whole operation fails before any remote call.
    /// On success the node is registered under its project and its ports
    /// (derived from the response document) under the node.
    pub async fn create_node(&mut self, project_id: Uuid, spec: &NodeSpec) -> Result<Node> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        let compute = self.computes.get(&spec.compute_id).ok_or_else(|| {
            ClientError::Validation(format!(
                "compute {} is not known to this client; refresh computes first",
                spec.compute_id
            ))
        })?;
        compute.require_live()?;

        let doc = self
            .http
            .post(
                &format!("/v2/projects/{project_id}/nodes"),
                Some(&spec.to_body()),
            )
            .await?;

        let node = Node::from_doc(project_id, &doc);
        let node_id = node.id().ok_or_else(|| missing_id("node"))?;

        self.index.register(project_id, ChildKind::Node, node_id)?;
        self.index.set_ports(node_id, node.port_refs());
        self.nodes.insert(node_id, node.clone());
        tracing::info!("created node {} ({})", node.name, node_id);
        Ok(node)
    }

    /// Refresh one node; 404 marks it deleted locally and unregisters it
    pub async fn refresh_node(&mut self, node_id: Uuid) -> Result<Node> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown node {node_id}")))?;
        node.meta().require_bound(Node::KIND)?;
        let project_id = node.project_id;

        match self
            .http
            .get(&format!("/v2/projects/{project_id}/nodes/{node_id}"))
            .await
        {
            Ok(doc) => {
                let node = self
                    .nodes
                    .get_mut(&node_id)
                    .ok_or_else(|| missing_id("node"))?;
                node.apply(&doc);
                node.meta_mut().mark_bound();
                let refs = node.port_refs();
                let node = node.clone();
                self.index.set_ports(node_id, refs);
                Ok(node)
            }
            Err(ClientError::NotFound) => {
                self.forget_node(node_id);
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Send a partial update for a node; conflict leaves the cache stale
    pub async fn update_node(&mut self, node_id: Uuid, patch: Value) -> Result<Node> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown node {node_id}")))?;
        node.meta().require_bound(Node::KIND)?;
        let project_id = node.project_id;

        match self
            .http
            .put(&format!("/v2/projects/{project_id}/nodes/{node_id}"), &patch)
            .await
        {
            Ok(doc) => {
                let node = self
                    .nodes
                    .get_mut(&node_id)
                    .ok_or_else(|| missing_id("node"))?;
                node.apply(&doc);
                node.meta_mut().mark_bound();
                let refs = node.port_refs();
                let node = node.clone();
                self.index.set_ports(node_id, refs);
                Ok(node)
            }
            Err(ClientError::Conflict) => {
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.meta_mut().mark_stale();
                }
                Err(ClientError::Conflict)
            }
            Err(ClientError::NotFound) => {
                self.forget_node(node_id);
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a node. Idempotent; attached links are cascaded locally since
    /// the controller removes them with the node.
    pub async fn delete_node(&mut self, node_id: Uuid) -> Result<()> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Err(ClientError::Validation(format!("unknown node {node_id}")));
        };
        if node.state() == EntityState::Deleted {
            return Ok(());
        }
        let project_id = node.project_id;

        match self
            .http
            .delete(&format!("/v2/projects/{project_id}/nodes/{node_id}"))
            .await
        {
            Ok(_) | Err(ClientError::NotFound) => {
                self.forget_node(node_id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Start a node on its compute
    pub async fn start_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.node_action(node_id, "start").await
    }

    /// Stop a node
    pub async fn stop_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.node_action(node_id, "stop").await
    }

    /// Suspend a node
    pub async fn suspend_node(&mut self, node_id: Uuid) -> Result<Node> {
        self.node_action(node_id, "suspend").await
    }

    async fn node_action(&mut self, node_id: Uuid, action: &str) -> Result<Node> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown node {node_id}")))?;
        node.meta().require_bound(Node::KIND)?;
        let project_id = node.project_id;

        let doc = self
            .http
            .post(
                &format!("/v2/projects/{project_id}/nodes/{node_id}/{action}"),
                None,
            )
            .await?;

        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| missing_id("node"))?;
        if doc.is_object() {
            node.apply(&doc);
        }
        node.meta_mut().mark_bound();
        Ok(node.clone())
    }

    /// Mark a node deleted locally, cascading its ports and any attached
    /// links. No remote calls.
    fn forget_node(&mut self, node_id: Uuid) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let project_id = node.project_id;
        node.meta_mut().mark_deleted();

        for link_id in self.index.links_on_node(node_id) {
            self.index.unregister(project_id, ChildKind::Link, link_id);
            if let Some(link) = self.links.get_mut(&link_id) {
                link.meta_mut().mark_deleted();
            }
        }
        self.index.unregister(project_id, ChildKind::Node, node_id);
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Link creation protocol: both endpoint ports must belong to nodes of
    /// the target project and be unoccupied. Any precondition failure is a
    /// `Validation` error raised before a single request goes out.
    pub async fn create_link(
        &mut self,
        project_id: Uuid,
        a: PortRef,
        b: PortRef,
    ) -> Result<Link> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        if a == b {
            return Err(ClientError::Validation(
                "a link needs two distinct endpoint ports".to_string(),
            ));
        }
        for port in [a, b] {
            if !self
                .index
                .contains_child(project_id, ChildKind::Node, port.node_id)
            {
                return Err(ClientError::Validation(format!(
                    "node {} is not part of project {project_id}",
                    port.node_id
                )));
            }
            if !self.index.has_port(port) {
                return Err(ClientError::Validation(format!(
                    "node {} has no adapter {} port {}",
                    port.node_id, port.adapter_number, port.port_number
                )));
            }
            if let Some(holder) = self.index.link_at(port) {
                return Err(ClientError::Validation(format!(
                    "port {}/{}/{} is already occupied by link {holder}",
                    port.node_id, port.adapter_number, port.port_number
                )));
            }
        }

        let body = crate::resources::link_body([a, b]);
        let doc = self
            .http
            .post(&format!("/v2/projects/{project_id}/links"), Some(&body))
            .await?;

        let link = Link::from_doc(project_id, &doc);
        let link_id = link.id().ok_or_else(|| missing_id("link"))?;
        let endpoints = link.endpoints().unwrap_or([a, b]);

        self.index.register(project_id, ChildKind::Link, link_id)?;
        self.index.bind_link(link_id, endpoints)?;
        self.links.insert(link_id, link.clone());
        tracing::info!("created link {}", link_id);
        Ok(link)
    }

    /// Delete a link. Idempotent; frees both endpoint ports locally.
    pub async fn delete_link(&mut self, link_id: Uuid) -> Result<()> {
        let Some(link) = self.links.get(&link_id) else {
            return Err(ClientError::Validation(format!("unknown link {link_id}")));
        };
        if link.state() == EntityState::Deleted {
            return Ok(());
        }
        let project_id = link.project_id;

        match self
            .http
            .delete(&format!("/v2/projects/{project_id}/links/{link_id}"))
            .await
        {
            Ok(_) | Err(ClientError::NotFound) => {
                self.index.unregister(project_id, ChildKind::Link, link_id);
                if let Some(link) = self.links.get_mut(&link_id) {
                    link.meta_mut().mark_deleted();
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Drawings
    // =========================================================================

    /// Create a drawing in a project
    pub async fn create_drawing(
        &mut self,
        project_id: Uuid,
        spec: &DrawingSpec,
    ) -> Result<Drawing> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        let doc = self
            .http
            .post(
                &format!("/v2/projects/{project_id}/drawings"),
                Some(&spec.to_body()),
            )
            .await?;

        let drawing = Drawing::from_doc(project_id, &doc);
        let drawing_id = drawing.id().ok_or_else(|| missing_id("drawing"))?;

        self.index
            .register(project_id, ChildKind::Drawing, drawing_id)?;
        self.drawings.insert(drawing_id, drawing.clone());
        Ok(drawing)
    }

    /// Send a partial update for a drawing; conflict leaves the cache stale
    pub async fn update_drawing(&mut self, drawing_id: Uuid, patch: Value) -> Result<Drawing> {
        let drawing = self
            .drawings
            .get(&drawing_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown drawing {drawing_id}")))?;
        drawing.meta().require_bound(Drawing::KIND)?;
        let project_id = drawing.project_id;

        match self
            .http
            .put(
                &format!("/v2/projects/{project_id}/drawings/{drawing_id}"),
                &patch,
            )
            .await
        {
            Ok(doc) => {
                let drawing = self
                    .drawings
                    .get_mut(&drawing_id)
                    .ok_or_else(|| missing_id("drawing"))?;
                drawing.apply(&doc);
                drawing.meta_mut().mark_bound();
                Ok(drawing.clone())
            }
            Err(ClientError::Conflict) => {
                if let Some(drawing) = self.drawings.get_mut(&drawing_id) {
                    drawing.meta_mut().mark_stale();
                }
                Err(ClientError::Conflict)
            }
            Err(ClientError::NotFound) => {
                if let Some(drawing) = self.drawings.get_mut(&drawing_id) {
                    drawing.meta_mut().mark_deleted();
                }
                self.index
                    .unregister(project_id, ChildKind::Drawing, drawing_id);
                Err(ClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete a drawing. Idempotent.
    pub async fn delete_drawing(&mut self, drawing_id: Uuid) -> Result<()> {
        let Some(drawing) = self.drawings.get(&drawing_id) else {
            return Err(ClientError::Validation(format!(
                "unknown drawing {drawing_id}"
            )));
        };
        if drawing.state() == EntityState::Deleted {
            return Ok(());
        }
        let project_id = drawing.project_id;

        match self
            .http
            .delete(&format!("/v2/projects/{project_id}/drawings/{drawing_id}"))
            .await
        {
            Ok(_) | Err(ClientError::NotFound) => {
                self.index
                    .unregister(project_id, ChildKind::Drawing, drawing_id);
                if let Some(drawing) = self.drawings.get_mut(&drawing_id) {
                    drawing.meta_mut().mark_deleted();
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Snapshot creation protocol: the project must be fully synced (Bound,
    /// not Stale) before the capture call goes out.
    pub async fn create_snapshot(&mut self, project_id: Uuid, name: &str) -> Result<Snapshot> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_live(Project::KIND)?;
        if project.state() != EntityState::Bound {
            return Err(ClientError::Validation(format!(
                "project {project_id} is not fully synced; refresh it before snapshotting"
            )));
        }

        let doc = self
            .http
            .post(
                &format!("/v2/projects/{project_id}/snapshots"),
                Some(&json!({ "name": name })),
            )
            .await?;

        let snapshot = Snapshot::from_doc(project_id, &doc);
        let snapshot_id = snapshot.id().ok_or_else(|| missing_id("snapshot"))?;
        self.snapshots.insert(snapshot_id, snapshot.clone());
        tracing::info!("created snapshot {} ({})", snapshot.name, snapshot_id);
        Ok(snapshot)
    }

    /// List snapshots of a project and reconcile the local set
    pub async fn list_snapshots(&mut self, project_id: Uuid) -> Result<Vec<Snapshot>> {
        let project = self
            .projects
            .get(&project_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown project {project_id}")))?;
        project.meta().require_bound(Project::KIND)?;

        let docs = as_array(
            self.http
                .get(&format!("/v2/projects/{project_id}/snapshots"))
                .await?,
        );

        let mut remote = Vec::new();
        let mut listed = Vec::new();
        for doc in &docs {
            let Some(snapshot_id) = uuid_field(doc, "snapshot_id") else {
                tracing::warn!("dropping snapshot listing entry without an id");
                continue;
            };
            remote.push(snapshot_id);
            match self.snapshots.get_mut(&snapshot_id) {
                Some(snapshot) => {
                    snapshot.apply(doc);
                    snapshot.meta_mut().mark_bound();
                }
                None => {
                    self.snapshots
                        .insert(snapshot_id, Snapshot::from_doc(project_id, doc));
                }
            }
            listed.push(self.snapshots[&snapshot_id].clone());
        }

        for (snapshot_id, snapshot) in self.snapshots.iter_mut() {
            if snapshot.project_id == project_id && !remote.contains(snapshot_id) {
                snapshot.meta_mut().mark_deleted();
            }
        }

        Ok(listed)
    }

    /// Restore a snapshot, then force a full project refresh: every local
    /// node/link/drawing cache for the project is invalidated by the restore.
    pub async fn restore_snapshot(&mut self, snapshot_id: Uuid) -> Result<Project> {
        let snapshot = self
            .snapshots
            .get(&snapshot_id)
            .ok_or_else(|| ClientError::Validation(format!("unknown snapshot {snapshot_id}")))?;
        snapshot.meta().require_bound(Snapshot::KIND)?;
        let project_id = snapshot.project_id;

        self.http
            .post(
                &format!("/v2/projects/{project_id}/snapshots/{snapshot_id}/restore"),
                None,
            )
            .await?;

        self.refresh_project(project_id).await
    }

    /// Delete a snapshot. Idempotent.
    pub async fn delete_snapshot(&mut self, snapshot_id: Uuid) -> Result<()> {
        let Some(snapshot) = self.snapshots.get(&snapshot_id) else {
            return Err(ClientError::Validation(format!(
                "unknown snapshot {snapshot_id}"
            )));
        };
        if snapshot.state() == EntityState::Deleted {
            return Ok(());
        }
        let project_id = snapshot.project_id;

        match self
            .http
            .delete(&format!("/v2/projects/{project_id}/snapshots/{snapshot_id}"))
            .await
        {
            Ok(_) | Err(ClientError::NotFound) => {
                if let Some(snapshot) = self.snapshots.get_mut(&snapshot_id) {
                    snapshot.meta_mut().mark_deleted();
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    async fn reconcile_nodes(&mut self, project_id: Uuid) -> Result<()> {
        let docs = as_array(
            self.http
                .get(&format!("/v2/projects/{project_id}/nodes"))
                .await?,
        );

        let mut remote = Vec::new();
        let mut upserts = Vec::new();
        for doc in docs {
            let Some(node_id) = uuid_field(&doc, "node_id") else {
                tracing::warn!("dropping node listing entry without an id");
                continue;
            };
            if let Some(doc_project) = uuid_field(&doc, "project_id") {
                if doc_project != project_id {
                    // Index invariant: never register a child under a parent
                    // it does not reference
                    tracing::warn!(
                        "dropping node {} referencing foreign project {}",
                        node_id,
                        doc_project
                    );
                    continue;
                }
            }
            remote.push(node_id);
            upserts.push((node_id, doc));
        }

        // Removals first so freed ports cannot collide with re-listed links
        let local: Vec<Uuid> = self.index.children_of(project_id, ChildKind::Node).to_vec();
        for node_id in local {
            if !remote.contains(&node_id) {
                tracing::debug!("node {} vanished from the controller", node_id);
                self.index.unregister(project_id, ChildKind::Node, node_id);
                if let Some(node) = self.nodes.get_mut(&node_id) {
                    node.meta_mut().mark_deleted();
                }
            }
        }

        for (node_id, doc) in upserts {
            match self.nodes.get_mut(&node_id) {
                Some(node) => {
                    node.apply(&doc);
                    node.meta_mut().mark_bound();
                }
                None => {
                    self.nodes.insert(node_id, Node::from_doc(project_id, &doc));
                }
            }
            self.index.register(project_id, ChildKind::Node, node_id)?;
            let refs = self
                .nodes
                .get(&node_id)
                .map(|n| n.port_refs())
                .unwrap_or_default();
            self.index.set_ports(node_id, refs);
        }

        Ok(())
    }

    async fn reconcile_links(&mut self, project_id: Uuid) -> Result<()> {
        let docs = as_array(
            self.http
                .get(&format!("/v2/projects/{project_id}/links"))
                .await?,
        );

        let mut remote = Vec::new();
        let mut upserts = Vec::new();
        for doc in docs {
            let Some(link_id) = uuid_field(&doc, "link_id") else {
                tracing::warn!("dropping link listing entry without an id");
                continue;
            };
            if let Some(doc_project) = uuid_field(&doc, "project_id") {
                if doc_project != project_id {
                    tracing::warn!(
                        "dropping link {} referencing foreign project {}",
                        link_id,
                        doc_project
                    );
                    continue;
                }
            }
            remote.push(link_id);
            upserts.push((link_id, doc));
        }

        let local: Vec<Uuid> = self.index.children_of(project_id, ChildKind::Link).to_vec();
        for link_id in local {
            if !remote.contains(&link_id) {
                tracing::debug!("link {} vanished from the controller", link_id);
                self.index.unregister(project_id, ChildKind::Link, link_id);
                if let Some(link) = self.links.get_mut(&link_id) {
                    link.meta_mut().mark_deleted();
                }
            }
        }

        // An external edit may have moved a link onto ports another surviving
        // link held locally; free every listed link's ports first so occupancy
        // is rebuilt purely from the listing
        for (link_id, _) in &upserts {
            self.index.release_link(*link_id);
        }

        for (link_id, doc) in upserts {
            let link = Link::from_doc(project_id, &doc);
            let Some(endpoints) = link.endpoints() else {
                tracing::warn!("dropping link {} with malformed endpoints", link_id);
                continue;
            };

            // Both endpoints must reference nodes the index knows; a child
            // referencing an unknown parent is dropped, not fatal
            if let Err(err) = self.index.bind_link(link_id, endpoints) {
                tracing::warn!("dropping link {} from index: {}", link_id, err);
                self.index.unregister(project_id, ChildKind::Link, link_id);
                continue;
            }

            match self.links.get_mut(&link_id) {
                Some(existing) => {
                    existing.apply(&doc);
                    existing.meta_mut().mark_bound();
                }
                None => {
                    self.links.insert(link_id, link);
                }
            }
            self.index.register(project_id, ChildKind::Link, link_id)?;
        }

        Ok(())
    }

    async fn reconcile_drawings(&mut self, project_id: Uuid) -> Result<()> {
        let docs = as_array(
            self.http
                .get(&format!("/v2/projects/{project_id}/drawings"))
                .await?,
        );

        let mut remote = Vec::new();
        let mut upserts = Vec::new();
        for doc in docs {
            let Some(drawing_id) = uuid_field(&doc, "drawing_id") else {
                tracing::warn!("dropping drawing listing entry without an id");
                continue;
            };
            if let Some(doc_project) = uuid_field(&doc, "project_id") {
                if doc_project != project_id {
                    tracing::warn!(
                        "dropping drawing {} referencing foreign project {}",
                        drawing_id,
                        doc_project
                    );
                    continue;
                }
            }
            remote.push(drawing_id);
            upserts.push((drawing_id, doc));
        }

        let local: Vec<Uuid> = self
            .index
            .children_of(project_id, ChildKind::Drawing)
            .to_vec();
        for drawing_id in local {
            if !remote.contains(&drawing_id) {
                tracing::debug!("drawing {} vanished from the controller", drawing_id);
                self.index
                    .unregister(project_id, ChildKind::Drawing, drawing_id);
                if let Some(drawing) = self.drawings.get_mut(&drawing_id) {
                    drawing.meta_mut().mark_deleted();
                }
            }
        }

        for (drawing_id, doc) in upserts {
            match self.drawings.get_mut(&drawing_id) {
                Some(drawing) => {
                    drawing.apply(&doc);
                    drawing.meta_mut().mark_bound();
                }
                None => {
                    self.drawings
                        .insert(drawing_id, Drawing::from_doc(project_id, &doc));
                }
            }
            self.index
                .register(project_id, ChildKind::Drawing, drawing_id)?;
        }

        Ok(())
    }
}
