//! Relationship Index
//!
//! In-memory mapping from parent entities to their dependent children:
//! project -> nodes/links/drawings, node -> ports, port -> occupying link.
//! Keyed by stable identifiers instead of embedded mutual references, so the
//! ownership graph stays acyclic. The index never issues remote calls; it
//! only mirrors what the synchronizer has confirmed with the controller.
//!
//! Invariants:
//! - a child is only registered under a parent the index already knows;
//! - a port is occupied by at most one link at a time;
//! - unregistering a parent cascades to its children (in memory only).

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identity of a node port. Ports carry no server id of their own; the
/// `(node, adapter, port)` triple is also the shape the link endpoints use
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node_id: Uuid,
    pub adapter_number: u32,
    pub port_number: u32,
}

/// Child kinds a project can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Node,
    Link,
    Drawing,
}

#[derive(Debug, Default)]
struct ProjectChildren {
    nodes: Vec<Uuid>,
    links: Vec<Uuid>,
    drawings: Vec<Uuid>,
}

impl ProjectChildren {
    fn of(&self, kind: ChildKind) -> &Vec<Uuid> {
        match kind {
            ChildKind::Node => &self.nodes,
            ChildKind::Link => &self.links,
            ChildKind::Drawing => &self.drawings,
        }
    }

    fn of_mut(&mut self, kind: ChildKind) -> &mut Vec<Uuid> {
        match kind {
            ChildKind::Node => &mut self.nodes,
            ChildKind::Link => &mut self.links,
            ChildKind::Drawing => &mut self.drawings,
        }
    }
}

/// Children dropped by a cascading unregister, so the caller can mark the
/// corresponding entities deleted in its stores
#[derive(Debug, Default)]
pub struct RemovedChildren {
    pub nodes: Vec<Uuid>,
    pub links: Vec<Uuid>,
    pub drawings: Vec<Uuid>,
}

/// Parent/child and link/port relationship index
#[derive(Debug, Default)]
pub struct RelationshipIndex {
    projects: HashMap<Uuid, ProjectChildren>,
    node_ports: HashMap<Uuid, Vec<PortRef>>,
    link_endpoints: HashMap<Uuid, [PortRef; 2]>,
    port_links: HashMap<PortRef, Uuid>,
}

impl RelationshipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a project. Idempotent.
    pub fn insert_project(&mut self, project_id: Uuid) {
        self.projects.entry(project_id).or_default();
    }

    pub fn contains_project(&self, project_id: Uuid) -> bool {
        self.projects.contains_key(&project_id)
    }

    /// Register a child under a project. Fails if the project is unknown;
    /// re-registering an existing child keeps its position.
    pub fn register(&mut self, project_id: Uuid, kind: ChildKind, child: Uuid) -> Result<()> {
        let children = self.projects.get_mut(&project_id).ok_or_else(|| {
            ClientError::InconsistentState(format!(
                "cannot register {kind:?} {child} under unknown project {project_id}"
            ))
        })?;

        let slot = children.of_mut(kind);
        if !slot.contains(&child) {
            slot.push(child);
        }
        Ok(())
    }

    /// Remove a child from a project, cascading ports (for nodes) and port
    /// occupancy (for links). In-memory only.
    pub fn unregister(&mut self, project_id: Uuid, kind: ChildKind, child: Uuid) {
        if let Some(children) = self.projects.get_mut(&project_id) {
            children.of_mut(kind).retain(|id| *id != child);
        }
        match kind {
            ChildKind::Node => self.drop_node_ports(child),
            ChildKind::Link => self.release_link(child),
            ChildKind::Drawing => {}
        }
    }

    /// Ordered child ids of a project for one kind
    pub fn children_of(&self, project_id: Uuid, kind: ChildKind) -> &[Uuid] {
        self.projects
            .get(&project_id)
            .map(|children| children.of(kind).as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_child(&self, project_id: Uuid, kind: ChildKind, child: Uuid) -> bool {
        self.children_of(project_id, kind).contains(&child)
    }

    /// Replace the port set of a node (ports are derived from the node
    /// document, never created independently). Occupancy entries for ports
    /// that no longer exist are dropped.
    pub fn set_ports(&mut self, node_id: Uuid, ports: Vec<PortRef>) {
        self.port_links
            .retain(|port, _| port.node_id != node_id || ports.contains(port));
        self.node_ports.insert(node_id, ports);
    }

    /// Ordered ports of a node
    pub fn ports_of(&self, node_id: Uuid) -> &[PortRef] {
        self.node_ports
            .get(&node_id)
            .map(|ports| ports.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_port(&self, port: PortRef) -> bool {
        self.ports_of(port.node_id).contains(&port)
    }

    /// The link currently occupying a port, if any
    pub fn link_at(&self, port: PortRef) -> Option<Uuid> {
        self.port_links.get(&port).copied()
    }

    /// Record a link's two endpoints and mark both ports occupied.
    /// Fails if either port is unknown or already held by another link.
    pub fn bind_link(&mut self, link_id: Uuid, endpoints: [PortRef; 2]) -> Result<()> {
        for port in endpoints {
            if !self.has_port(port) {
                return Err(ClientError::InconsistentState(format!(
                    "link {link_id} references unknown port {port:?}"
                )));
            }
            if let Some(holder) = self.link_at(port) {
                if holder != link_id {
                    return Err(ClientError::InconsistentState(format!(
                        "port {port:?} is already occupied by link {holder}"
                    )));
                }
            }
        }

        // Re-binding the same link first releases its previous endpoints
        self.release_link(link_id);
        for port in endpoints {
            self.port_links.insert(port, link_id);
        }
        self.link_endpoints.insert(link_id, endpoints);
        Ok(())
    }

    /// Forget a link's endpoints and free its ports
    pub fn release_link(&mut self, link_id: Uuid) {
        if let Some(endpoints) = self.link_endpoints.remove(&link_id) {
            for port in endpoints {
                if self.port_links.get(&port) == Some(&link_id) {
                    self.port_links.remove(&port);
                }
            }
        }
    }

    /// The two endpoints of a link, if the link is known
    pub fn endpoints_of(&self, link_id: Uuid) -> Option<[PortRef; 2]> {
        self.link_endpoints.get(&link_id).copied()
    }

    /// Links with at least one endpoint on the given node
    pub fn links_on_node(&self, node_id: Uuid) -> Vec<Uuid> {
        self.link_endpoints
            .iter()
            .filter(|(_, endpoints)| endpoints.iter().any(|p| p.node_id == node_id))
            .map(|(link_id, _)| *link_id)
            .collect()
    }

    /// Remove a project and cascade to all of its children. Returns the
    /// removed child ids so entity stores can be updated to match.
    pub fn unregister_project(&mut self, project_id: Uuid) -> RemovedChildren {
        let Some(children) = self.projects.remove(&project_id) else {
            return RemovedChildren::default();
        };

        for node_id in &children.nodes {
            self.drop_node_ports(*node_id);
        }
        for link_id in &children.links {
            self.release_link(*link_id);
        }

        RemovedChildren {
            nodes: children.nodes,
            links: children.links,
            drawings: children.drawings,
        }
    }

    fn drop_node_ports(&mut self, node_id: Uuid) {
        self.node_ports.remove(&node_id);
        self.port_links.retain(|port, _| port.node_id != node_id);
    }
}
