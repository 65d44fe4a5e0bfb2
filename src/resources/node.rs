//! Nodes: simulated device instances inside a project
//!
//! A node belongs to exactly one project and references exactly one compute.
//! Its ports are derived from the node document the controller returns,
//! never created independently. Status changes only through the start/stop/
//! suspend calls, not by editing local fields.

use crate::entity::{str_field, uuid_field, Entity, EntityMeta};
use crate::index::PortRef;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Power state reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    Stopped,
    Started,
    Suspended,
}

impl NodeStatus {
    fn parse(s: &str) -> Self {
        match s {
            "started" => NodeStatus::Started,
            "suspended" => NodeStatus::Suspended,
            _ => NodeStatus::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Stopped => "stopped",
            NodeStatus::Started => "started",
            NodeStatus::Suspended => "suspended",
        }
    }
}

/// A connection point on a node, target of at most one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePort {
    pub name: String,
    pub adapter_number: u32,
    pub port_number: u32,
    pub link_type: String,
}

impl NodePort {
    fn from_doc(doc: &Value) -> Self {
        Self {
            name: str_field(doc, "name", "-"),
            adapter_number: doc
                .get("adapter_number")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            port_number: doc
                .get("port_number")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            link_type: str_field(doc, "link_type", "ethernet"),
        }
    }
}

/// A node on the controller
#[derive(Debug, Clone)]
pub struct Node {
    meta: EntityMeta,
    pub project_id: Uuid,
    pub compute_id: String,
    pub name: String,
    pub node_type: String,
    pub status: NodeStatus,
    /// Template-derived configuration, kept opaque
    pub properties: Value,
    ports: Vec<NodePort>,
}

impl Node {
    pub(crate) fn from_doc(project_id: Uuid, doc: &Value) -> Self {
        let mut node = Self {
            meta: EntityMeta::unbound(),
            project_id,
            compute_id: String::new(),
            name: String::new(),
            node_type: String::new(),
            status: NodeStatus::Stopped,
            properties: Value::Null,
            ports: Vec::new(),
        };
        node.apply(doc);
        node
    }

    /// Ports in controller order
    pub fn ports(&self) -> &[NodePort] {
        &self.ports
    }

    /// Port identities for the relationship index. Empty until the node is
    /// bound, since an unbound node has no stable key.
    pub fn port_refs(&self) -> Vec<PortRef> {
        let Some(node_id) = self.id() else {
            return Vec::new();
        };
        self.ports
            .iter()
            .map(|p| PortRef {
                node_id,
                adapter_number: p.adapter_number,
                port_number: p.port_number,
            })
            .collect()
    }

    /// Look up a port by adapter and port number
    pub fn port(&self, adapter_number: u32, port_number: u32) -> Option<&NodePort> {
        self.ports
            .iter()
            .find(|p| p.adapter_number == adapter_number && p.port_number == port_number)
    }
}

impl Entity for Node {
    const KIND: &'static str = "node";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn apply(&mut self, doc: &Value) {
        if let Some(id) = uuid_field(doc, "node_id") {
            self.meta.bind(id);
        }
        if let Some(project_id) = uuid_field(doc, "project_id") {
            self.project_id = project_id;
        }
        if let Some(compute_id) = doc.get("compute_id").and_then(|v| v.as_str()) {
            self.compute_id = compute_id.to_string();
        }
        if let Some(name) = doc.get("name").and_then(|v| v.as_str()) {
            self.name = name.to_string();
        }
        if let Some(node_type) = doc.get("node_type").and_then(|v| v.as_str()) {
            self.node_type = node_type.to_string();
        }
        self.status = NodeStatus::parse(&str_field(doc, "status", self.status.as_str()));
        if let Some(properties) = doc.get("properties") {
            self.properties = properties.clone();
        }
        if let Some(ports) = doc.get("ports").and_then(|v| v.as_array()) {
            self.ports = ports.iter().map(NodePort::from_doc).collect();
        }
    }
}

/// Creation request for a node
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub node_type: String,
    pub compute_id: String,
    pub properties: Option<Value>,
    pub x: i64,
    pub y: i64,
}

impl NodeSpec {
    pub fn new(name: &str, node_type: &str, compute_id: &str) -> Self {
        Self {
            name: name.to_string(),
            node_type: node_type.to_string(),
            compute_id: compute_id.to_string(),
            properties: None,
            x: 0,
            y: 0,
        }
    }

    pub fn properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn position(mut self, x: i64, y: i64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Request body for the node-create call, compute reference embedded
    pub(crate) fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("name".to_string(), json!(self.name));
        body.insert("node_type".to_string(), json!(self.node_type));
        body.insert("compute_id".to_string(), json!(self.compute_id));
        body.insert("x".to_string(), json!(self.x));
        body.insert("y".to_string(), json!(self.y));
        if let Some(properties) = &self.properties {
            body.insert("properties".to_string(), properties.clone());
        }
        Value::Object(body)
    }
}
