//! Links: connections between two node ports
//!
//! A link references its endpoint ports weakly; it never owns them. Both
//! endpoints must belong to nodes of the link's own project, which the
//! synchronizer enforces before any create call goes out.

use crate::entity::{uuid_field, Entity, EntityMeta};
use crate::index::PortRef;
use serde_json::Value;
use uuid::Uuid;

/// A link on the controller
#[derive(Debug, Clone)]
pub struct Link {
    meta: EntityMeta,
    pub project_id: Uuid,
    endpoints: Option<[PortRef; 2]>,
}

impl Link {
    pub(crate) fn from_doc(project_id: Uuid, doc: &Value) -> Self {
        let mut link = Self {
            meta: EntityMeta::unbound(),
            project_id,
            endpoints: None,
        };
        link.apply(doc);
        link
    }

    /// The two endpoint ports, if the controller document carried them
    pub fn endpoints(&self) -> Option<[PortRef; 2]> {
        self.endpoints
    }

    fn parse_endpoint(doc: &Value) -> Option<PortRef> {
        Some(PortRef {
            node_id: uuid_field(doc, "node_id")?,
            adapter_number: doc.get("adapter_number").and_then(|v| v.as_u64())? as u32,
            port_number: doc.get("port_number").and_then(|v| v.as_u64())? as u32,
        })
    }
}

impl Entity for Link {
    const KIND: &'static str = "link";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn apply(&mut self, doc: &Value) {
        if let Some(id) = uuid_field(doc, "link_id") {
            self.meta.bind(id);
        }
        if let Some(project_id) = uuid_field(doc, "project_id") {
            self.project_id = project_id;
        }
        if let Some(nodes) = doc.get("nodes").and_then(|v| v.as_array()) {
            let parsed: Vec<PortRef> = nodes.iter().filter_map(Self::parse_endpoint).collect();
            if let [a, b] = parsed.as_slice() {
                self.endpoints = Some([*a, *b]);
            }
        }
    }
}

/// Wire shape of a link-create request: both endpoint references
pub(crate) fn link_body(endpoints: [PortRef; 2]) -> Value {
    serde_json::json!({
        "nodes": endpoints
            .iter()
            .map(|p| {
                serde_json::json!({
                    "node_id": p.node_id.to_string(),
                    "adapter_number": p.adapter_number,
                    "port_number": p.port_number,
                })
            })
            .collect::<Vec<_>>()
    })
}
