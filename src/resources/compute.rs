//! Computes: remote execution hosts capable of running nodes
//!
//! Computes have an independent lifecycle and are referenced, never owned,
//! by nodes. Their ids are plain strings; the controller itself registers
//! under the well-known id `"local"`.

use crate::entity::EntityState;
use crate::error::{ClientError, Result};
use serde_json::Value;

/// Capability descriptor reported by a compute
#[derive(Debug, Clone, Default)]
pub struct ComputeCapabilities {
    /// Node types this compute can run (its VM engines)
    pub node_types: Vec<String>,
    pub version: Option<String>,
}

impl ComputeCapabilities {
    fn from_doc(doc: &Value) -> Self {
        Self {
            node_types: doc
                .get("node_types")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            version: doc
                .get("version")
                .and_then(|v| v.as_str())
                .map(String::from),
        }
    }
}

/// A compute registered with the controller
#[derive(Debug, Clone)]
pub struct Compute {
    state: EntityState,
    pub compute_id: String,
    pub name: String,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub connected: bool,
    pub capabilities: ComputeCapabilities,
}

impl Compute {
    pub(crate) fn from_doc(doc: &Value) -> Self {
        let mut compute = Self {
            state: EntityState::Bound,
            compute_id: String::new(),
            name: String::new(),
            protocol: "http".to_string(),
            host: String::new(),
            port: 0,
            connected: false,
            capabilities: ComputeCapabilities::default(),
        };
        compute.apply(doc);
        compute
    }

    pub(crate) fn apply(&mut self, doc: &Value) {
        if let Some(compute_id) = doc.get("compute_id").and_then(|v| v.as_str()) {
            if self.compute_id.is_empty() {
                self.compute_id = compute_id.to_string();
            }
        }
        if let Some(name) = doc.get("name").and_then(|v| v.as_str()) {
            self.name = name.to_string();
        }
        if let Some(protocol) = doc.get("protocol").and_then(|v| v.as_str()) {
            self.protocol = protocol.to_string();
        }
        if let Some(host) = doc.get("host").and_then(|v| v.as_str()) {
            self.host = host.to_string();
        }
        if let Some(port) = doc.get("port").and_then(|v| v.as_u64()) {
            self.port = port as u16;
        }
        self.connected = doc
            .get("connected")
            .and_then(|v| v.as_bool())
            .unwrap_or(self.connected);
        if let Some(capabilities) = doc.get("capabilities") {
            self.capabilities = ComputeCapabilities::from_doc(capabilities);
        }
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub(crate) fn mark_bound(&mut self) {
        self.state = self.state.into_bound();
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = EntityState::Deleted;
    }

    pub(crate) fn require_live(&self) -> Result<()> {
        if self.state == EntityState::Deleted {
            return Err(ClientError::Gone {
                kind: "compute",
                id: self.compute_id.clone(),
            });
        }
        Ok(())
    }
}
