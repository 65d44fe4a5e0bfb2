//! Snapshots: point-in-time captures of a project

use crate::entity::{str_field, uuid_field, Entity, EntityMeta};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A snapshot on the controller
#[derive(Debug, Clone)]
pub struct Snapshot {
    meta: EntityMeta,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub(crate) fn from_doc(project_id: Uuid, doc: &Value) -> Self {
        let mut snapshot = Self {
            meta: EntityMeta::unbound(),
            project_id,
            name: String::new(),
            created_at: None,
        };
        snapshot.apply(doc);
        snapshot
    }
}

impl Entity for Snapshot {
    const KIND: &'static str = "snapshot";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn apply(&mut self, doc: &Value) {
        if let Some(id) = uuid_field(doc, "snapshot_id") {
            self.meta.bind(id);
        }
        if let Some(project_id) = uuid_field(doc, "project_id") {
            self.project_id = project_id;
        }
        self.name = str_field(doc, "name", "-");
        // The controller reports creation time as unix seconds
        if let Some(seconds) = doc
            .get("created_at")
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
        {
            self.created_at = DateTime::from_timestamp(seconds, 0);
        }
    }
}
