//! Projects: top-level containers owning nodes, links and drawings

use crate::entity::{str_field, uuid_field, Entity, EntityMeta};
use serde_json::Value;

/// Open/closed state reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectStatus {
    Opened,
    #[default]
    Closed,
}

impl ProjectStatus {
    fn parse(s: &str) -> Self {
        match s {
            "opened" => ProjectStatus::Opened,
            _ => ProjectStatus::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Opened => "opened",
            ProjectStatus::Closed => "closed",
        }
    }
}

/// A project on the controller
#[derive(Debug, Clone)]
pub struct Project {
    meta: EntityMeta,
    pub name: String,
    pub status: ProjectStatus,
}

impl Project {
    /// Build a project from a controller document
    pub(crate) fn from_doc(doc: &Value) -> Self {
        let mut project = Self {
            meta: EntityMeta::unbound(),
            name: String::new(),
            status: ProjectStatus::Closed,
        };
        project.apply(doc);
        project
    }

    pub fn is_open(&self) -> bool {
        self.status == ProjectStatus::Opened
    }
}

impl Entity for Project {
    const KIND: &'static str = "project";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn apply(&mut self, doc: &Value) {
        if let Some(id) = uuid_field(doc, "project_id") {
            self.meta.bind(id);
        }
        if let Some(name) = doc.get("name").and_then(|v| v.as_str()) {
            self.name = name.to_string();
        }
        self.status = ProjectStatus::parse(&str_field(doc, "status", self.status.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityState;
    use serde_json::json;

    #[test]
    fn from_doc_binds_identity() {
        let doc = json!({
            "project_id": "10010203-0405-0607-0809-0a0b0c0d0e0f",
            "name": "lab",
            "status": "opened"
        });
        let project = Project::from_doc(&doc);
        assert!(project.id().is_some());
        assert_eq!(project.state(), EntityState::Bound);
        assert_eq!(project.name, "lab");
        assert!(project.is_open());
    }

    #[test]
    fn unknown_status_defaults_to_closed() {
        let doc = json!({"name": "lab", "status": "weird"});
        let project = Project::from_doc(&doc);
        assert_eq!(project.status, ProjectStatus::Closed);
        assert_eq!(project.state(), EntityState::Unbound);
    }
}
