//! Drawings: visual annotations on the project canvas, no node relationships

use crate::entity::{uuid_field, Entity, EntityMeta};
use serde_json::{json, Value};
use uuid::Uuid;

/// A drawing on the controller
#[derive(Debug, Clone)]
pub struct Drawing {
    meta: EntityMeta,
    pub project_id: Uuid,
    pub svg: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub rotation: i64,
}

impl Drawing {
    pub(crate) fn from_doc(project_id: Uuid, doc: &Value) -> Self {
        let mut drawing = Self {
            meta: EntityMeta::unbound(),
            project_id,
            svg: String::new(),
            x: 0,
            y: 0,
            z: 1,
            rotation: 0,
        };
        drawing.apply(doc);
        drawing
    }
}

impl Entity for Drawing {
    const KIND: &'static str = "drawing";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn apply(&mut self, doc: &Value) {
        if let Some(id) = uuid_field(doc, "drawing_id") {
            self.meta.bind(id);
        }
        if let Some(project_id) = uuid_field(doc, "project_id") {
            self.project_id = project_id;
        }
        if let Some(svg) = doc.get("svg").and_then(|v| v.as_str()) {
            self.svg = svg.to_string();
        }
        for (field, slot) in [
            ("x", &mut self.x),
            ("y", &mut self.y),
            ("z", &mut self.z),
            ("rotation", &mut self.rotation),
        ] {
            if let Some(value) = doc.get(field).and_then(|v| v.as_i64()) {
                *slot = value;
            }
        }
    }
}

/// Creation request for a drawing
#[derive(Debug, Clone)]
pub struct DrawingSpec {
    pub svg: String,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub rotation: i64,
}

impl DrawingSpec {
    pub fn new(svg: &str) -> Self {
        Self {
            svg: svg.to_string(),
            x: 0,
            y: 0,
            z: 1,
            rotation: 0,
        }
    }

    pub fn position(mut self, x: i64, y: i64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub(crate) fn to_body(&self) -> Value {
        json!({
            "svg": self.svg,
            "x": self.x,
            "y": self.y,
            "z": self.z,
            "rotation": self.rotation,
        })
    }
}
