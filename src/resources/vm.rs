//! VM engines, VMs and images: capability descriptors independent of projects
//!
//! These are read-only listings. An engine describes a virtualization
//! backend; VMs and images are what node templates reference when a VM
//! engine is selected.

use crate::entity::str_field;
use serde_json::Value;

/// A virtualization backend the controller can drive
#[derive(Debug, Clone)]
pub struct VmEngine {
    pub engine_id: String,
    pub name: String,
    pub description: String,
}

impl From<&Value> for VmEngine {
    fn from(doc: &Value) -> Self {
        Self {
            engine_id: str_field(doc, "engine_id", "-"),
            name: str_field(doc, "name", "-"),
            description: str_field(doc, "description", ""),
        }
    }
}

/// A virtual machine known to one engine
#[derive(Debug, Clone)]
pub struct Vm {
    pub name: String,
}

impl From<&Value> for Vm {
    fn from(doc: &Value) -> Self {
        Self {
            name: str_field(doc, "vmname", "-"),
        }
    }
}

/// A disk image available on a compute for one emulator
#[derive(Debug, Clone)]
pub struct Image {
    pub filename: String,
    pub path: String,
    pub md5sum: Option<String>,
    pub filesize: Option<u64>,
}

impl From<&Value> for Image {
    fn from(doc: &Value) -> Self {
        Self {
            filename: str_field(doc, "filename", "-"),
            path: str_field(doc, "path", ""),
            md5sum: doc.get("md5sum").and_then(|v| v.as_str()).map(String::from),
            filesize: doc.get("filesize").and_then(|v| v.as_u64()),
        }
    }
}
