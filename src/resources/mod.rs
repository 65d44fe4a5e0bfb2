//! Entity kinds backed by controller resources
//!
//! One module per resource kind. Each type owns a local cache of the last
//! server document it saw, plus the shared lifecycle metadata from
//! [`crate::entity`]. Field mapping follows the controller's v2 JSON schema;
//! anything not named here is treated as opaque.

mod compute;
mod drawing;
mod link;
mod node;
mod project;
mod snapshot;
mod vm;

pub use compute::{Compute, ComputeCapabilities};
pub use drawing::{Drawing, DrawingSpec};
pub(crate) use link::link_body;
pub use link::Link;
pub use node::{Node, NodePort, NodeSpec, NodeStatus};
pub use project::{Project, ProjectStatus};
pub use snapshot::Snapshot;
pub use vm::{Image, Vm, VmEngine};
