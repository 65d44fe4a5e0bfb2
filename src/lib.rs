//! Client library for the GNS3 controller REST API
//!
//! Mirrors remote topology state into local entities and translates local
//! mutations into ordered REST calls against the controller.
//!
//! # Module Structure
//!
//! - [`config`] - Controller endpoint and credential configuration
//! - [`http`] - Authenticated HTTP transport
//! - [`entity`] - Shared entity lifecycle (Unbound/Bound/Stale/Deleted)
//! - [`index`] - Relationship index: project children, node ports, link occupancy
//! - [`resources`] - Per-kind entity types and JSON mapping
//! - [`sync`] - Synchronization protocols (create/refresh/update/delete)
//! - [`controller`] - Top-level facade
//!
//! # Example
//!
//! ```ignore
//! use gns3_client::{Controller, ControllerConfig, NodeSpec};
//!
//! async fn example() -> gns3_client::Result<()> {
//!     let config = ControllerConfig::discover();
//!     let mut controller = Controller::connect(&config).await?;
//!     let project = controller.create_project("lab").await?;
//!     let node = controller
//!         .create_node(project.id().unwrap(), &NodeSpec::new("r1", "vpcs", "local"))
//!         .await?;
//!     println!("{} has {} ports", node.name, node.ports().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod http;
pub mod index;
pub mod resources;
pub mod sync;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerVersion};
pub use entity::{Entity, EntityState};
pub use error::{ClientError, Result};
pub use index::{ChildKind, PortRef, RelationshipIndex};
pub use resources::{
    Compute, ComputeCapabilities, Drawing, DrawingSpec, Image, Link, Node, NodePort, NodeSpec,
    NodeStatus, Project, ProjectStatus, Snapshot, Vm, VmEngine,
};
pub use sync::Synchronizer;
