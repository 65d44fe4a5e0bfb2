//! Resource entity lifecycle
//!
//! Every remote-backed object carries an [`EntityMeta`] tracking its
//! server-assigned identity and lifecycle state. The state machine is:
//!
//! ```text
//! Unbound --create--> Bound <--refresh--> Stale
//!    |                  |                   |
//!    +------------------+--delete/404------>+--> Deleted (terminal)
//! ```
//!
//! Identity is immutable once assigned. An `Unbound` entity has no id and is
//! never visible in the relationship index.

use crate::error::{ClientError, Result};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a remote-backed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Created locally, no server id yet
    Unbound,
    /// Has a server id; cache reflects the last successful response
    Bound,
    /// Has a server id but the cache is known to possibly differ from the
    /// server (e.g. after a rejected update)
    Stale,
    /// Gone, locally or remotely. Terminal.
    Deleted,
}

impl EntityState {
    /// `Deleted` is terminal; every other state can return to `Bound`
    pub(crate) fn into_bound(self) -> Self {
        if self == EntityState::Deleted {
            self
        } else {
            EntityState::Bound
        }
    }

    /// `Stale` is only reachable from `Bound`
    pub(crate) fn into_stale(self) -> Self {
        if self == EntityState::Bound {
            EntityState::Stale
        } else {
            self
        }
    }
}

/// Identity + lifecycle state shared by all entity kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    id: Option<Uuid>,
    state: EntityState,
}

impl EntityMeta {
    /// A locally constructed entity with no server identity
    pub fn unbound() -> Self {
        Self {
            id: None,
            state: EntityState::Unbound,
        }
    }

    /// An entity already known to the server
    pub fn bound(id: Uuid) -> Self {
        Self {
            id: Some(id),
            state: EntityState::Bound,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Assign the server id after a successful create. Ids never change once
    /// set; a second bind with a different id is ignored.
    pub fn bind(&mut self, id: Uuid) {
        if self.id.is_none() {
            self.id = Some(id);
        }
        if self.state == EntityState::Unbound {
            self.state = EntityState::Bound;
        }
    }

    pub fn mark_bound(&mut self) {
        self.state = self.state.into_bound();
    }

    pub fn mark_stale(&mut self) {
        self.state = self.state.into_stale();
    }

    pub fn mark_deleted(&mut self) {
        self.state = EntityState::Deleted;
    }

    /// Fail with `Gone` if the entity has been deleted
    pub fn require_live(&self, kind: &'static str) -> Result<()> {
        if self.state == EntityState::Deleted {
            return Err(ClientError::Gone {
                kind,
                id: self
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<unbound>".to_string()),
            });
        }
        Ok(())
    }

    /// Fail unless the entity is live and has a server id
    pub fn require_bound(&self, kind: &'static str) -> Result<Uuid> {
        self.require_live(kind)?;
        self.id.ok_or_else(|| {
            ClientError::Validation(format!("{kind} has not been created on the controller yet"))
        })
    }
}

/// Contract shared by every entity kind.
///
/// `apply` overwrites the local cache from a controller document and binds
/// the server id if the document carries one.
pub trait Entity {
    const KIND: &'static str;

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
    fn apply(&mut self, doc: &Value);

    fn id(&self) -> Option<Uuid> {
        self.meta().id()
    }

    fn state(&self) -> EntityState {
        self.meta().state()
    }
}

/// Pull a UUID field out of a controller document
pub(crate) fn uuid_field(doc: &Value, field: &str) -> Option<Uuid> {
    doc.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Pull a string field out of a controller document, with a default
pub(crate) fn str_field(doc: &Value, field: &str, default: &str) -> String {
    doc.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}
