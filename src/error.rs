//! Error types for controller API operations

use thiserror::Error;

/// Errors surfaced by the client library.
///
/// Transport and HTTP failures are never retried here; retry policy belongs
/// to the caller. Validation failures are guaranteed to occur before any
/// request reaches the controller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure (connection refused, timeout, TLS)
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// Controller rejected the request with a status other than 404/409
    #[error("controller returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Controller no longer has the resource (HTTP 404)
    #[error("resource not found on the controller")]
    NotFound,

    /// Controller reported a version/state conflict (HTTP 409)
    #[error("controller reported a conflict")]
    Conflict,

    /// Local precondition failed; no request was sent
    #[error("validation failed: {0}")]
    Validation(String),

    /// A relationship index invariant would be violated
    #[error("inconsistent relationship index: {0}")]
    InconsistentState(String),

    /// Operation attempted on an entity already deleted locally
    #[error("{kind} {id} has been deleted")]
    Gone { kind: &'static str, id: String },

    /// Controller response body was not the expected JSON shape
    #[error("failed to decode controller response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Controller URL could not be built
    #[error("invalid controller URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// True when the error means the resource is gone on the server side
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }

    /// True for local precondition failures (no remote call was issued)
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
