//! HTTP transport for controller REST API calls
//!
//! Thin gateway around [`reqwest`]: attaches basic-auth credentials, maps
//! status codes onto [`ClientError`] kinds and hands parsed JSON back to the
//! synchronization layer. Nothing here retries; transport failures surface
//! verbatim.

use crate::config::ControllerConfig;
use crate::error::{ClientError, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body kept in logs and error messages
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate and strip a response body before logging it
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // The cut must land on a char boundary or slicing panics
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for controller API calls
#[derive(Clone)]
pub struct ControllerHttp {
    client: Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl ControllerHttp {
    /// Create a new transport from controller settings
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gns3-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// Issue a request against an API path such as `/v2/projects`.
    ///
    /// Maps 404 to [`ClientError::NotFound`] and 409 to
    /// [`ClientError::Conflict`]; other non-2xx statuses become
    /// [`ClientError::Http`]. An empty 2xx body yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, path);

        let mut request = self.client.request(method, &url);

        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(ClientError::Transport)?;

        let status = response.status();
        let text = response.text().await.map_err(ClientError::Transport)?;

        match status {
            StatusCode::NOT_FOUND => {
                tracing::debug!("controller has no such resource: {}", path);
                return Err(ClientError::NotFound);
            }
            StatusCode::CONFLICT => {
                tracing::debug!("controller conflict on {}: {}", path, sanitize_for_log(&text));
                return Err(ClientError::Conflict);
            }
            status if !status.is_success() => {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
                return Err(ClientError::Http {
                    status: status.as_u16(),
                    body: sanitize_for_log(&text),
                });
            }
            _ => {}
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// GET a controller path
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None, &[]).await
    }

    /// POST to a controller path, with an optional JSON body
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::POST, path, body, &[]).await
    }

    /// PUT a JSON document to a controller path
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body), &[]).await
    }

    /// DELETE a controller path
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None, &[]).await
    }
}
