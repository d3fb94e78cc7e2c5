pub mod transport;
#[cfg(test)]
pub mod stub;

pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = concat!("ghpr/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("error connecting to GitHub: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message} ({url})")]
    Status {
        status: u16,
        message: String,
        url: String,
    },

    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQl(Vec<GraphQlError>),

    #[error("GraphQL response contained no data")]
    MissingData,

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl ApiError {
    /// True for a GraphQL error whose every entry is of type NOT_FOUND.
    pub fn is_graphql_not_found(&self) -> bool {
        match self {
            ApiError::GraphQl(errors) => {
                !errors.is_empty()
                    && errors
                        .iter()
                        .all(|e| e.error_type.as_deref() == Some("NOT_FOUND"))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: String,
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct RestErrorBody {
    message: String,
}

/// GitHub API client: base URLs, authentication and response
/// classification on top of an injectable transport.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    host: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(transport: Arc<dyn HttpTransport>, host: impl Into<String>, token: Option<String>) -> Self {
        Self {
            transport,
            host: host.into(),
            token,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn is_dotcom(&self) -> bool {
        self.host.eq_ignore_ascii_case("github.com")
    }

    fn rest_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.is_dotcom() {
            format!("https://api.github.com/{path}")
        } else {
            format!("https://{}/api/v3/{path}", self.host)
        }
    }

    fn graphql_url(&self) -> String {
        if self.is_dotcom() {
            "https://api.github.com/graphql".to_string()
        } else {
            format!("https://{}/api/graphql", self.host)
        }
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        let request = HttpRequest::new(method, url).header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Run a GraphQL query and decode its `data` member.
    #[instrument(skip(self, query, variables), fields(host = %self.host))]
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = self.graphql_url();
        let payload = serde_json::json!({ "query": query, "variables": variables });
        let request = self
            .request(Method::POST, url.clone())
            .header("Content-Type", "application/json; charset=utf-8")
            .body(serde_json::to_vec(&payload)?);

        let response = self.transport.send(request).await?;
        debug!(status = response.status, bytes = response.body.len(), "received GraphQL response");
        if !response.is_success() {
            return Err(status_error(&response, url));
        }

        let envelope: GraphQlEnvelope<T> = serde_json::from_slice(&response.body)?;
        if !envelope.errors.is_empty() {
            return Err(ApiError::GraphQl(envelope.errors));
        }
        envelope.data.ok_or(ApiError::MissingData)
    }

    /// GET a REST resource and return the raw body, negotiating the
    /// representation through the Accept header.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn rest_raw(&self, path: &str, accept: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.rest_url(path);
        let request = self.request(Method::GET, url.clone()).header("Accept", accept);

        let response = self.transport.send(request).await?;
        debug!(status = response.status, bytes = response.body.len(), "received REST response");
        if !response.is_success() {
            return Err(status_error(&response, url));
        }
        Ok(response.body)
    }
}

fn status_error(response: &HttpResponse, url: String) -> ApiError {
    let message = serde_json::from_slice::<RestErrorBody>(&response.body)
        .map(|body| body.message)
        .ok()
        .or_else(|| {
            let text = String::from_utf8_lossy(&response.body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .or_else(|| {
            StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "request failed".to_string());

    ApiError::Status {
        status: response.status,
        message,
        url,
    }
}
