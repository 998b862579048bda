use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;

/// The analysis endpoint can take up to a minute; requests must outlive it.
pub const ANALYSIS_LATENCY: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(65);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} timed out after {}s", .after.as_secs())]
    Timeout { path: String, after: Duration },
    #[error("no response from {path}: {reason}")]
    NoResponse { path: String, reason: String },
    #[error("{path} returned HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status {
        path: String,
        status: u16,
        detail: Option<String>,
    },
    #[error("malformed response from {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("failed to build http client")]
    Build(#[source] reqwest::Error),
}

impl TransportError {
    /// True when the service never answered, as opposed to answering with
    /// an error.
    pub fn is_no_response(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::NoResponse { .. }
        )
    }
}

/// Request/response access to the analysis service.
///
/// Paths are relative to the service root; bodies are returned as raw JSON
/// so callers can cope with whatever shape comes back.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError>;

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError>;
}

/// [`Transport`] over HTTP with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        if timeout <= ANALYSIS_LATENCY {
            warn!(
                timeout_secs = timeout.as_secs(),
                analysis_latency_secs = ANALYSIS_LATENCY.as_secs(),
                "request timeout does not cover analysis latency"
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(TransportError::Build)?;

        let base_url = base_url.into().trim_end_matches('/').to_owned();
        info!(%base_url, timeout_secs = timeout.as_secs(), "HTTP transport initialized");

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, TransportError> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");

        let response = self
            .client
            .request(method, &url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            warn!(%status, path, detail = detail.as_deref().unwrap_or(""), "service returned an error");
            return Err(TransportError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                detail,
            });
        }

        info!(%status, path, "response received");

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(path, e)
            } else {
                warn!(path, error = %e, "response body is not JSON");
                TransportError::Decode {
                    path: path.to_owned(),
                    reason: e.to_string(),
                }
            }
        })
    }

    fn request_error(&self, path: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            warn!(path, timeout_secs = self.timeout.as_secs(), "request timed out");
            TransportError::Timeout {
                path: path.to_owned(),
                after: self.timeout,
            }
        } else {
            warn!(path, error = %error, "request failed without a response");
            TransportError::NoResponse {
                path: path.to_owned(),
                reason: error.to_string(),
            }
        }
    }
}

/// FastAPI puts the reason for an error status under `detail`.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        self.send(Method::GET, path, query).await
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        self.send(Method::POST, path, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_extracted_from_error_bodies() {
        assert_eq!(
            error_detail(r#"{"detail": "Respuesta con ID 9 no encontrada"}"#).as_deref(),
            Some("Respuesta con ID 9 no encontrada")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["query"]}]}"#).as_deref(),
            Some(r#"[{"loc":["query"]}]"#)
        );
        assert_eq!(error_detail("Internal Server Error"), None);
    }

    #[test]
    fn no_response_classification() {
        let timeout = TransportError::Timeout {
            path: "/procesar-datos".to_owned(),
            after: DEFAULT_TIMEOUT,
        };
        let status = TransportError::Status {
            path: "/modelos".to_owned(),
            status: 500,
            detail: None,
        };

        assert!(timeout.is_no_response());
        assert!(!status.is_no_response());
        assert_eq!(status.to_string(), "/modelos returned HTTP 500: no detail");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("http://localhost:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
    }
}
