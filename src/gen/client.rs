//! HTTP client for the external text-generation service.
//!
//! Configuration is via environment variables:
//! - `MARGINALIA_SERVICE_URL` - Base URL (default: `http://localhost:5000/api`)
//! - `MARGINALIA_SERVICE_API_KEY` - API key for authentication (optional)
//! - `MARGINALIA_SERVICE_TIMEOUT_SECS` - Per-request timeout (default: 120)

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AnnotationKind, CollectionItem};

/// Default URL for local development.
const DEFAULT_URL: &str = "http://localhost:5000/api";

/// Default per-request timeout. Generation is slow; be patient.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Generation service errors. Timeouts and unreachable-service failures are
/// retryable; the session itself is never poisoned by them.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to generation service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service timed out")]
    Timeout,

    #[error("generation service unreachable: {0}")]
    Unavailable(String),

    #[error("generation service rejected the request: {0}")]
    BadRequest(String),

    #[error("generation service error: {0}")]
    Server(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    text: &'a str,
    kind: AnnotationKind,
    context: &'a str,
}

#[derive(Debug, Serialize)]
struct ItemText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ConsolidateRequest<'a> {
    items: Vec<ItemText<'a>>,
    context: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ConsolidatedResponse {
    #[serde(rename = "consolidatedText")]
    consolidated_text: String,
}

/// HTTP client for the generation service.
#[derive(Debug, Clone)]
pub struct GeneratorClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl GeneratorClient {
    /// Create client from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("MARGINALIA_SERVICE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("MARGINALIA_SERVICE_API_KEY").ok();
        let timeout = std::env::var("MARGINALIA_SERVICE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(base_url, api_key).with_timeout(Duration::from_secs(timeout))
    }

    /// Create with explicit configuration.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a POST request with timeout and optional auth header.
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.post(&url).timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.request(path).json(body).send().await.map_err(|err| {
            if err.is_timeout() {
                ClientError::Timeout
            } else if err.is_connect() {
                ClientError::Unavailable(err.to_string())
            } else {
                ClientError::Http(err)
            }
        })?;
        self.handle_response(response).await
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(body)),
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                    Err(ClientError::Unavailable(body))
                }
                _ => Err(ClientError::Server(format!("{}: {}", status, body))),
            }
        }
    }

    /// Generate the full answer document for a question.
    pub async fn generate(&self, question: &str, context: &str) -> Result<String, ClientError> {
        let response: ContentResponse = self
            .post_json("/generate", &GenerateRequest { question, context })
            .await?;
        Ok(response.content)
    }

    /// Produce the derived text for one annotated passage (a summary or a
    /// simpler explanation, depending on the kind).
    pub async fn annotate(
        &self,
        text: &str,
        kind: AnnotationKind,
        context: &str,
    ) -> Result<String, ClientError> {
        let response: ContentResponse = self
            .post_json(
                "/annotate",
                &AnnotateRequest {
                    text,
                    kind,
                    context,
                },
            )
            .await?;
        Ok(response.content)
    }

    /// Synthesize the collected knowledge items into one document.
    pub async fn consolidate(
        &self,
        items: &[CollectionItem],
        context: &str,
    ) -> Result<String, ClientError> {
        let request = ConsolidateRequest {
            items: items
                .iter()
                .map(|item| ItemText { text: &item.text })
                .collect(),
            context,
        };
        let response: ConsolidatedResponse = self.post_json("/consolidate", &request).await?;
        Ok(response.consolidated_text)
    }
}
