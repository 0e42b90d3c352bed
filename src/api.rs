//! Defensio mining API client
//!
//! Both endpoints are POSTs with all parameters carried as URL path
//! segments; bodies are empty. Responses may or may not be JSON, so the
//! body is kept as a sum type and classified by the orchestrators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Remote response body: parsed JSON when the server sent any, otherwise
/// the raw text. Call sites must handle both arms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiBody {
    Json(serde_json::Value),
    Raw(String),
}

impl ApiBody {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => ApiBody::Json(value),
            Err(_) => ApiBody::Raw(text.to_string()),
        }
    }

    /// Compact rendering for log lines and error messages
    pub fn render(&self) -> String {
        match self {
            ApiBody::Json(value) => value.to_string(),
            ApiBody::Raw(text) => text.clone(),
        }
    }

    /// Top-level `status` field, when the body is a JSON object carrying one
    pub fn status_field(&self) -> Option<&str> {
        match self {
            ApiBody::Json(value) => value.get("status").and_then(|s| s.as_str()),
            ApiBody::Raw(_) => None,
        }
    }

    /// Decode the JSON arm into a typed view; `None` for raw bodies or
    /// JSON of an unexpected shape
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        match self {
            ApiBody::Json(value) => serde_json::from_value(value.clone()).ok(),
            ApiBody::Raw(_) => None,
        }
    }
}

/// Status code plus classified body of one remote call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The two mining-service calls the orchestrators make
#[async_trait]
pub trait MiningApi: Send + Sync {
    /// `POST {base}/register/{address}/{signature}/{nonce}`
    async fn register(&self, address: &str, signature: &str, nonce: &str) -> Result<ApiResponse>;

    /// `POST {base}/donate_to/{recipient}/{donor}/{signature}`
    async fn donate(&self, recipient: &str, donor: &str, signature: &str) -> Result<ApiResponse>;
}

/// reqwest-backed client against a configured API base
pub struct HttpMiningApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpMiningApi {
    /// Build a client for the given API root.
    ///
    /// No application-level timeout is configured; batches tolerate slow
    /// responses and rely on the transport's own limits.
    pub fn new(api_base: &str) -> Result<Self> {
        let base = Url::parse(api_base)
            .map_err(|e| Error::Config(format!("Invalid API base {}: {}", api_base, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Append percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API base {} cannot carry a path", self.base)))?
            .extend(segments);
        Ok(url)
    }

    async fn post(&self, url: Url) -> Result<ApiResponse> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(ApiResponse {
            status,
            body: ApiBody::parse(&text),
        })
    }
}

#[async_trait]
impl MiningApi for HttpMiningApi {
    async fn register(&self, address: &str, signature: &str, nonce: &str) -> Result<ApiResponse> {
        let url = self.endpoint(&["register", address, signature, nonce])?;
        self.post(url).await
    }

    async fn donate(&self, recipient: &str, donor: &str, signature: &str) -> Result<ApiResponse> {
        let url = self.endpoint(&["donate_to", recipient, donor, signature])?;
        self.post(url).await
    }
}
