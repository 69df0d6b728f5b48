//! HTTP utilities for GCP REST API calls
//!
//! Thin wrapper over `reqwest` shared by the storage and messaging clients:
//! bearer auth, JSON bodies, and mapping of non-success responses onto
//! [`Error::Api`](crate::error::Error::Api).

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::error::{Error, Result};

/// User agent sent when the configuration carries no override.
const DEFAULT_USER_AGENT: &str = concat!("gcpio/", env!("CARGO_PKG_VERSION"));

/// Header selecting the project billed for request quota.
const QUOTA_PROJECT_HEADER: &str = "x-goog-user-project";

/// Maximum length of an error body quoted in messages and logs
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// HTTP client wrapper for GCP API calls
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given user agent and quota project
    /// overrides.
    pub fn new(user_agent: Option<&str>, quota_project: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(project) = quota_project {
            let value = HeaderValue::from_str(project).map_err(|e| {
                Error::Unsupported(format!("invalid quota project '{project}': {e}"))
            })?;
            headers.insert(QUOTA_PROJECT_HEADER, value);
        }

        let client = Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// GET a JSON document.
    pub async fn get_json(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.client.get(url), token).await?;
        Ok(response.json().await?)
    }

    /// GET raw content; the checked response is handed back so callers can
    /// stream the body.
    pub async fn get_raw(&self, url: &str, token: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url), token).await
    }

    /// POST a JSON body, returning the parsed response document.
    pub async fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let response = self
            .send(self.client.post(url).json(body), token)
            .await?;
        Self::json_or_null(response).await
    }

    /// POST raw bytes (media upload), returning the parsed response document.
    pub async fn post_bytes(
        &self,
        url: &str,
        token: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Value> {
        tracing::debug!("POST {} ({} bytes)", url, body.len());
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let response = self.send(request, token).await?;
        Self::json_or_null(response).await
    }

    /// PATCH a JSON body, returning the parsed response document.
    pub async fn patch_json(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PATCH {}", url);
        let request = self.client.request(Method::PATCH, url).json(body);
        let response = self.send(request, token).await?;
        Self::json_or_null(response).await
    }

    /// DELETE a resource. GCP delete endpoints return empty bodies.
    pub async fn delete(&self, url: &str, token: &str) -> Result<()> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url), token).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, token: &str) -> Result<Response> {
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_api_message(&body, status.as_u16());
        tracing::error!("API error: {} - {}", status, message);
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json_or_null(response: Response) -> Result<Value> {
        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull the human-readable message out of a GCP error body, falling back to
/// a truncated copy of the body itself.
fn extract_api_message(body: &str, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(message) = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }

    let sanitized: String = body
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(MAX_ERROR_BODY_LENGTH)
        .collect();
    if sanitized.is_empty() {
        format!("status {status}")
    } else {
        sanitized
    }
}
