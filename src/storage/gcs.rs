//! Cloud Storage backend
//!
//! Talks to the Cloud Storage JSON API v1 through the shared HTTP/auth
//! plumbing. One [`GcsClient`] is built per operation from the configuration
//! resolved for the locator, so different hosts can address different
//! accounts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::{ConfigRegistry, GcpConfig};
use crate::error::{Error, Result};
use crate::gcp::auth::TokenManager;
use crate::gcp::http::HttpClient;
use crate::locator::Locator;
use crate::storage::handle::ObjectHandle;
use crate::storage::{ObjectMeta, StorageHandle, StorageProvider};

/// Schemes the Cloud Storage backend is registered under.
pub const GCS_SCHEMES: &[&str] = &["gs", "storage"];

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Object attributes as returned by the JSON API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ObjectAttrs {
    pub name: String,
    /// The API reports sizes as decimal strings.
    pub size: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl ObjectAttrs {
    pub(crate) fn size_bytes(&self) -> u64 {
        self.size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub(crate) fn to_meta(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            size: self.size_bytes(),
            updated: self.updated,
            is_dir: self.name.ends_with('/'),
        }
    }
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ListPage {
    pub items: Vec<ObjectAttrs>,
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Low-level Cloud Storage JSON API client.
#[derive(Debug, Clone)]
pub(crate) struct GcsClient {
    http: HttpClient,
    auth: TokenManager,
    endpoint: String,
}

impl GcsClient {
    pub(crate) async fn from_config(config: &GcpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config.user_agent(), config.quota_project())?,
            auth: TokenManager::from_config(config).await?,
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT)?,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            bucket,
            urlencoding::encode(key)
        )
    }

    pub(crate) async fn object_attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs> {
        let token = self.auth.token().await?;
        let value = self
            .http
            .get_json(&self.object_url(bucket, key), &token)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Begin a media download; the response body is streamed by the caller.
    pub(crate) async fn download(&self, bucket: &str, key: &str) -> Result<reqwest::Response> {
        let url = format!("{}?alt=media", self.object_url(bucket, key));
        let token = self.auth.token().await?;
        self.http.get_raw(&url, &token).await
    }

    /// Upload the full object content in one media request.
    pub(crate) async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            bucket,
            urlencoding::encode(key)
        );
        let token = self.auth.token().await?;
        self.http
            .post_bytes(&url, &token, "application/octet-stream", data)
            .await?;
        Ok(())
    }

    pub(crate) async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage> {
        let mut url = format!(
            "{}/storage/v1/b/{}/o?delimiter={}",
            self.endpoint,
            bucket,
            urlencoding::encode("/")
        );
        if !prefix.is_empty() {
            url.push_str(&format!("&prefix={}", urlencoding::encode(prefix)));
        }
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        let token = self.auth.token().await?;
        let value = self.http.get_json(&url, &token).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let token = self.auth.token().await?;
        self.http.delete(&self.object_url(bucket, key), &token).await
    }

    /// Replace the object's custom metadata map.
    pub(crate) async fn patch_metadata(
        &self,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<()> {
        let token = self.auth.token().await?;
        let body = json!({ "metadata": metadata });
        self.http
            .patch_json(&self.object_url(bucket, key), &token, &body)
            .await?;
        Ok(())
    }
}

/// Cloud Storage provider, registered under `gs://` and `storage://`.
pub struct GcsProvider {
    configs: ConfigRegistry,
}

impl GcsProvider {
    pub fn new(configs: ConfigRegistry) -> Self {
        Self { configs }
    }

    async fn client_for(&self, locator: &Locator) -> Result<GcsClient> {
        let config = self.configs.resolve(locator, locator.scheme());
        if !config.is_resolved() {
            tracing::warn!(
                locator = %locator,
                "no configuration resolved; falling back to ambient credentials"
            );
        }
        GcsClient::from_config(&config).await
    }
}

#[async_trait]
impl StorageProvider for GcsProvider {
    fn schemes(&self) -> &'static [&'static str] {
        GCS_SCHEMES
    }

    async fn open(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>> {
        let client = self.client_for(locator).await?;
        Ok(Box::new(ObjectHandle::new(
            client,
            locator.clone(),
            locator.key(),
        )))
    }

    async fn create(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>> {
        let key = locator.key();
        if key.is_empty() {
            return Err(Error::Unsupported(
                "bucket creation is not allowed; use the console".to_string(),
            ));
        }
        let client = self.client_for(locator).await?;
        match client.object_attrs(locator.bucket(), &key).await {
            Ok(_) => return Err(Error::AlreadyExists(key)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        client.upload(locator.bucket(), &key, Vec::new()).await?;
        tracing::debug!(locator = %locator, "created empty object");
        Ok(Box::new(ObjectHandle::new(client, locator.clone(), key)))
    }

    async fn mkdir(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>> {
        self.mkdir_all(locator).await
    }

    async fn mkdir_all(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>> {
        let key = locator.key();
        if key.is_empty() {
            return Err(Error::Unsupported(
                "bucket creation is not allowed; use the console".to_string(),
            ));
        }
        // Folders are zero-length marker objects with a trailing separator.
        let marker = if key.ends_with('/') {
            key
        } else {
            format!("{key}/")
        };
        let client = self.client_for(locator).await?;
        match client.object_attrs(locator.bucket(), &marker).await {
            Ok(_) => return Err(Error::AlreadyExists(marker)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        client.upload(locator.bucket(), &marker, Vec::new()).await?;
        tracing::debug!(locator = %locator, marker = %marker, "created folder marker");
        Ok(Box::new(ObjectHandle::new(client, locator.clone(), marker)))
    }
}
