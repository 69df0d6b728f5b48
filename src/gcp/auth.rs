//! GCP Authentication
//!
//! Builds a token provider from a resolved configuration: a service account
//! key file or inline key when the configuration carries one, Application
//! Default Credentials otherwise. Tokens are cached with an expiry buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;

use crate::config::{ClientOption, GcpConfig};
use crate::error::{Error, Result};

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Token source with caching, shared by all requests of one backend client.
#[derive(Clone)]
pub struct TokenManager {
    source: Source,
    scopes: Vec<String>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
enum Source {
    /// Pre-issued bearer token, used verbatim.
    Fixed(String),
    Provider(Arc<dyn TokenProvider>),
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl TokenManager {
    /// Build a token manager from a resolved configuration.
    ///
    /// The latest credentials option wins; with none present this falls back
    /// to Application Default Credentials.
    pub async fn from_config(config: &GcpConfig) -> Result<Self> {
        let source = match config.credentials() {
            Some(ClientOption::CredentialsFile(path)) => {
                tracing::debug!(path = %path.display(), "using service account key file");
                Source::Provider(Arc::new(CustomServiceAccount::from_file(path)?))
            }
            Some(ClientOption::CredentialsJson(json)) => {
                let json = std::str::from_utf8(json).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("credentials JSON is not valid UTF-8: {e}"),
                    ))
                })?;
                Source::Provider(Arc::new(CustomServiceAccount::from_json(json)?))
            }
            Some(ClientOption::AccessToken(token)) => Source::Fixed(token.clone()),
            _ => Source::Provider(gcp_auth::provider().await?),
        };

        let scopes = config
            .scopes()
            .map(|s| s.to_vec())
            .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            source,
            scopes,
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Get an access token, refreshing when the cached one is near expiry.
    pub async fn token(&self) -> Result<String> {
        let provider = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::Provider(p) => p,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("cached token expired, fetching new token");
            }
        }

        let scopes: Vec<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        let token = provider.token(&scopes).await?;
        let token_str = token.as_str().to_string();

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        Ok(token_str)
    }

    /// Drop the cached token and fetch a fresh one.
    pub async fn refresh(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.token().await
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
