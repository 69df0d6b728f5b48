//! GCP configuration
//!
//! Named client configurations (project, region, credentials, client
//! options) and the keyed registry deciding which one applies to a locator.
//!
//! A process typically registers one configuration per backend family under
//! the scheme name (`"gs"`, `"pubsub"`) and, when it talks to more than one
//! account, additional configurations under a host hint (`"acct1"`) or a
//! host/bucket compound key (`"acct1/raw-events"`). Resolution picks the
//! most specific registered key.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::locator::Locator;

/// A single client option. Order of application is preserved; when two
/// options target the same concern, the later one wins at client build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOption {
    /// Path to a service-account key file.
    CredentialsFile(PathBuf),
    /// Service-account key material, inline.
    CredentialsJson(Vec<u8>),
    /// A pre-issued bearer token, used verbatim. Bypasses token refresh;
    /// suitable for short-lived processes and tests.
    AccessToken(String),
    /// API endpoint override (used by tests and private-access setups).
    Endpoint(String),
    /// User agent for outbound requests.
    UserAgent(String),
    /// Project billed for quota, when different from the resource project.
    QuotaProject(String),
    /// OAuth scopes requested for tokens.
    Scopes(Vec<String>),
}

/// A named GCP client configuration.
///
/// Built once during setup with the `with_*` appenders and then stored in a
/// [`ConfigRegistry`]; not mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcpConfig {
    /// Project owning the addressed resources. Empty means unresolved.
    pub project_id: String,
    /// Default region, for backends that need one.
    pub region: String,
    options: Vec<ClientOption>,
}

impl GcpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.push(ClientOption::CredentialsFile(path.into()));
        self
    }

    pub fn with_credentials_json(mut self, json: impl Into<Vec<u8>>) -> Self {
        self.options.push(ClientOption::CredentialsJson(json.into()));
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.options.push(ClientOption::AccessToken(token.into()));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.push(ClientOption::Endpoint(endpoint.into()));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.options.push(ClientOption::UserAgent(user_agent.into()));
        self
    }

    pub fn with_quota_project(mut self, quota_project: impl Into<String>) -> Self {
        self.options
            .push(ClientOption::QuotaProject(quota_project.into()));
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.options.push(ClientOption::Scopes(scopes));
        self
    }

    pub fn add_option(&mut self, option: ClientOption) {
        self.options.push(option);
    }

    /// All options, in the order they were added.
    pub fn options(&self) -> &[ClientOption] {
        &self.options
    }

    /// A configuration with an empty project id means no resolution tier
    /// matched; backends fall back to ambient credentials or refuse.
    pub fn is_resolved(&self) -> bool {
        !self.project_id.is_empty()
    }

    /// The last credentials-carrying option, if any.
    pub fn credentials(&self) -> Option<&ClientOption> {
        self.options.iter().rev().find(|o| {
            matches!(
                o,
                ClientOption::CredentialsFile(_)
                    | ClientOption::CredentialsJson(_)
                    | ClientOption::AccessToken(_)
            )
        })
    }

    /// The last endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        self.options.iter().rev().find_map(|o| match o {
            ClientOption::Endpoint(e) => Some(e.as_str()),
            _ => None,
        })
    }

    /// The endpoint override validated as a URL, or the given default.
    /// Trailing slashes are trimmed so path joining stays uniform.
    pub(crate) fn endpoint_or(&self, default: &str) -> Result<String> {
        let raw = match self.endpoint() {
            Some(e) => {
                url::Url::parse(e)?;
                e
            }
            None => default,
        };
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// The last user-agent override, if any.
    pub fn user_agent(&self) -> Option<&str> {
        self.options.iter().rev().find_map(|o| match o {
            ClientOption::UserAgent(ua) => Some(ua.as_str()),
            _ => None,
        })
    }

    /// The last quota project override, if any.
    pub fn quota_project(&self) -> Option<&str> {
        self.options.iter().rev().find_map(|o| match o {
            ClientOption::QuotaProject(p) => Some(p.as_str()),
            _ => None,
        })
    }

    /// The last scope set, if any.
    pub fn scopes(&self) -> Option<&[String]> {
        self.options.iter().rev().find_map(|o| match o {
            ClientOption::Scopes(s) => Some(s.as_slice()),
            _ => None,
        })
    }
}

/// Keyed store of named configurations.
///
/// Construct one per process (or per test), register configurations during
/// setup, then hand clones to the providers. Registration after the first
/// resolve is not supported; the registry takes no lock.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    entries: HashMap<String, GcpConfig>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configuration under a key. Re-registering a key replaces
    /// the previous configuration.
    pub fn register(&mut self, key: impl Into<String>, config: GcpConfig) {
        self.entries.insert(key.into(), config);
    }

    pub fn get(&self, key: &str) -> Option<&GcpConfig> {
        self.entries.get(key)
    }

    /// Resolve the configuration applying to a locator.
    ///
    /// Most specific registered key wins:
    /// 1. `<host>/<bucket>` compound key (host hint present);
    /// 2. `<host>` alone;
    /// 3. `fallback`, the scheme's canonical name.
    ///
    /// When every tier misses, the returned configuration is the empty
    /// default; callers must check [`GcpConfig::is_resolved`] and either use
    /// ambient credentials or refuse.
    pub fn resolve(&self, locator: &Locator, fallback: &str) -> GcpConfig {
        let host = locator.host();
        if !host.is_empty() {
            let compound = format!("{}/{}", host, locator.bucket());
            if let Some(config) = self.entries.get(&compound) {
                return config.clone();
            }
            if let Some(config) = self.entries.get(host) {
                return config.clone();
            }
        }
        if let Some(config) = self.entries.get(fallback) {
            return config.clone();
        }
        tracing::debug!(
            locator = %locator,
            fallback,
            "no configuration registered for locator"
        );
        GcpConfig::default()
    }
}
