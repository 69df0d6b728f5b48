//! Resource locators
//!
//! Parses a URL-like string into the components the rest of the crate
//! dispatches on: scheme, host hint, and path components.
//!
//! Locator conventions by backend family:
//!
//! - Storage: `<scheme>://<host>/<bucket>/<key...>`. The host is optional and
//!   is a configuration-selection hint, not a network address; write
//!   `gs:///bucket/key` to address a bucket without one. The first path
//!   component is the bucket, the rejoined remainder is the object key (an
//!   empty key denotes the bucket itself).
//! - Messaging: `<scheme>://<topic-or-subscription>` - the single segment is
//!   the topic (send) or subscription (receive) identifier.

use crate::error::{Error, Result};

/// Parsed form of a resource-identifying URL.
///
/// Parsing is pure: no network and no credential work happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    scheme: String,
    host: String,
    path_components: Vec<String>,
}

impl Locator {
    /// Parse a raw URL string into a locator.
    ///
    /// Fails when the `scheme://` prefix is absent or the URL names no
    /// bucket/topic.
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| Error::InvalidLocator(format!("missing scheme prefix in '{raw}'")))?;
        if scheme.is_empty() {
            return Err(Error::InvalidLocator(format!("empty scheme in '{raw}'")));
        }
        if rest.is_empty() {
            return Err(Error::InvalidLocator(format!(
                "no bucket or topic in '{raw}'"
            )));
        }

        let mut segments: Vec<&str> = rest.split('/').collect();
        let authority = segments.remove(0);

        // A lone authority names the container/topic itself; it then doubles
        // as the host hint so per-name configurations still apply.
        let (host, path_components) = if segments.iter().all(|s| s.is_empty()) {
            if authority.is_empty() {
                return Err(Error::InvalidLocator(format!(
                    "no bucket or topic in '{raw}'"
                )));
            }
            (authority.to_string(), vec![authority.to_string()])
        } else {
            let components: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
            if components[0].is_empty() {
                return Err(Error::InvalidLocator(format!(
                    "empty bucket component in '{raw}'"
                )));
            }
            (authority.to_string(), components)
        };

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            path_components,
        })
    }

    /// The URL scheme, selecting the backend provider.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The configuration-selection hint; empty when the URL carried none.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// All path components, bucket/topic first.
    pub fn path_components(&self) -> &[String] {
        &self.path_components
    }

    /// The bucket (storage) or topic/subscription (messaging) identifier.
    pub fn bucket(&self) -> &str {
        &self.path_components[0]
    }

    /// The topic or subscription identifier of a messaging locator.
    pub fn topic(&self) -> &str {
        self.bucket()
    }

    /// The object key: path components after the bucket, rejoined.
    ///
    /// Empty for a locator addressing the container itself.
    pub fn key(&self) -> String {
        self.path_components[1..].join("/")
    }

    /// Derive a locator for another object in the same scheme/host.
    pub fn with_path(&self, path: &str) -> Self {
        let path_components = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        Self {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path_components,
        }
    }

    /// Rebuild the URL form of this locator.
    pub fn to_url(&self) -> String {
        if self.path_components.len() == 1 && self.host == self.path_components[0] {
            return format!("{}://{}", self.scheme, self.host);
        }
        format!(
            "{}://{}/{}",
            self.scheme,
            self.host,
            self.path_components.join("/")
        )
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_url())
    }
}
