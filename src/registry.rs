//! Provider registry
//!
//! Scheme-keyed table of backend providers. Registration happens during
//! process setup; lookups afterwards are pure table reads. The registry is
//! an explicit value handed around (and cloned into tests) rather than a
//! process global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::messaging::MessagingProvider;
use crate::storage::StorageProvider;

/// A registered backend, tagged by capability.
#[derive(Clone)]
pub enum Provider {
    Storage(Arc<dyn StorageProvider>),
    Messaging(Arc<dyn MessagingProvider>),
}

impl Provider {
    /// The schemes this provider claims.
    pub fn schemes(&self) -> &'static [&'static str] {
        match self {
            Provider::Storage(p) => p.schemes(),
            Provider::Messaging(p) => p.schemes(),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Storage(p) => write!(f, "Provider::Storage({:?})", p.schemes()),
            Provider::Messaging(p) => write!(f, "Provider::Messaging({:?})", p.schemes()),
        }
    }
}

/// Scheme-to-provider table.
///
/// All registration must complete before the first lookup; the table takes
/// no lock. Re-registering a scheme replaces the previous provider - an
/// explicit override mechanism, used for example to swap a backend out in
/// tests.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    by_scheme: HashMap<String, Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under every scheme it claims. Last registration
    /// wins per scheme.
    pub fn register(&mut self, provider: Provider) {
        for scheme in provider.schemes() {
            self.by_scheme.insert(scheme.to_string(), provider.clone());
        }
    }

    /// Look up the provider for a scheme.
    pub fn lookup(&self, scheme: &str) -> Result<&Provider> {
        self.by_scheme
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    /// The storage provider for a scheme, or `Unsupported` when the scheme
    /// is registered with a messaging backend.
    pub fn storage(&self, scheme: &str) -> Result<Arc<dyn StorageProvider>> {
        match self.lookup(scheme)? {
            Provider::Storage(p) => Ok(Arc::clone(p)),
            Provider::Messaging(_) => Err(Error::Unsupported(format!(
                "scheme '{scheme}' is a messaging backend, not storage"
            ))),
        }
    }

    /// The messaging provider for a scheme, or `Unsupported` when the scheme
    /// is registered with a storage backend.
    pub fn messaging(&self, scheme: &str) -> Result<Arc<dyn MessagingProvider>> {
        match self.lookup(scheme)? {
            Provider::Messaging(p) => Ok(Arc::clone(p)),
            Provider::Storage(_) => Err(Error::Unsupported(format!(
                "scheme '{scheme}' is a storage backend, not messaging"
            ))),
        }
    }

    /// Registered schemes, for diagnostics.
    pub fn schemes(&self) -> Vec<&str> {
        self.by_scheme.keys().map(|s| s.as_str()).collect()
    }
}
