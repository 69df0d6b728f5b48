//! URL-driven access to Google Cloud Storage and Pub/Sub.
//!
//! A locator URL selects the backend (by scheme), the credentials (by a
//! tiered configuration lookup over host, host/bucket, and scheme-default
//! keys), and the resource to operate on:
//!
//! - `gs://bucket/key` / `storage://bucket/key` - Cloud Storage objects
//! - `pubsub://topic-or-subscription` - Pub/Sub publish and consume
//!
//! # Architecture
//!
//! - [`locator`] - URL parsing into scheme/host/components
//! - [`config`] - named configurations and tiered resolution
//! - [`registry`] - scheme-to-provider dispatch
//! - [`storage`] - storage capability traits and the Cloud Storage backend
//! - [`messaging`] - messaging capability traits, the consumption engine,
//!   and the Pub/Sub backend
//! - [`gcp`] - shared auth and HTTP plumbing
//!
//! Registries are explicit values, not process globals: build a
//! [`ConfigRegistry`], hand it to [`defaults`] (or register providers
//! yourself), and keep the resulting [`ProviderRegistry`] where your
//! application needs it. Tests build isolated registries the same way.
//!
//! # Example
//!
//! ```ignore
//! use gcpio::{ConfigRegistry, GcpConfig, Locator};
//!
//! async fn read_report() -> gcpio::Result<Vec<u8>> {
//!     let mut configs = ConfigRegistry::new();
//!     configs.register("gs", GcpConfig::new().with_project_id("my-project"));
//!     let providers = gcpio::defaults(configs);
//!
//!     let locator = Locator::parse("gs:///my-bucket/reports/latest.csv")?;
//!     let mut handle = providers.storage(locator.scheme())?.open(&locator).await?;
//!     let mut content = Vec::new();
//!     let mut buf = [0u8; 8192];
//!     loop {
//!         let n = handle.read(&mut buf).await?;
//!         if n == 0 {
//!             break;
//!         }
//!         content.extend_from_slice(&buf[..n]);
//!     }
//!     handle.close().await?;
//!     Ok(content)
//! }
//! ```

pub mod config;
pub mod error;
pub mod gcp;
pub mod locator;
pub mod messaging;
pub mod registry;
pub mod storage;

use std::sync::Arc;

pub use config::{ClientOption, ConfigRegistry, GcpConfig};
pub use error::{Error, Result};
pub use locator::Locator;
pub use messaging::{
    Consumer, Listener, Message, MessageSource, MessagingProvider, PubSubProvider, PulledMessage,
    Shutdown, ShutdownHandle,
};
pub use registry::{Provider, ProviderRegistry};
pub use storage::{GcsProvider, ObjectLister, ObjectMeta, StorageHandle, StorageProvider};

/// A provider registry with the built-in backends registered: Cloud Storage
/// under `gs`/`storage`, Pub/Sub under `pubsub`.
pub fn defaults(configs: ConfigRegistry) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(Provider::Storage(Arc::new(GcsProvider::new(
        configs.clone(),
    ))));
    providers.register(Provider::Messaging(Arc::new(PubSubProvider::new(configs))));
    providers
}
