//! Storage capability
//!
//! The provider/handle traits storage backends implement, and the uniform
//! entry shape listings and metadata calls translate into.
//!
//! # Module Structure
//!
//! - [`gcs`] - Cloud Storage backend over the JSON API
//! - [`handle`] - per-operation object handle with tracked sub-resources

pub mod gcs;
pub mod handle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::locator::Locator;

pub use gcs::GcsProvider;
pub use handle::ObjectHandle;

/// Uniform description of a stored object or directory-like prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key (or prefix, for directory entries).
    pub name: String,
    /// Size in bytes; zero for prefixes and markers.
    pub size: u64,
    /// Last modification time, when the backend reports one.
    pub updated: Option<DateTime<Utc>>,
    /// True for directory-like entries (listing prefixes, `/`-suffixed markers).
    pub is_dir: bool,
}

/// A lazily-produced, finite, non-restartable listing.
///
/// Entries arrive in backend order, one page at a time; the entry matching
/// the queried prefix itself is skipped.
#[async_trait]
pub trait ObjectLister: Send {
    /// The next entry, or `None` once the listing is exhausted.
    async fn next(&mut self) -> Result<Option<ObjectMeta>>;
}

/// A per-operation handle on one object.
///
/// Handles are cheap to create: the backend stream is acquired on first read
/// or write, not at open time. A handle must not be shared across concurrent
/// operations; every sub-resource it acquires is released by [`close`].
///
/// [`close`]: StorageHandle::close
#[async_trait]
pub trait StorageHandle: Send {
    /// The locator this handle was opened for.
    fn locator(&self) -> &Locator;

    /// Read into `buf`, returning the number of bytes read (0 at end).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Append `buf` to the pending write. The object content is committed
    /// when the handle is closed.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Fetch the object's metadata.
    async fn metadata(&self) -> Result<ObjectMeta>;

    /// List objects under this handle's key.
    async fn list(&self) -> Result<Box<dyn ObjectLister>>;

    /// Set one custom metadata property on the object.
    async fn set_property(&self, name: &str, value: &str) -> Result<()>;

    /// Read one custom metadata property, if present.
    async fn property(&self, name: &str) -> Result<Option<String>>;

    /// Delete the object.
    async fn delete(&self) -> Result<()>;

    /// Release every sub-resource acquired by this handle, in acquisition
    /// order. All releases are attempted even when one fails; the last
    /// failure is returned.
    async fn close(&mut self) -> Result<()>;
}

/// A storage backend, registered per scheme.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// The URL schemes this backend claims.
    fn schemes(&self) -> &'static [&'static str];

    /// Open a handle on an existing or to-be-written object. No network
    /// traffic happens until the handle is used.
    async fn open(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>>;

    /// Create a new, empty object. Fails with `AlreadyExists` when the
    /// target is present.
    async fn create(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>>;

    /// Create a directory marker. Backends without directory semantics
    /// return `Unsupported`.
    async fn mkdir(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>>;

    /// Create a directory marker, including missing parents where the
    /// backend distinguishes them.
    async fn mkdir_all(&self, locator: &Locator) -> Result<Box<dyn StorageHandle>>;
}
