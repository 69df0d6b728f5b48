//! Messaging capability
//!
//! The message/ack model, the pull seam consumption is built over, and the
//! provider trait messaging backends implement.
//!
//! # Module Structure
//!
//! - [`consumer`] - the consumption engine (single, batch, listen)
//! - [`pubsub`] - Pub/Sub backend over the JSON API

pub mod consumer;
pub mod pubsub;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;
use crate::locator::Locator;

pub use consumer::Consumer;
pub use pubsub::PubSubProvider;

/// A message body with its attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The body as UTF-8 text, when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A message as delivered by a backend pull, carrying its ack handle.
///
/// The ack handle is opaque and must be redeemed exactly once; the
/// consumption engine does so the moment it takes ownership of the message.
#[derive(Debug, Clone)]
pub struct PulledMessage {
    pub message: Message,
    pub ack_id: String,
}

/// The pull primitive the consumption engine is built over.
///
/// One implementation per backend subscription; test doubles script this
/// seam directly.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// One pull attempt. `Ok(None)` means the backend had nothing to deliver
    /// for this attempt; the engine decides whether to try again.
    async fn pull(&self) -> Result<Option<PulledMessage>>;

    /// Redeem an ack handle. Must be called exactly once per delivered
    /// message.
    async fn ack(&self, ack_id: &str) -> Result<()>;
}

/// Handler invoked for each message of a listen loop, strictly sequentially.
pub type Listener = Box<dyn FnMut(Message) + Send>;

/// Signals a listen loop to stop at its next cycle boundary.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown. The loop observes this between cycles, so stopping
    /// can take up to one backoff interval plus one in-flight cycle.
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of a shutdown signal, held by the listen loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A connected handle/signal pair.
    pub fn pair() -> (ShutdownHandle, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx }, Shutdown { rx })
    }

    pub(crate) fn is_signalled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// A messaging backend, registered per scheme.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Stable provider identity, for diagnostics only.
    fn id(&self) -> &'static str;

    /// The URL schemes this backend claims.
    fn schemes(&self) -> &'static [&'static str];

    /// Publish one message to the locator's topic.
    async fn send(&self, locator: &Locator, message: Message) -> Result<()>;

    /// Publish messages in order, stopping at the first failure. Messages
    /// published before the failure stay published.
    async fn send_batch(&self, locator: &Locator, messages: Vec<Message>) -> Result<()>;

    /// Wait up to `timeout` for one message from the locator's subscription.
    async fn receive(&self, locator: &Locator, timeout: Duration) -> Result<Message>;

    /// Collect up to `batch_size` messages within `timeout`. A timeout with
    /// at least one message collected is a success; with none it fails with
    /// `NoMessagesFound`.
    async fn receive_batch(
        &self,
        locator: &Locator,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>>;

    /// Consume the subscription until `shutdown` is signalled or the backend
    /// fails non-recoverably, invoking `listener` for each message in
    /// delivery order.
    async fn listen(&self, locator: &Locator, listener: Listener, shutdown: Shutdown)
        -> Result<()>;

    /// Release any held subscription resources.
    async fn close(&self) -> Result<()>;
}
