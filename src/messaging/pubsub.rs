//! Pub/Sub backend
//!
//! Publishes and pulls through the Pub/Sub JSON API v1. Message bodies are
//! base64 on the wire. The locator's single segment is the topic (send) or
//! subscription (receive) identifier; a project id is required to build
//! request paths, so an unresolved configuration is refused here rather than
//! guessed.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::config::{ConfigRegistry, GcpConfig};
use crate::error::{Error, Result};
use crate::gcp::auth::TokenManager;
use crate::gcp::http::HttpClient;
use crate::locator::Locator;
use crate::messaging::consumer::Consumer;
use crate::messaging::{
    Listener, Message, MessageSource, MessagingProvider, PulledMessage, Shutdown,
};

/// Schemes the Pub/Sub backend is registered under.
pub const PUBSUB_SCHEMES: &[&str] = &["pubsub"];

/// Stable provider identity, for diagnostics.
pub const PUBSUB_PROVIDER_ID: &str = "pubsub-provider";

const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Low-level Pub/Sub JSON API client.
#[derive(Debug, Clone)]
pub(crate) struct PubSubClient {
    http: HttpClient,
    auth: TokenManager,
    endpoint: String,
    project_id: String,
}

impl PubSubClient {
    pub(crate) async fn from_config(config: &GcpConfig, locator: &Locator) -> Result<Self> {
        if !config.is_resolved() {
            return Err(Error::UnresolvedConfig(locator.to_string()));
        }
        Ok(Self {
            http: HttpClient::new(config.user_agent(), config.quota_project())?,
            auth: TokenManager::from_config(config).await?,
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT)?,
            project_id: config.project_id.clone(),
        })
    }

    fn topic_url(&self, topic: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/topics/{}:{}",
            self.endpoint, self.project_id, topic, verb
        )
    }

    fn subscription_url(&self, subscription: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/subscriptions/{}:{}",
            self.endpoint, self.project_id, subscription, verb
        )
    }

    /// Publish messages in one request, returning the server-assigned ids.
    pub(crate) async fn publish(&self, topic: &str, messages: &[Message]) -> Result<Vec<String>> {
        let encoded: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut entry = json!({ "data": BASE64.encode(&m.body) });
                if !m.attributes.is_empty() {
                    entry["attributes"] = json!(m.attributes);
                }
                entry
            })
            .collect();

        let token = self.auth.token().await?;
        let response = self
            .http
            .post_json(
                &self.topic_url(topic, "publish"),
                &token,
                &json!({ "messages": encoded }),
            )
            .await?;

        let ids: Vec<String> = response
            .get("messageIds")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        for id in &ids {
            tracing::info!(topic, id = %id, "message published");
        }
        Ok(ids)
    }

    /// One pull request for up to `max_messages` messages.
    pub(crate) async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
    ) -> Result<Vec<PulledMessage>> {
        let token = self.auth.token().await?;
        let response = self
            .http
            .post_json(
                &self.subscription_url(subscription, "pull"),
                &token,
                &json!({ "maxMessages": max_messages }),
            )
            .await?;

        let mut pulled = Vec::new();
        let received = response
            .get("receivedMessages")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for entry in received {
            let Some(ack_id) = entry.get("ackId").and_then(|v| v.as_str()) else {
                continue;
            };
            let body = match entry
                .get("message")
                .and_then(|m| m.get("data"))
                .and_then(|d| d.as_str())
            {
                Some(data) => BASE64.decode(data).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("invalid base64 message data: {e}"),
                    ))
                })?,
                None => Vec::new(),
            };
            let mut message = Message::new(body);
            if let Some(attributes) = entry
                .get("message")
                .and_then(|m| m.get("attributes"))
                .and_then(|a| a.as_object())
            {
                for (name, value) in attributes {
                    if let Some(value) = value.as_str() {
                        message.attributes.insert(name.clone(), value.to_string());
                    }
                }
            }
            pulled.push(PulledMessage {
                message,
                ack_id: ack_id.to_string(),
            });
        }
        Ok(pulled)
    }

    pub(crate) async fn acknowledge(&self, subscription: &str, ack_ids: &[&str]) -> Result<()> {
        let token = self.auth.token().await?;
        self.http
            .post_json(
                &self.subscription_url(subscription, "acknowledge"),
                &token,
                &json!({ "ackIds": ack_ids }),
            )
            .await?;
        Ok(())
    }
}

/// One subscription as a pull source for the consumption engine.
pub(crate) struct SubscriptionSource {
    client: PubSubClient,
    subscription: String,
}

#[async_trait]
impl MessageSource for SubscriptionSource {
    async fn pull(&self) -> Result<Option<PulledMessage>> {
        let mut messages = self.client.pull(&self.subscription, 1).await?;
        Ok(messages.pop())
    }

    async fn ack(&self, ack_id: &str) -> Result<()> {
        self.client.acknowledge(&self.subscription, &[ack_id]).await
    }
}

/// Pub/Sub provider, registered under `pubsub://`.
pub struct PubSubProvider {
    configs: ConfigRegistry,
}

impl PubSubProvider {
    pub fn new(configs: ConfigRegistry) -> Self {
        Self { configs }
    }

    async fn client_for(&self, locator: &Locator) -> Result<PubSubClient> {
        let config = self.configs.resolve(locator, "pubsub");
        PubSubClient::from_config(&config, locator).await
    }

    async fn source_for(&self, locator: &Locator) -> Result<SubscriptionSource> {
        Ok(SubscriptionSource {
            client: self.client_for(locator).await?,
            subscription: locator.topic().to_string(),
        })
    }
}

#[async_trait]
impl MessagingProvider for PubSubProvider {
    fn id(&self) -> &'static str {
        PUBSUB_PROVIDER_ID
    }

    fn schemes(&self) -> &'static [&'static str] {
        PUBSUB_SCHEMES
    }

    async fn send(&self, locator: &Locator, message: Message) -> Result<()> {
        let client = self.client_for(locator).await?;
        client.publish(locator.topic(), &[message]).await?;
        Ok(())
    }

    async fn send_batch(&self, locator: &Locator, messages: Vec<Message>) -> Result<()> {
        let client = self.client_for(locator).await?;
        // One request per message so a failure leaves earlier messages
        // published; partial sends are not rolled back.
        for message in messages {
            client.publish(locator.topic(), &[message]).await?;
        }
        Ok(())
    }

    async fn receive(&self, locator: &Locator, timeout: Duration) -> Result<Message> {
        let source = self.source_for(locator).await?;
        Consumer::new(source).receive(timeout).await
    }

    async fn receive_batch(
        &self,
        locator: &Locator,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>> {
        let source = self.source_for(locator).await?;
        Consumer::new(source).receive_batch(batch_size, timeout).await
    }

    async fn listen(
        &self,
        locator: &Locator,
        listener: Listener,
        shutdown: Shutdown,
    ) -> Result<()> {
        let source = self.source_for(locator).await?;
        Consumer::new(source).listen(listener, shutdown).await
    }

    async fn close(&self) -> Result<()> {
        // Clients are built per call and hold no subscription state.
        Ok(())
    }
}
