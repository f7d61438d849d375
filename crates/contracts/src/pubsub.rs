//! PubSubClient trait - broker-facing interface
//!
//! Outbound publishes and subscription management. Inbound messages arrive
//! separately as [`InboundMessage`] values on a channel owned by the
//! transport.

use bytes::Bytes;

use crate::ContractError;

/// Message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,

    /// Raw payload
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload decoded as text (invalid UTF-8 replaced)
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Publish/subscribe client
///
/// Publishes are fire-and-forget: at-most-once delivery, never retained.
#[trait_variant::make(PubSubClient: Send)]
pub trait LocalPubSubClient {
    /// Client name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Subscribe to a topic
    async fn subscribe(&self, topic: &str) -> Result<(), ContractError>;

    /// Unsubscribe from a topic
    async fn unsubscribe(&self, topic: &str) -> Result<(), ContractError>;

    /// Publish a text payload
    ///
    /// # Errors
    /// Returns a publish error when the request cannot be handed to the broker connection
    async fn publish(&self, topic: &str, payload: String) -> Result<(), ContractError>;

    /// Close the broker connection
    async fn disconnect(&self) -> Result<(), ContractError>;
}
