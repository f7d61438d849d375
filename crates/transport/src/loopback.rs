//! In-process pub/sub bus
//!
//! Broker stand-in for tests and for running without a broker. Records every
//! publish, delivers injected messages to subscribed topics only, and can be
//! told to fail publishes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use bytes::Bytes;
use contracts::{ContractError, InboundMessage, PubSubClient};
use parking_lot::Mutex;
use tracing::{debug, instrument};

/// A message published through the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug)]
struct LoopbackInner {
    subscriptions: Mutex<HashSet<String>>,
    published: Mutex<Vec<PublishedMessage>>,
    inbound_tx: Sender<InboundMessage>,
    connected: AtomicBool,
    fail_publish: AtomicBool,
}

/// In-memory broker connection
#[derive(Debug, Clone)]
pub struct LoopbackBus {
    inner: Arc<LoopbackInner>,
}

impl LoopbackBus {
    /// Create a connected bus and its inbound message receiver
    pub fn new(inbound_capacity: usize) -> (Self, Receiver<InboundMessage>) {
        let (inbound_tx, inbound_rx) = bounded(inbound_capacity);
        let bus = Self {
            inner: Arc::new(LoopbackInner {
                subscriptions: Mutex::new(HashSet::new()),
                published: Mutex::new(Vec::new()),
                inbound_tx,
                connected: AtomicBool::new(true),
                fail_publish: AtomicBool::new(false),
            }),
        };
        (bus, inbound_rx)
    }

    /// Deliver a message as if another client published it
    ///
    /// Returns false when nobody is subscribed to the topic or the bus is
    /// disconnected.
    pub async fn inject(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        if !self.is_connected() || !self.is_subscribed(topic) {
            debug!(topic = %topic, "dropping message for unsubscribed topic");
            return false;
        }
        self.inner
            .inbound_tx
            .send(InboundMessage::new(topic, payload))
            .await
            .is_ok()
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Whether the topic currently has a subscription
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.inner.subscriptions.lock().contains(topic)
    }

    /// Current subscriptions
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.inner.subscriptions.lock().iter().cloned().collect();
        topics.sort();
        topics
    }

    /// Whether disconnect has not been called yet
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Every message published so far, in order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.published.lock().clone()
    }

    /// Payloads published on one topic, in order
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|msg| msg.topic == topic)
            .map(|msg| msg.payload.clone())
            .collect()
    }

    fn ensure_connected(&self, topic: &str) -> Result<(), ContractError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ContractError::publish(topic, "bus disconnected"))
        }
    }
}

impl PubSubClient for LoopbackBus {
    fn name(&self) -> &str {
        "loopback"
    }

    #[instrument(name = "loopback_subscribe", skip(self))]
    async fn subscribe(&self, topic: &str) -> Result<(), ContractError> {
        if !self.is_connected() {
            return Err(ContractError::subscription(topic, "bus disconnected"));
        }
        self.inner.subscriptions.lock().insert(topic.to_string());
        Ok(())
    }

    #[instrument(name = "loopback_unsubscribe", skip(self))]
    async fn unsubscribe(&self, topic: &str) -> Result<(), ContractError> {
        self.inner.subscriptions.lock().remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<(), ContractError> {
        self.ensure_connected(topic)?;
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            return Err(ContractError::publish(topic, "injected publish failure"));
        }

        self.inner.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });

        // Like a broker, echo to our own subscriptions
        if self.is_subscribed(topic) {
            let _ = self
                .inner
                .inbound_tx
                .try_send(InboundMessage::new(topic, payload));
        }
        Ok(())
    }

    #[instrument(name = "loopback_disconnect", skip(self))]
    async fn disconnect(&self) -> Result<(), ContractError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.inbound_tx.close();
        Ok(())
    }
}
