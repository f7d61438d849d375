//! MQTT broker connection
//!
//! Wraps rumqttc's `AsyncClient`. The event loop runs on its own task and
//! forwards every incoming PUBLISH to the inbound channel; outbound calls only
//! enqueue requests for that loop.
//!
//! The session is clean, so the broker forgets subscriptions when the link
//! drops. Active subscriptions are tracked here and re-issued on every
//! CONNACK after a reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{bounded, Receiver, Sender};
use contracts::{BrokerConfig, ContractError, InboundMessage, PubSubClient};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TransportError};

/// Request queue depth between client handle and event loop
const REQUEST_CAPACITY: usize = 64;

/// Delay before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Topics currently subscribed, in subscription order
#[derive(Debug, Clone, Default)]
struct SubscriptionSet {
    topics: Arc<Mutex<Vec<String>>>,
}

impl SubscriptionSet {
    fn insert(&self, topic: &str) {
        let mut topics = self.topics.lock();
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
    }

    fn remove(&self, topic: &str) {
        self.topics.lock().retain(|t| t != topic);
    }

    fn snapshot(&self) -> Vec<String> {
        self.topics.lock().clone()
    }
}

/// Queue a SUBSCRIBE for every tracked topic
///
/// Uses the non-blocking request path because it runs inside the event loop
/// that drains the request queue. Returns the number of requests queued.
fn resubscribe_all(client: &AsyncClient, subscriptions: &SubscriptionSet) -> usize {
    let mut queued = 0;
    for topic in subscriptions.snapshot() {
        match client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            Ok(()) => queued += 1,
            Err(e) => warn!(topic = %topic, error = %e, "re-subscribe failed"),
        }
    }
    queued
}

/// Connected MQTT client
///
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    endpoint: String,
    subscriptions: SubscriptionSet,
    closing: Arc<AtomicBool>,
    event_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("endpoint", &self.endpoint)
            .field("closing", &self.closing.load(Ordering::SeqCst))
            .finish()
    }
}

impl MqttTransport {
    /// Connect to the broker and start the event loop
    ///
    /// Waits for CONNACK up to `config.connect_timeout()`. Returns the client
    /// and the receiver carrying messages for subscribed topics.
    #[instrument(
        name = "mqtt_connect",
        skip(config),
        fields(host = %config.host, port = config.port, client_id = %config.client_id)
    )]
    pub async fn connect(
        config: &BrokerConfig,
        inbound_capacity: usize,
    ) -> Result<(Self, Receiver<InboundMessage>)> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let connect_timeout = config.connect_timeout();
        match tokio::time::timeout(connect_timeout, wait_for_connack(&mut event_loop)).await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                return Err(TransportError::connection_failed(
                    &config.host,
                    config.port,
                    message,
                ))
            }
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    host: config.host.clone(),
                    port: config.port,
                    timeout_ms: connect_timeout.as_millis() as u64,
                })
            }
        }

        info!("connected to broker");

        let (inbound_tx, inbound_rx) = bounded(inbound_capacity);
        let closing = Arc::new(AtomicBool::new(false));
        let subscriptions = SubscriptionSet::default();
        let task = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            subscriptions.clone(),
            inbound_tx,
            closing.clone(),
        ));

        let transport = Self {
            client,
            endpoint: format!("{}:{}", config.host, config.port),
            subscriptions,
            closing,
            event_task: Arc::new(Mutex::new(Some(task))),
        };
        Ok((transport, inbound_rx))
    }

    /// Broker address as `host:port`
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> std::result::Result<(), String> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Drive the connection and forward incoming publishes
///
/// Runs until DISCONNECT goes out or every client handle is gone. Once the
/// inbound receiver is dropped (listener stopped) publishes are discarded but
/// polling continues so queued UNSUBSCRIBE and DISCONNECT requests still
/// reach the broker.
async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    subscriptions: SubscriptionSet,
    inbound_tx: Sender<InboundMessage>,
    closing: Arc<AtomicBool>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if inbound_tx.is_closed() {
                    continue;
                }
                let msg = InboundMessage::new(publish.topic, publish.payload);
                if inbound_tx.send(msg).await.is_err() {
                    debug!("inbound receiver dropped, discarding further publishes");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                let queued = resubscribe_all(&client, &subscriptions);
                info!(topics = queued, "reconnected to broker, subscriptions restored");
            }
            Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                debug!("all client handles dropped, stopping event loop");
                break;
            }
            Err(e) => {
                if closing.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "broker connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    inbound_tx.close();
}

fn client_error(topic: &str, err: rumqttc::ClientError) -> TransportError {
    TransportError::Client {
        message: format!("{topic}: {err}"),
    }
}

impl PubSubClient for MqttTransport {
    fn name(&self) -> &str {
        "mqtt"
    }

    #[instrument(name = "mqtt_subscribe", skip(self))]
    async fn subscribe(&self, topic: &str) -> std::result::Result<(), ContractError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| ContractError::subscription(topic, e.to_string()))?;
        self.subscriptions.insert(topic);
        Ok(())
    }

    #[instrument(name = "mqtt_unsubscribe", skip(self))]
    async fn unsubscribe(&self, topic: &str) -> std::result::Result<(), ContractError> {
        self.subscriptions.remove(topic);
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| ContractError::subscription(topic, e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: String) -> std::result::Result<(), ContractError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(ContractError::publish(topic, "connection closing"));
        }
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .await
            .map_err(|e| ContractError::from(client_error(topic, e)))
    }

    #[instrument(name = "mqtt_disconnect", skip(self), fields(endpoint = %self.endpoint))]
    async fn disconnect(&self) -> std::result::Result<(), ContractError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "disconnect request failed");
        }

        let task = self.event_task.lock().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                warn!("event loop did not stop in time, aborting");
                task.abort();
            }
        }
        info!("disconnected from broker");
        Ok(())
    }
}
