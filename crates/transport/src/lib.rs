//! # Transport
//!
//! Broker connections implementing [`contracts::PubSubClient`].
//!
//! - [`MqttTransport`]: real MQTT broker (feature `mqtt`)
//! - [`LoopbackBus`]: in-process bus for tests and broker-less runs
//!
//! Both hand inbound messages to the caller through an
//! `async_channel::Receiver<InboundMessage>` returned at construction.

pub mod error;
pub mod loopback;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackBus, PublishedMessage};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

/// Default inbound queue depth
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;
