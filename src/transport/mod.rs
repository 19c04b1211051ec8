//! Bus transport seam.
//!
//! The bridge never blocks on the network: commands go out through [`BusTransport`]
//! and everything the broker says comes back as a [`TransportEvent`] posted to the
//! bridge event channel.

pub mod mqtt;

use crate::error::BridgeError;

/// Broker port. Not configurable.
pub const BROKER_PORT: u16 = 1883;
/// Client identifier presented to the broker. Not configurable.
pub const CLIENT_ID: &str = "yio-mqtt-urc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

impl BrokerEndpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: BROKER_PORT,
            client_id: CLIENT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message { topic: String, payload: Vec<u8> },
}

#[async_trait::async_trait]
pub trait BusTransport: Send + Sync {
    /// Start (or restart) the session. Success only means the attempt was issued;
    /// the outcome arrives as `Connected`/`Disconnected`.
    async fn connect(&self, endpoint: &BrokerEndpoint) -> Result<(), BridgeError>;

    async fn disconnect(&self) -> Result<(), BridgeError>;

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError>;

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BridgeError>;
}
