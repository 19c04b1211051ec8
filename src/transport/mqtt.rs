//! `rumqttc` implementation of [`BusTransport`].
//!
//! The client is created once, on the first `connect()`. A single poll task drives the
//! event loop and stops at the first error; the bridge decides when to poll again by
//! calling `connect()`, so rumqttc's implicit reconnect-on-poll only happens on the
//! bridge's schedule.
//!
//! After a requested disconnect the poll task keeps polling until rumqttc reports the
//! closed socket, which drops the old network, and exits without reporting
//! `Disconnected`: the bridge initiated it and already knows.

use super::{BrokerEndpoint, BusTransport, TransportEvent};
use crate::bridge::BridgeEvent;
use crate::error::BridgeError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 64;
/// How long `connect()` waits for a closing session to finish on its own.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

struct Session {
    endpoint: BrokerEndpoint,
    client: AsyncClient,
    eventloop: Arc<Mutex<EventLoop>>,
    poller: Option<JoinHandle<()>>,
    /// Set once a DISCONNECT has been queued, cleared when the session is resumed.
    closing: Arc<AtomicBool>,
}

impl Session {
    fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Lets the poller of a closing session run to the end (or stops it after
    /// [`DISCONNECT_GRACE`]) and drops whatever network the event loop still holds.
    async fn finish_closing(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut poller).await.is_err() {
                debug!("Closing MQTT session did not end in time, aborting poller");
                poller.abort();
            }
        }
        // Waits for an aborted poller to release the event loop
        self.eventloop.lock().await.clean();
        self.closing.store(false, Ordering::SeqCst);
    }
}

pub struct MqttTransport {
    keep_alive: Duration,
    events: mpsc::UnboundedSender<BridgeEvent>,
    session: Mutex<Option<Session>>,
}

impl MqttTransport {
    pub fn new(keep_alive: Duration, events: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self {
            keep_alive,
            events,
            session: Mutex::new(None),
        }
    }

    fn create_session(&self, endpoint: &BrokerEndpoint) -> Session {
        info!(host = %endpoint.host, port = endpoint.port, "Creating MQTT client");
        let mut options =
            MqttOptions::new(endpoint.client_id.clone(), endpoint.host.clone(), endpoint.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Session {
            endpoint: endpoint.clone(),
            client,
            eventloop: Arc::new(Mutex::new(eventloop)),
            poller: None,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Polls until the session ends, translating rumqttc events for the bridge.
    async fn drive(
        eventloop: Arc<Mutex<EventLoop>>,
        events: mpsc::UnboundedSender<BridgeEvent>,
        closing: Arc<AtomicBool>,
    ) {
        let mut eventloop = eventloop.lock().await;
        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(session_present = ack.session_present, "MQTT ConnAck received");
                    TransportEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    trace!(
                        target: crate::WIRE_TARGET,
                        topic = %publish.topic,
                        bytes = publish.payload.len(),
                        "MQTT publish received"
                    );
                    TransportEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("MQTT disconnect sent, waiting for the broker to close");
                    continue;
                }
                Ok(_) => continue,
                Err(e) if closing.load(Ordering::SeqCst) => {
                    debug!(error = %e, "MQTT session closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "MQTT connection lost");
                    let _ = events.send(TransportEvent::Disconnected.into());
                    break;
                }
            };
            if events.send(event.into()).is_err() {
                debug!("Bridge event channel closed, stopping MQTT poller");
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl BusTransport for MqttTransport {
    async fn connect(&self, endpoint: &BrokerEndpoint) -> Result<(), BridgeError> {
        let mut guard = self.session.lock().await;
        if guard.as_ref().is_none_or(|s| s.endpoint != *endpoint) {
            if let Some(poller) = guard.take().and_then(|s| s.poller) {
                poller.abort();
            }
            *guard = Some(self.create_session(endpoint));
        }
        let Some(session) = guard.as_mut() else {
            return Err(BridgeError::Internal("MQTT session missing".into()));
        };
        if session.is_closing() {
            session.finish_closing().await;
        } else if session.is_polling() {
            debug!("MQTT poller already running");
            return Ok(());
        }
        info!(host = %endpoint.host, "Connecting to MQTT broker");
        let eventloop = session.eventloop.clone();
        let events = self.events.clone();
        let closing = session.closing.clone();
        session.poller = Some(tokio::spawn(Self::drive(eventloop, events, closing)));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        let guard = self.session.lock().await;
        match guard.as_ref() {
            // A disconnect queued while nothing polls would fire on the next connect
            Some(session) if session.is_polling() && !session.is_closing() => {
                info!("Disconnecting from MQTT broker");
                session.closing.store(true, Ordering::SeqCst);
                if let Err(e) = session.client.try_disconnect() {
                    session.closing.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
            _ => debug!("MQTT session not active, nothing to disconnect"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BridgeError::NotConnected)?;
        session.client.try_subscribe(topic, QoS::AtMostOnce)?;
        debug!(topic, "Subscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BridgeError> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .filter(|s| s.is_polling() && !s.is_closing())
            .ok_or(BridgeError::NotConnected)?;
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }
}
