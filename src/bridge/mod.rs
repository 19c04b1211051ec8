//! Connection manager and the single state domain of a bridge instance.
//!
//! Transport events and timer expiries arrive on one channel and are applied by
//! [`Bridge::run`]; host calls go through the same mutex, so discovery, dispatch and
//! connection bookkeeping never interleave.

pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

use crate::activity::apply_current_activity;
use crate::catalog::{EntityCatalog, EntityRecord};
use crate::config::BridgeConfig;
use crate::discovery::ConfigIngestor;
use crate::dispatch::CommandDispatcher;
use crate::error::{BridgeError, err};
use crate::features::FeatureCode;
use crate::registry::{Button, ButtonRegistry, EntityCategory};
use crate::topics;
use crate::transport::{BrokerEndpoint, BusTransport, TransportEvent};
use scheduler::{ConfigRequest, ScheduledTask, Scheduler, TimerHandle};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, trace, warn};

/// Everything the bridge reacts to besides host calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Transport(TransportEvent),
    Timer(ScheduledTask),
}

impl From<TransportEvent> for BridgeEvent {
    fn from(event: TransportEvent) -> Self {
        BridgeEvent::Transport(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Default)]
struct BridgeState {
    connection: ConnectionState,
    registry: ButtonRegistry,
    activities: BTreeSet<String>,
    reconnect_timer: Option<TimerHandle>,
    request_timers: Vec<TimerHandle>,
}

impl BridgeState {
    fn cancel_request_timers(&mut self) {
        for timer in self.request_timers.drain(..) {
            timer.cancel();
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            debug!("Cancelling pending reconnect");
            timer.cancel();
        }
    }
}

pub struct Bridge {
    config: BridgeConfig,
    transport: Arc<dyn BusTransport>,
    scheduler: Arc<dyn Scheduler>,
    catalog: Arc<dyn EntityCatalog>,
    state: Mutex<BridgeState>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn BusTransport>,
        scheduler: Arc<dyn Scheduler>,
        catalog: Arc<dyn EntityCatalog>,
    ) -> Self {
        Self {
            config,
            transport,
            scheduler,
            catalog,
            state: Mutex::new(BridgeState::default()),
        }
    }

    /// Applies events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Bridge event channel closed");
    }

    pub async fn handle_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Transport(TransportEvent::Connected) => self.on_connected().await,
            BridgeEvent::Transport(TransportEvent::Disconnected) => self.on_disconnected().await,
            BridgeEvent::Transport(TransportEvent::Message { topic, payload }) => {
                self.handle_message(&topic, &payload).await
            }
            BridgeEvent::Timer(task) => self.on_timer(task).await,
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    /// Starts a session. The bridge reports `Connected` only once the broker confirms.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        let endpoint = self.endpoint()?;
        let mut state = self.state.lock().await;
        if state.connection == ConnectionState::Connected {
            debug!("Already connected");
            return Ok(());
        }
        state.connection = ConnectionState::Connecting;
        state.cancel_reconnect();
        info!(host = %endpoint.host, "Connecting");
        if let Err(e) = self.transport.connect(&endpoint).await {
            warn!(error = %e, "Connect attempt failed");
            self.schedule_reconnect(&mut state);
            return Err(e);
        }
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        // Set first: the transport's Disconnected event must read as user-initiated
        state.connection = ConnectionState::Disconnected;
        state.cancel_reconnect();
        state.cancel_request_timers();
        info!("Disconnecting");
        self.transport.disconnect().await
    }

    pub async fn enter_standby(&self) -> Result<(), BridgeError> {
        debug!("Entering standby");
        self.disconnect().await
    }

    pub async fn leave_standby(&self) -> Result<(), BridgeError> {
        debug!("Leaving standby");
        self.connect().await
    }

    /// Publishes the button mapped to `code`. Lookup misses are logged and ignored.
    pub async fn send_command(
        &self,
        entity_id: &str,
        code: FeatureCode,
        param: Option<&Value>,
    ) -> Result<(), BridgeError> {
        if let Some(param) = param {
            trace!(entity_id, %param, "Ignoring command parameter");
        }
        let button = {
            let state = self.state.lock().await;
            CommandDispatcher::new(&state.registry).canonical(entity_id, code)
        };
        match button {
            Some(button) => self.publish_button(entity_id, &button).await,
            None => Ok(()),
        }
    }

    /// Publishes the button at `index` of the entity's custom feature list.
    pub async fn send_custom_command(
        &self,
        entity_id: &str,
        index: usize,
        param: Option<&Value>,
    ) -> Result<(), BridgeError> {
        if EntityCategory::of(entity_id).is_none() {
            return Err(err::not_found(format!("{entity_id} is not a bridge entity")));
        }
        if let Some(param) = param {
            trace!(entity_id, %param, "Ignoring command parameter");
        }
        let button = {
            let state = self.state.lock().await;
            CommandDispatcher::new(&state.registry).custom(entity_id, index)
        };
        let button = button.inspect_err(|e| {
            error!(entity_id, index, error = %e, "Custom command does not resolve to a button");
        })?;
        if let Some(name) = self
            .catalog
            .get_entity(entity_id)
            .and_then(|e| e.command_name(index).map(str::to_owned))
        {
            debug!(entity_id, index, command = %name, "Custom command");
        }
        self.publish_button(entity_id, &button).await
    }

    /// Registered buttons of an entity, in dispatch order.
    pub async fn buttons(&self, entity_id: &str) -> Result<Vec<Button>, BridgeError> {
        let state = self.state.lock().await;
        state.registry.get_buttons(entity_id).map(<[Button]>::to_vec)
    }

    pub fn entities(&self) -> Vec<EntityRecord> {
        self.catalog.entities()
    }

    fn endpoint(&self) -> Result<BrokerEndpoint, BridgeError> {
        match self.config.broker_host() {
            Some(host) => Ok(BrokerEndpoint::new(host)),
            None => {
                error!("No broker address configured, set [data].ip");
                Err(err::config("no broker address configured"))
            }
        }
    }

    async fn publish_button(&self, entity_id: &str, button: &Button) -> Result<(), BridgeError> {
        debug!(
            target: crate::WIRE_TARGET,
            entity_id,
            button = button.name(),
            topic = button.topic(),
            payload = button.payload(),
            "Publishing button"
        );
        self.transport
            .publish(button.topic(), button.payload().as_bytes())
            .await
    }

    fn schedule_reconnect(&self, state: &mut BridgeState) {
        if state
            .reconnect_timer
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
        {
            debug!("Reconnect already pending");
            return;
        }
        let delay = self.config.timing.reconnect_delay();
        info!(?delay, "Scheduling reconnect");
        state.reconnect_timer = Some(self.scheduler.schedule(delay, ScheduledTask::Reconnect));
    }

    async fn on_connected(&self) {
        let mut state = self.state.lock().await;
        if state.connection == ConnectionState::Disconnected {
            debug!("Ignoring connect confirmation after disconnect");
            return;
        }
        state.cancel_reconnect();
        state.connection = ConnectionState::Connected;
        info!("Connected to broker");

        for topic in topics::SUBSCRIPTIONS {
            if let Err(e) = self.transport.subscribe(topic).await {
                warn!(topic, error = %e, "Subscribe failed");
            }
        }

        state.cancel_request_timers();
        let timing = &self.config.timing;
        let delays: [Duration; 3] = [
            timing.device_request_delay(),
            timing.activity_request_delay(),
            timing.current_activity_request_delay(),
        ];
        for (request, delay) in ConfigRequest::SEQUENCE.into_iter().zip(delays) {
            let timer = self
                .scheduler
                .schedule(delay, ScheduledTask::RequestConfig(request));
            state.request_timers.push(timer);
        }
    }

    async fn on_disconnected(&self) {
        let mut state = self.state.lock().await;
        state.cancel_request_timers();
        if state.connection == ConnectionState::Disconnected {
            debug!("Session closed on request");
            return;
        }
        warn!("Lost connection to broker");
        state.connection = ConnectionState::Connecting;
        self.schedule_reconnect(&mut state);
    }

    async fn on_timer(&self, task: ScheduledTask) {
        match task {
            ScheduledTask::Reconnect => {
                let mut state = self.state.lock().await;
                state.reconnect_timer = None;
                // A user disconnect can race a timer that already fired
                if state.connection != ConnectionState::Connecting {
                    debug!(state = ?state.connection, "Skipping reconnect");
                    return;
                }
                let result = match self.endpoint() {
                    Ok(endpoint) => self.transport.connect(&endpoint).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!(error = %e, "Reconnect attempt failed");
                    self.schedule_reconnect(&mut state);
                }
            }
            ScheduledTask::RequestConfig(request) => {
                let state = self.state.lock().await;
                if state.connection != ConnectionState::Connected {
                    debug!(request = request.as_str(), "Not connected, dropping config request");
                    return;
                }
                info!(request = request.as_str(), "Requesting config");
                let payload = request.payload();
                if let Err(e) = self
                    .transport
                    .publish(topics::CONFIG_REQUEST, payload.as_bytes())
                    .await
                {
                    warn!(request = request.as_str(), error = %e, "Config request failed");
                }
            }
        }
    }

    async fn handle_message(&self, topic: &str, payload: &[u8]) {
        trace!(target: crate::WIRE_TARGET, topic, payload = %String::from_utf8_lossy(payload), "Message");

        if topic == topics::CURRENT_ACTIVITY {
            let name = String::from_utf8_lossy(payload);
            let state = self.state.lock().await;
            for transition in
                apply_current_activity(self.catalog.as_ref(), &state.activities, &name)
            {
                info!(entity_id = %transition.entity_id, state = ?transition.state, "Activity state changed");
            }
            return;
        }

        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(topic, error = %e, "Dropping malformed payload");
                return;
            }
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let ingestor = ConfigIngestor::new(self.catalog.as_ref(), &self.config.integration.id);
        if topic == topics::DEVICES_CONFIG {
            if let Some(devices) = value.get("devices").and_then(Value::as_object) {
                let report = ingestor.ingest_devices(&mut state.registry, devices);
                info!(
                    added = report.added.len(),
                    updated = report.updated.len(),
                    skipped = report.skipped.len(),
                    "Device discovery applied"
                );
                return;
            }
        } else if topic == topics::ACTIVITIES_CONFIG {
            if let Some(activities) = value.get("activities").and_then(Value::as_object) {
                let report =
                    ingestor.ingest_activities(&mut state.registry, &mut state.activities, activities);
                info!(
                    added = report.added.len(),
                    updated = report.updated.len(),
                    skipped = report.skipped.len(),
                    "Activity discovery applied"
                );
                return;
            }
        }
        debug!(topic, "Ignoring message");
    }
}
