//! One-shot timers for the connection manager.
//!
//! Timers never run bridge logic themselves: when one fires it posts
//! [`BridgeEvent::Timer`] to the bridge event channel, so reconnect and request
//! staggering go through the same serialized path as transport events.

use super::BridgeEvent;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Discovery request published to `mqtt_urc/config/request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRequest {
    Devices,
    Activities,
    CurrentActivity,
}

impl ConfigRequest {
    /// Order in which requests are issued after connect.
    pub const SEQUENCE: [ConfigRequest; 3] = [
        ConfigRequest::Devices,
        ConfigRequest::Activities,
        ConfigRequest::CurrentActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigRequest::Devices => "devices",
            ConfigRequest::Activities => "activities",
            ConfigRequest::CurrentActivity => "currentActivity",
        }
    }

    pub fn payload(self) -> String {
        json!({ "RequestConfig": self.as_str() }).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    RequestConfig(ConfigRequest),
    Reconnect,
}

/// Handle to a scheduled task. Cancelling is idempotent; a cancelled timer never
/// posts its event.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(abort: Option<AbortHandle>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            abort,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle;
}

/// Wall-clock scheduler backed by `tokio::time::sleep`.
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
        trace!(?task, ?delay, "Scheduling timer");
        let mut handle = TimerHandle::new(None);
        let flag = handle.cancelled.clone();
        let events = self.events.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            if events.send(BridgeEvent::Timer(task)).is_err() {
                debug!(?task, "Bridge event channel closed, timer dropped");
            }
        });
        handle.abort = Some(join.abort_handle());
        handle
    }
}
