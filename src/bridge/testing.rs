//! Recording test doubles for the transport and scheduler seams.

use super::scheduler::{ScheduledTask, Scheduler, TimerHandle};
use crate::error::BridgeError;
use crate::transport::{BrokerEndpoint, BusTransport};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect(String),
    Disconnect,
    Subscribe(String),
    Publish { topic: String, payload: String },
}

#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_connect: AtomicBool,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Publish { topic, payload } => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::Connect(_)))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl BusTransport for RecordingTransport {
    async fn connect(&self, endpoint: &BrokerEndpoint) -> Result<(), BridgeError> {
        self.record(TransportCall::Connect(endpoint.host.clone()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("connection refused".into()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BridgeError> {
        self.record(TransportCall::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BridgeError> {
        self.record(TransportCall::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        Ok(())
    }
}

/// Scheduler that only records; tests fire tasks by hand.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(Duration, ScheduledTask, TimerHandle)>>,
}

impl RecordingScheduler {
    /// Tasks scheduled and not cancelled, in scheduling order.
    pub fn pending(&self) -> Vec<(Duration, ScheduledTask)> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, handle)| !handle.is_cancelled())
            .map(|(delay, task, _)| (*delay, *task))
            .collect()
    }

    pub fn pending_reconnects(&self) -> usize {
        self.pending()
            .iter()
            .filter(|(_, task)| *task == ScheduledTask::Reconnect)
            .count()
    }

    /// Forget everything recorded so far (simulates the timers having fired).
    pub fn clear(&self) {
        self.scheduled.lock().unwrap().clear();
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerHandle {
        let handle = TimerHandle::new(None);
        self.scheduled
            .lock()
            .unwrap()
            .push((delay, task, handle.clone()));
        handle
    }
}
