//! Host control channel.
//!
//! # Overview
//! The host drives the bridge through a small command set and reads back entities
//! and connection state. Commands and replies are JSON objects, one per line.
//!
//! # Commands
//! Tagged by `cmd` (snake_case):
//! ```json
//! { "cmd": "connect" }
//! { "cmd": "disconnect" }
//! { "cmd": "enter_standby" }
//! { "cmd": "leave_standby" }
//! { "cmd": "send_command", "entity_id": "MQTT_DEVICE.tv", "feature": "VOLUME_UP" }
//! { "cmd": "send_custom_command", "entity_id": "MQTT_DEVICE.tv", "index": 1, "param": 3 }
//! { "cmd": "list_entities" }
//! { "cmd": "list_buttons", "entity_id": "MQTT_ACTIVITY.watch_tv" }
//! { "cmd": "status" }
//! ```
//! `param` is accepted on both send commands and not forwarded: button payloads are
//! fixed at discovery time.
//!
//! # Replies
//! Tagged by `type`:
//! ```jsonc
//! { "type": "ok" }
//! { "type": "error", "code": "out_of_range", "message": "...", "raw": "<offending line>" }
//! { "type": "entities", "entities": [ /* EntityRecord */ ] }
//! { "type": "buttons", "entity_id": "...", "buttons": [ { "name": "...", "topic": "...", "payload": "..." } ] }
//! { "type": "status", "state": "CONNECTED" }
//! ```

pub mod stdio;

use crate::bridge::{Bridge, ConnectionState};
use crate::catalog::EntityRecord;
use crate::error::{BridgeError, ClientFacingError, err};
use crate::features::FeatureCode;
use crate::registry::Button;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    Connect,
    Disconnect,
    EnterStandby,
    LeaveStandby,
    SendCommand {
        entity_id: String,
        feature: String,
        #[serde(default)]
        param: Option<Value>,
    },
    SendCustomCommand {
        entity_id: String,
        index: usize,
        #[serde(default)]
        param: Option<Value>,
    },
    ListEntities,
    ListButtons {
        entity_id: String,
    },
    Status,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    Ok,
    Error(ClientFacingError),
    Entities {
        entities: Vec<EntityRecord>,
    },
    Buttons {
        entity_id: String,
        buttons: Vec<Button>,
    },
    Status {
        state: ConnectionState,
    },
}

impl From<BridgeError> for HostReply {
    fn from(e: BridgeError) -> Self {
        HostReply::Error(e.into())
    }
}

fn ok_or_error(result: Result<(), BridgeError>) -> HostReply {
    match result {
        Ok(()) => HostReply::Ok,
        Err(e) => e.into(),
    }
}

/// Runs one host command against the bridge.
pub async fn execute(bridge: &Bridge, command: HostCommand) -> HostReply {
    match command {
        HostCommand::Connect => ok_or_error(bridge.connect().await),
        HostCommand::Disconnect => ok_or_error(bridge.disconnect().await),
        HostCommand::EnterStandby => ok_or_error(bridge.enter_standby().await),
        HostCommand::LeaveStandby => ok_or_error(bridge.leave_standby().await),
        HostCommand::SendCommand {
            entity_id,
            feature,
            param,
        } => match feature.parse::<FeatureCode>() {
            Ok(code) => ok_or_error(bridge.send_command(&entity_id, code, param.as_ref()).await),
            Err(e) => err::parse(e.to_string()).into(),
        },
        HostCommand::SendCustomCommand {
            entity_id,
            index,
            param,
        } => ok_or_error(
            bridge
                .send_custom_command(&entity_id, index, param.as_ref())
                .await,
        ),
        HostCommand::ListEntities => HostReply::Entities {
            entities: bridge.entities(),
        },
        HostCommand::ListButtons { entity_id } => match bridge.buttons(&entity_id).await {
            Ok(buttons) => HostReply::Buttons { entity_id, buttons },
            Err(e) => e.into(),
        },
        HostCommand::Status => HostReply::Status {
            state: bridge.connection_state().await,
        },
    }
}
