//! StdIO host channel.
//!
//! Reads [`HostCommand`] lines from stdin and answers every line with exactly one
//! [`HostReply`] line on stdout, so a supervising process can pair requests with
//! replies by order. Lines that do not parse get an `error` reply carrying the raw
//! line and never stop the loop. EOF ends the channel.

use super::{HostCommand, HostReply, execute};
use crate::bridge::Bridge;
use crate::error::{BridgeError, ClientFacingError};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct StdioHost {
    bridge: Arc<Bridge>,
    reader: Reader,
    writer: Writer,
}

impl StdioHost {
    /// Host channel on the process' stdin/stdout.
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self::with_streams(bridge, tokio::io::stdin(), tokio::io::stdout())
    }

    /// Create a host channel with custom reader & writer (e.g. a parent process pipe)
    pub fn with_streams<R, W>(bridge: Arc<Bridge>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            bridge,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    pub async fn run(self) -> Result<(), BridgeError> {
        info!("Starting stdio host channel");
        let Self {
            bridge,
            reader,
            mut writer,
        } = self;

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let reply = match serde_json::from_str::<HostCommand>(line) {
                Ok(command) => {
                    debug!(?command, "Host command");
                    execute(&bridge, command).await
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse host command");
                    HostReply::Error(ClientFacingError::from(BridgeError::from(e)).with_raw(line))
                }
            };
            write_reply(&mut writer, &reply).await?;
        }
        info!("StdIO host channel exiting (reader closed)");
        Ok(())
    }
}

async fn write_reply(writer: &mut Writer, reply: &HostReply) -> Result<(), BridgeError> {
    let json = match serde_json::to_string(reply) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed serializing host reply");
            return Ok(());
        }
    };
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{RecordingScheduler, RecordingTransport};
    use crate::catalog::InMemoryCatalog;
    use crate::config::BridgeConfig;
    use crate::topics;
    use crate::transport::TransportEvent;
    use serde_json::{Value, json};
    use tokio::io::Lines;

    struct Session {
        input: tokio::io::DuplexStream,
        replies: Lines<BufReader<tokio::io::DuplexStream>>,
        host: tokio::task::JoinHandle<Result<(), BridgeError>>,
        bridge: Arc<Bridge>,
        transport: Arc<RecordingTransport>,
    }

    impl Session {
        fn start() -> Self {
            let mut config = BridgeConfig::default();
            config.data.ip = Some("broker.lan".into());
            let transport = Arc::new(RecordingTransport::default());
            let bridge = Arc::new(Bridge::new(
                config,
                transport.clone(),
                Arc::new(RecordingScheduler::default()),
                Arc::new(InMemoryCatalog::new()),
            ));
            let (input, host_in) = tokio::io::duplex(4096);
            let (host_out, output) = tokio::io::duplex(4096);
            let host = StdioHost::with_streams(bridge.clone(), host_in, host_out);
            Self {
                input,
                replies: BufReader::new(output).lines(),
                host: tokio::spawn(host.run()),
                bridge,
                transport,
            }
        }

        async fn send(&mut self, line: &str) -> Value {
            self.input.write_all(line.as_bytes()).await.unwrap();
            self.input.write_all(b"\n").await.unwrap();
            let reply = self.replies.next_line().await.unwrap().unwrap();
            serde_json::from_str(&reply).unwrap()
        }
    }

    #[tokio::test]
    async fn test_connect_and_status() {
        let mut session = Session::start();
        assert_eq!(
            session.send(r#"{"cmd":"status"}"#).await,
            json!({"type": "status", "state": "DISCONNECTED"})
        );
        assert_eq!(session.send(r#"{"cmd":"connect"}"#).await, json!({"type": "ok"}));
        session
            .bridge
            .handle_event(TransportEvent::Connected.into())
            .await;
        assert_eq!(
            session.send(r#"{"cmd":"status"}"#).await,
            json!({"type": "status", "state": "CONNECTED"})
        );
        assert_eq!(session.send(r#"{"cmd":"enter_standby"}"#).await, json!({"type": "ok"}));
        assert_eq!(
            session.send(r#"{"cmd":"status"}"#).await,
            json!({"type": "status", "state": "DISCONNECTED"})
        );
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_loop_alive() {
        let mut session = Session::start();
        let reply = session.send("not json").await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["code"], "parse_error");
        assert_eq!(reply["raw"], "not json");

        let reply = session
            .send(r#"{"cmd":"send_command","entity_id":"MQTT_DEVICE.tv","feature":"LOUDER"}"#)
            .await;
        assert_eq!(reply["code"], "parse_error");

        assert_eq!(
            session.send(r#"{"cmd":"list_entities"}"#).await,
            json!({"type": "entities", "entities": []})
        );
    }

    #[tokio::test]
    async fn test_commands_reach_the_broker() {
        let mut session = Session::start();
        session.send(r#"{"cmd":"connect"}"#).await;
        session
            .bridge
            .handle_event(
                TransportEvent::Message {
                    topic: topics::DEVICES_CONFIG.into(),
                    payload: br#"{"devices":{"tv":{"Buttons":{"MUTE":["t/mute","m"]}}}}"#.to_vec(),
                }
                .into(),
            )
            .await;

        let reply = session.send(r#"{"cmd":"list_entities"}"#).await;
        assert_eq!(reply["entities"][0]["entity_id"], "MQTT_DEVICE.tv");
        assert_eq!(reply["entities"][0]["supported_features"], json!(["MUTE_TOGGLE"]));
        assert_eq!(reply["entities"][0]["state"], "OFFLINE");

        let reply = session
            .send(r#"{"cmd":"list_buttons","entity_id":"MQTT_DEVICE.tv"}"#)
            .await;
        assert_eq!(
            reply["buttons"],
            json!([{"name": "MUTE", "topic": "t/mute", "payload": "m"}])
        );

        session.transport.clear();
        let reply = session
            .send(r#"{"cmd":"send_command","entity_id":"MQTT_DEVICE.tv","feature":"MUTE_TOGGLE","param":1}"#)
            .await;
        assert_eq!(reply, json!({"type": "ok"}));
        let reply = session
            .send(r#"{"cmd":"send_custom_command","entity_id":"MQTT_DEVICE.tv","index":1}"#)
            .await;
        assert_eq!(reply["code"], "out_of_range");
        assert_eq!(
            session.transport.publishes(),
            [("t/mute".to_string(), "m".to_string())]
        );
    }

    #[tokio::test]
    async fn test_eof_ends_channel() {
        let session = Session::start();
        drop(session.input);
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), session.host)
            .await
            .expect("host did not stop on EOF")
            .unwrap();
        assert!(result.is_ok());
    }
}
