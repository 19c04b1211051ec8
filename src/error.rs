//! Unified bridge error types and conversion helpers.
//! These errors are intended for internal use; host-facing serialization
//! happens via `HostReply::Error` in `host::stdio` using `Into<ClientFacingError>`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level classification for mapping to host error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed JSON / payload that does not match the discovery schema
    Parse,
    /// Referenced entity has never been discovered
    NotFound,
    /// Custom command index outside the entity's button list
    OutOfRange,
    /// Bridge configuration is unusable (e.g. no broker address)
    Config,
    /// Bus session is not available
    Transport,
    /// Internal I/O failure (stdin/stdout, config file)
    Io,
    /// Unexpected internal error / bug
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string(self).unwrap_or_else(|_| "internal".into())
        )
    }
}

/// Core error enum used throughout the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("index {index} out of range for {len} buttons")]
    OutOfRange { index: usize, len: usize },
    #[error("config error: {0}")]
    Config(String),
    #[error("not connected to broker")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Parse(_) => ErrorKind::Parse,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
            BridgeError::OutOfRange { .. } => ErrorKind::OutOfRange,
            BridgeError::Config(_) => ErrorKind::Config,
            BridgeError::NotConnected | BridgeError::Transport(_) => ErrorKind::Transport,
            BridgeError::Io(_) => ErrorKind::Io,
            BridgeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Short machine error code string (snake_case) used in host replies.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Parse => "parse_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::Config => "config_error",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Parse(e.to_string())
    }
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(e: rumqttc::ClientError) -> Self {
        BridgeError::Transport(e.to_string())
    }
}

/// Simplified host-facing error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFacingError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl From<BridgeError> for ClientFacingError {
    fn from(err: BridgeError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            raw: None,
        }
    }
}

impl ClientFacingError {
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// Shorthand constructors for common errors.
pub mod err {
    use super::BridgeError;
    pub fn parse(msg: impl Into<String>) -> BridgeError {
        BridgeError::Parse(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> BridgeError {
        BridgeError::NotFound(msg.into())
    }
    pub fn config(msg: impl Into<String>) -> BridgeError {
        BridgeError::Config(msg.into())
    }
}
