//! Config modules for the bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name searched for in the standard config locations.
pub const CONFIG_FILE_NAME: &str = "mqtt-urc-bridge.toml";
/// Environment variable holding an explicit config path.
pub const CONFIG_PATH_ENV: &str = "MQTT_URC_BRIDGE_CONFIG";

const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub integration: IntegrationConfig,
    /// Integration data object; holds the broker address.
    ///
    /// ```toml
    /// [data]
    /// ip = "192.168.1.20"
    /// ```
    ///
    /// Without an address the bridge starts but cannot connect.
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl BridgeConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: BridgeConfig = Self::from_toml_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {e}"))?;
        Ok(config)
    }

    /// Load configuration from an explicit path, or the standard locations, with
    /// fallback to defaults
    pub fn load_or_default(explicit: Option<PathBuf>) -> Self {
        let explicit = explicit.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        if let Some(path) = explicit {
            match Self::from_file(&path) {
                Ok(mut config) => {
                    tracing::info!("Loaded configuration from: {}", path.display());
                    config.validate_and_fix();
                    return config;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load config from {}: {}. Falling back to standard locations.",
                        path.display(),
                        e
                    );
                }
            }
        }

        // Try to load from standard locations in order: CWD > .config > /etc
        let config_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            dirs::config_dir()
                .map(|config_dir| config_dir.join("mqtt-urc-bridge").join(CONFIG_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
            PathBuf::from("/etc/mqtt-urc-bridge").join(CONFIG_FILE_NAME),
        ];

        for path in &config_paths {
            if path.exists() {
                match Self::from_file(path) {
                    Ok(mut config) => {
                        tracing::info!("Loaded configuration from: {}", path.display());
                        config.validate_and_fix();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load config from {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                    }
                }
                // Only try the first existing config file
                break;
            }
        }

        tracing::info!("No configuration file found, using defaults");
        let mut config = Self::default();
        config.validate_and_fix();
        config
    }

    /// Validate and fix configuration inconsistencies
    pub fn validate_and_fix(&mut self) {
        if let Some(ip) = self.data.ip.take() {
            let trimmed = ip.trim();
            if trimmed.is_empty() {
                tracing::warn!("Empty broker address in [data].ip, treating it as unset");
            } else {
                if trimmed.len() != ip.len() {
                    tracing::warn!("Trimmed whitespace around broker address {:?}", ip);
                }
                self.data.ip = Some(trimmed.to_string());
            }
        }

        if self.timing.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            tracing::warn!(
                "keep_alive_secs = {} is too small, raising it to {}",
                self.timing.keep_alive_secs,
                MIN_KEEP_ALIVE_SECS
            );
            self.timing.keep_alive_secs = MIN_KEEP_ALIVE_SECS;
        }
    }

    /// Broker host, if one is configured.
    pub fn broker_host(&self) -> Option<&str> {
        self.data.ip.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IntegrationConfig {
    /// Integration identifier attached to every discovered entity
    #[serde(default = "default_integration_id")]
    pub id: String,
    #[serde(default = "default_friendly_name")]
    pub friendly_name: String,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            id: default_integration_id(),
            friendly_name: default_friendly_name(),
        }
    }
}

fn default_integration_id() -> String {
    "mqtt".to_string()
}

fn default_friendly_name() -> String {
    "MQTT".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct DataConfig {
    #[serde(default)]
    pub ip: Option<String>,
}

/// Delays used by the connection manager. The request delays only throttle the
/// discovery burst after connect; the tests shrink or ignore them freely.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimingConfig {
    #[serde(default = "default_device_request_delay")]
    pub device_request_delay_ms: u64,
    #[serde(default = "default_activity_request_delay")]
    pub activity_request_delay_ms: u64,
    #[serde(default = "default_current_activity_request_delay")]
    pub current_activity_request_delay_ms: u64,
    /// Flat delay between a lost session and the next connect attempt
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl TimingConfig {
    pub fn device_request_delay(&self) -> Duration {
        Duration::from_millis(self.device_request_delay_ms)
    }

    pub fn activity_request_delay(&self) -> Duration {
        Duration::from_millis(self.activity_request_delay_ms)
    }

    pub fn current_activity_request_delay(&self) -> Duration {
        Duration::from_millis(self.current_activity_request_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            device_request_delay_ms: default_device_request_delay(),
            activity_request_delay_ms: default_activity_request_delay(),
            current_activity_request_delay_ms: default_current_activity_request_delay(),
            reconnect_delay_ms: default_reconnect_delay(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

fn default_device_request_delay() -> u64 {
    1000
}
fn default_activity_request_delay() -> u64 {
    3000
}
fn default_current_activity_request_delay() -> u64 {
    5000
}
fn default_reconnect_delay() -> u64 {
    10000
}
fn default_keep_alive() -> u64 {
    30
}
