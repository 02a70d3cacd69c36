//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - TransportConfig: which link to the device (broker or direct socket)
//!       and the fixed reconnect backoff.
//!     - MqttConfig / DeviceSocketConfig: endpoint details per link kind.
//!     - TopicsConfig: channel names for each reading.
//!     - SpectrumConfig / EnergyConfig: decode and integration policy.
//!     - VisualConfig: heat overlay thresholds.
//!     - ServerConfig, SinkConfig, LoggingConfig.
//!
//! every section has serde defaults, so a partial file is fine.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// where the active configuration came from, reported once logging is up
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// no file found, or every candidate failed to load
    Defaults { failures: Vec<String> },
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardConfig {
    pub transport: TransportConfig,
    pub mqtt: MqttConfig,
    pub device_socket: DeviceSocketConfig,
    pub topics: TopicsConfig,
    pub spectrum: SpectrumConfig,
    pub energy: EnergyConfig,
    pub visual: VisualConfig,
    pub server: ServerConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// publish/subscribe broker
    #[default]
    Mqtt,
    /// websocket served by the device itself
    DeviceSocket,
}

impl TransportKind {
    /// sample rate assumed when a spectrum message omits `fs`
    pub fn default_sample_rate(self) -> f64 {
        match self {
            TransportKind::Mqtt => 3200.0,
            TransportKind::DeviceSocket => 800.0,
        }
    }

    pub fn default_backoff(self) -> Duration {
        match self {
            TransportKind::Mqtt => Duration::from_millis(1000),
            TransportKind::DeviceSocket => Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// fixed delay between reconnect attempts; defaults per transport kind
    pub reconnect_backoff_ms: Option<u64>,
}

impl TransportConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        self.reconnect_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.kind.default_backoff())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// reach the broker through its websocket listener (ws://host:port)
    pub websocket: bool,
    /// request queue between the client handle and the event loop
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "telemetry-dashboard".to_string(),
            keep_alive_secs: 30,
            websocket: false,
            channel_capacity: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceSocketConfig {
    /// device ip or host:port
    pub address: String,
}

impl Default for DeviceSocketConfig {
    fn default() -> Self {
        Self { address: "192.168.4.1".to_string() }
    }
}

impl DeviceSocketConfig {
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.address)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TopicsConfig {
    pub temperature_1: String,
    pub temperature_2: String,
    pub temperature_3: String,
    pub power: String,
    pub spectrum: String,
    pub tilt: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            temperature_1: "ppr/temp/t1".to_string(),
            temperature_2: "ppr/temp/t2".to_string(),
            temperature_3: "ppr/temp/t3".to_string(),
            power: "ppr/power".to_string(),
            spectrum: "ppr/vib/fft".to_string(),
            tilt: "ppr/tilt/angle".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SpectrumConfig {
    /// overrides the per-transport default sample rate
    pub default_sample_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EnergyConfig {
    /// advance the integration boundary on non-positive power samples
    pub advance_on_idle: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VisualConfig {
    pub cool_threshold: f64,
    pub hot_threshold: f64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self { cool_threshold: 20.0, hot_threshold: 100.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SinkConfig {
    /// endpoint that stores accepted readings; no sink when absent
    pub url: Option<String>,
    /// per-request timeout
    pub timeout_ms: u64,
    /// records waiting for the writer; newer records are dropped when full
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { url: None, timeout_ms: 5_000, queue_capacity: 64 }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: false }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load with default fallback
    pub fn load_or_default() -> (Self, ConfigSource) {
        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        let mut failures = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return (config, ConfigSource::File(path.clone())),
                    Err(e) => failures.push(e.to_string()),
                }
            }
        }

        (Self::default(), ConfigSource::Defaults { failures })
    }

    /// sample rate used when a spectrum payload has no usable `fs`
    pub fn default_sample_rate(&self) -> f64 {
        self.spectrum
            .default_sample_rate
            .unwrap_or_else(|| self.transport.kind.default_sample_rate())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        let endpoint = match self.transport.kind {
            TransportKind::Mqtt => format!("mqtt://{}:{}", self.mqtt.host, self.mqtt.port),
            TransportKind::DeviceSocket => self.device_socket.url(),
        };
        tracing::info!(
            endpoint = %endpoint,
            backoff_ms = self.transport.reconnect_backoff().as_millis() as u64,
            bind = %self.server.bind,
            sink = self.sink.url.as_deref().unwrap_or("none"),
            level = %self.logging.level,
            "dashboard configuration"
        );
    }
}
