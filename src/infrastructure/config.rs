use crate::domain::aggregate::{
    AggregateLimits, DEFAULT_SPECTRUM_CAPACITY, DEFAULT_THROUGHPUT_CAPACITY,
};
use crate::domain::telemetry::DEFAULT_HZ_THRESHOLD;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:8765/telemetry";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub aggregate: AggregateSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Serial device if present, then a TCP bridge, then WebSocket.
    #[default]
    Auto,
    Serial,
    Tcp,
    Websocket,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransportSettings {
    #[serde(default)]
    pub mode: TransportMode,
    pub serial_device: Option<PathBuf>,
    pub tcp_address: Option<String>,
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregateSettings {
    #[serde(default = "default_throughput_capacity")]
    pub throughput_capacity: usize,
    #[serde(default = "default_spectrum_capacity")]
    pub spectrum_capacity: usize,
    #[serde(default = "default_hz_threshold")]
    pub hz_threshold: f64,
    #[serde(default)]
    pub reset_on_disconnect: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            stream_interval_ms: default_stream_interval_ms(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            serial_device: None,
            tcp_address: None,
            websocket_url: default_websocket_url(),
            read_buffer_bytes: default_read_buffer_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            throughput_capacity: default_throughput_capacity(),
            spectrum_capacity: default_spectrum_capacity(),
            hz_threshold: default_hz_threshold(),
            reset_on_disconnect: false,
        }
    }
}

impl AggregateSettings {
    pub fn limits(&self) -> AggregateLimits {
        AggregateLimits {
            throughput_capacity: self.throughput_capacity,
            spectrum_capacity: self.spectrum_capacity,
            hz_threshold: self.hz_threshold,
        }
    }
}

impl TransportSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.aggregate.throughput_capacity == 0 || self.aggregate.spectrum_capacity == 0 {
            anyhow::bail!("aggregate capacities must be greater than zero");
        }
        if self.transport.read_buffer_bytes == 0 {
            anyhow::bail!("transport.read_buffer_bytes must be greater than zero");
        }
        if self.transport.connect_timeout_ms == 0 {
            anyhow::bail!("transport.connect_timeout_ms must be greater than zero");
        }
        match self.transport.mode {
            TransportMode::Serial if self.transport.serial_device.is_none() => {
                anyhow::bail!("transport.mode = serial requires transport.serial_device")
            }
            TransportMode::Tcp if self.transport.tcp_address.is_none() => {
                anyhow::bail!("transport.mode = tcp requires transport.tcp_address")
            }
            _ => Ok(()),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_stream_interval_ms() -> u64 {
    500
}

fn default_websocket_url() -> String {
    DEFAULT_WEBSOCKET_URL.to_string()
}

fn default_read_buffer_bytes() -> usize {
    4096
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_throughput_capacity() -> usize {
    DEFAULT_THROUGHPUT_CAPACITY
}

fn default_spectrum_capacity() -> usize {
    DEFAULT_SPECTRUM_CAPACITY
}

fn default_hz_threshold() -> f64 {
    DEFAULT_HZ_THRESHOLD
}

/// Load `config/telemetry.*` (optional) with `RF_TELEMETRY__SECTION__KEY` overrides.
pub fn load_telemetry_config() -> anyhow::Result<TelemetryConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/telemetry").required(false))
        .add_source(
            config::Environment::with_prefix("RF_TELEMETRY")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: TelemetryConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
