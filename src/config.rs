use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::trace;

use crate::registry::{Channel, ChannelRegistry};

/// Full monitor configuration, loaded once at startup.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Identifier of the vehicle this device belongs to
    pub rover_id: String,

    /// Identifier of the device running the monitor
    pub device_id: String,

    #[serde(default)]
    pub location: Location,

    pub sink: SinkConfig,

    /// Channels to watch, in report order
    pub channels: Vec<Channel>,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub records: RecordConfig,
}

/// Static coordinates attached to every record sent to the sink.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Location {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Location {
    /// Coordinates as the sink expects them: strings, empty when unknown.
    pub fn as_strings(&self) -> [String; 3] {
        [self.x, self.y, self.z].map(|c| c.map(|v| v.to_string()).unwrap_or_default())
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SinkConfig {
    pub health_check_url: String,
    pub activity_url: String,
    pub error_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Broker connection settings for the MQTT transport.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Request channel capacity of the client
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            capacity: default_capacity(),
        }
    }
}

/// Fixed identifiers of the summary records.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub activity_id: String,
    pub activity_type: String,
    pub activity_description: String,
    pub error_activity_id: String,
    pub error_activity_type: String,
    pub error_code: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            activity_id: "act-1001".into(),
            activity_type: "Topic Health Check".into(),
            activity_description: "All ROS2 topics are publishing data".into(),
            error_activity_id: "act-5647".into(),
            error_activity_type: "Topic Monitoring Error".into(),
            error_code: "E204".into(),
        }
    }
}

fn default_sink_timeout() -> u64 {
    10
}

fn default_tick_ms() -> u64 {
    100
}

fn default_deadline_ms() -> u64 {
    5_000
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "topic-monitor".into()
}

fn default_keep_alive() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_capacity() -> usize {
    10
}

impl Config {
    /// Check everything deserialization cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rover_id.trim().is_empty() {
            bail!("rover_id must not be empty");
        }
        if self.device_id.trim().is_empty() {
            bail!("device_id must not be empty");
        }

        for (name, url) in [
            ("health_check_url", &self.sink.health_check_url),
            ("activity_url", &self.sink.activity_url),
            ("error_url", &self.sink.error_url),
        ] {
            reqwest::Url::parse(url).with_context(|| format!("invalid sink {name} '{url}'"))?;
        }

        if self.timing.tick_ms == 0 {
            bail!("timing.tick_ms must be greater than zero");
        }
        if self.timing.deadline_ms < self.timing.tick_ms {
            bail!("timing.deadline_ms must not be shorter than timing.tick_ms");
        }

        self.registry().map(|_| ())
    }

    pub fn registry(&self) -> anyhow::Result<ChannelRegistry> {
        ChannelRegistry::new(self.channels.clone())
    }
}

/// Load and validate a configuration file.
///
/// Files ending in `.toml` are parsed as TOML, everything else as JSON.
pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?,
        _ => serde_json::from_str(&file_content)
            .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?,
    };

    config.validate()?;
    trace!("loaded config: {config:?}");

    Ok(config)
}
