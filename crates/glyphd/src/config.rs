//! Configuration file parsing and structures.
//!
//! glyphd reads a single TOML file. Every section is optional; missing
//! values take the defaults below. Credentials and the selected entity are
//! not part of this file, they live in the settings store (see
//! [`crate::settings`]).

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub monitor: MonitorConfig,
    pub http: HttpConfig,
    pub sprites: SpritesConfig,
    pub settings: SettingsConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"glyphd::monitor" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Timing of the poll loop and the reconnect backoff.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    /// Delay between a toggle call and the poll that reconciles it
    pub toggle_settle_ms: u64,
    /// Consecutive failed polls before the error sprite is shown
    pub failure_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            reconnect_delay_ms: 3000,
            toggle_settle_ms: 1000,
            failure_threshold: 3,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn toggle_settle(&self) -> Duration {
        Duration::from_millis(self.toggle_settle_ms)
    }
}

/// Transport timeouts for the state API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpritesConfig {
    /// Directory containing `sprites/HA-{on,off,error}.json`
    pub assets_dir: PathBuf,
}

impl Default for SpritesConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("glyphd-settings.toml"),
        }
    }
}

fn default_driver() -> String {
    "console".to_string()
}

fn default_device_id() -> String {
    "DEVICE_23112".to_string()
}

fn default_matrix_size() -> usize {
    25
}

/// Display driver selection and matrix geometry.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Name of the driver to use ("console", "mqtt")
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Identifier passed to the driver on registration
    #[serde(default = "default_device_id")]
    pub device_id: String,

    #[serde(default = "default_matrix_size")]
    pub width: usize,

    #[serde(default = "default_matrix_size")]
    pub height: usize,

    #[serde(default)]
    pub mqtt: Option<MqttDisplayConfig>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            device_id: default_device_id(),
            width: default_matrix_size(),
            height: default_matrix_size(),
            mqtt: None,
        }
    }
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "glyphd".to_string()
}

/// Settings for a matrix reached over MQTT.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttDisplayConfig {
    /// MQTT broker hostname or IP address
    pub broker: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client ID (default: "glyphd-<hostname>")
    #[serde(default)]
    pub client_id: Option<String>,

    /// Frames go to `{prefix}/frame`, button events arrive on `{prefix}/event`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("monitor.poll_interval_ms", self.monitor.poll_interval_ms),
            ("monitor.reconnect_delay_ms", self.monitor.reconnect_delay_ms),
            (
                "monitor.failure_threshold",
                u64::from(self.monitor.failure_threshold),
            ),
            ("display.width", self.display.width as u64),
            ("display.height", self.display.height as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be greater than 0",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Like [`Config::from_file`], but a missing file yields the defaults.
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
