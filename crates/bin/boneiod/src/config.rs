//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `boneio.toml` in the working directory, or at the path given by
//! `BONEIO_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use boneio_adapter_mqtt::MqttConfig;
use boneio_domain::board::BoardConfig;
use boneio_domain::error::ConfigurationError;
use serde::Deserialize;

const DEFAULT_PATH: &str = "boneio.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Board layout and pin driver.
    pub board: BoardSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// The `[board]` table: the board description plus the driver serving it.
#[derive(Debug, Default, Deserialize)]
pub struct BoardSection {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(flatten)]
    pub layout: BoardConfig,
}

/// Which pin driver backs the board.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Physical GPIO lines.
    #[default]
    Gpio,
    /// In-memory pins, for demos.
    Virtual,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "boneiod=info,boneio=info,rumqttc=warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `BONEIO_CONFIG` or `boneio.toml` (if present)
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BONEIO_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("BONEIO_MQTT_HOST") {
            self.mqtt.host = val;
        }
        if let Some(val) = var("BONEIO_MQTT_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.port = port;
        }
        if let Some(val) = var("BONEIO_TOPIC_PREFIX") {
            self.board.layout.topic_prefix = val;
        }
        if let Some(val) = var("BONEIO_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.port == 0 {
            return Err(ConfigError::Validation(
                "mqtt port must be non-zero".to_string(),
            ));
        }
        self.mqtt
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        self.board.layout.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// The board description is inconsistent.
    #[error("invalid board configuration")]
    Board(#[from] ConfigurationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
