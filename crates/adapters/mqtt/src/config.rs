//! MQTT bus configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::MqttError;

/// Configuration for the MQTT connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub host: String,
    /// MQTT broker port.
    pub port: u16,
    /// MQTT client identifier. A random `boneio-<uuid>` is used when empty.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pause between reconnection attempts, in seconds.
    pub reconnect_delay_secs: u64,
    /// Capacity of the outbound request queue.
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            keep_alive_secs: 30,
            username: None,
            password: None,
            reconnect_delay_secs: 5,
            request_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Check the settings the client would otherwise reject at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), MqttError> {
        if self.host.trim().is_empty() {
            return Err(MqttError::InvalidConfig("broker host must not be empty"));
        }
        if self.keep_alive_secs < 5 {
            return Err(MqttError::InvalidConfig(
                "keep alive must be at least 5 seconds",
            ));
        }
        if self.request_capacity == 0 {
            return Err(MqttError::InvalidConfig(
                "request capacity must be positive",
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(MqttError::InvalidConfig("password given without username"));
        }
        Ok(())
    }

    /// The configured client id, or a fresh random one.
    #[must_use]
    pub fn client_id(&self) -> String {
        if self.client_id.trim().is_empty() {
            format!("boneio-{}", uuid::Uuid::new_v4())
        } else {
            self.client_id.clone()
        }
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
