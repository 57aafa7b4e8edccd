//! Topic layout shared by the board and the bus.
//!
//! | Purpose | Topic | Payload |
//! |---------|-------|---------|
//! | Relay state | `<prefix>/relay/<relay_id>` | `{"state": bool}` |
//! | Relay command | `<prefix>/relay/<relay_id>/set` | `ON` / `OFF` |
//! | Input event | `<prefix>/input/<input_id>` | click label |
//! | Unit status | `<prefix>/state` | `online` / `offline` |
//! | Discovery | `<ha_prefix>/switch/<prefix>/switch/config` | JSON document |

use crate::id::{InputId, RelayId};

pub const RELAY: &str = "relay";
pub const INPUT: &str = "input";
pub const STATE: &str = "state";
pub const SET: &str = "set";

pub const ON: &str = "ON";
pub const OFF: &str = "OFF";
pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Topic builder bound to one board prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn relay_state(&self, relay: &RelayId) -> String {
        format!("{}/{RELAY}/{relay}", self.prefix)
    }

    /// Subscription filter matching every relay command topic.
    #[must_use]
    pub fn relay_command_filter(&self) -> String {
        format!("{}/{RELAY}/+/{SET}", self.prefix)
    }

    #[must_use]
    pub fn input_event(&self, input: &InputId) -> String {
        format!("{}/{INPUT}/{input}", self.prefix)
    }

    #[must_use]
    pub fn unit_state(&self) -> String {
        format!("{}/{STATE}", self.prefix)
    }

    #[must_use]
    pub fn discovery(&self, ha_prefix: &str) -> String {
        format!("{ha_prefix}/switch/{}/switch/config", self.prefix)
    }

    /// Extract the relay id from a command topic.
    ///
    /// Returns `None` unless the topic is exactly
    /// `<prefix>/relay/<relay_id>/set` with a non-empty id.
    #[must_use]
    pub fn parse_relay_command<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let id = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?
            .strip_prefix(RELAY)?
            .strip_prefix('/')?
            .strip_suffix(SET)?
            .strip_suffix('/')?;
        (!id.is_empty()).then_some(id)
    }
}
