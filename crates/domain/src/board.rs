//! Board description: which relays and inputs exist and how they are wired.
//!
//! These are the plain configuration records deserialised from the
//! `[board]` section of the daemon configuration. Resolution into runtime
//! objects (and the associated validation) happens when the manager is
//! built.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::{ActionConfig, ActionSpec};
use crate::click::{ClickTiming, ClickType};
use crate::error::ConfigurationError;
use crate::id::{InputId, PinRef, RelayId};
use crate::pin::Pull;

/// Upper bound for every configured delay, in milliseconds.
pub const MAX_DELAY_MS: u64 = 3_600_000;

/// Supported relay output implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// A relay driven directly by one GPIO line.
    Gpio,
}

impl FromStr for OutputKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpio" => Ok(Self::Gpio),
            other => Err(ConfigurationError::UnknownOutputKind(other.to_string())),
        }
    }
}

/// Complete board description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Prefix of every topic published by this board.
    pub topic_prefix: String,
    /// Home Assistant MQTT discovery.
    pub ha_discovery: HaDiscoveryConfig,
    /// Delay before the first relay state broadcast, in milliseconds.
    pub initial_state_delay_ms: u64,
    /// Click detection timing shared by all inputs.
    pub timing: ClickTiming,
    pub relays: Vec<RelayConfig>,
    pub inputs: Vec<InputConfig>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "boneio".to_string(),
            ha_discovery: HaDiscoveryConfig::default(),
            initial_state_delay_ms: 500,
            timing: ClickTiming::default(),
            relays: Vec::new(),
            inputs: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Check the invariants that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyTopicPrefix`] when the prefix is
    /// blank, [`ConfigurationError::DuplicateRelayId`] when two relays
    /// resolve to the same id and [`ConfigurationError::DelayTooLong`] when
    /// a delay exceeds [`MAX_DELAY_MS`].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.topic_prefix.trim().is_empty() {
            return Err(ConfigurationError::EmptyTopicPrefix);
        }
        let delays = [
            ("initial_state_delay_ms", self.initial_state_delay_ms),
            ("timing.debounce_ms", self.timing.debounce_ms),
            ("timing.double_click_ms", self.timing.double_click_ms),
            ("timing.long_press_ms", self.timing.long_press_ms),
        ];
        if let Some(&(field, value_ms)) = delays.iter().find(|(_, ms)| *ms > MAX_DELAY_MS) {
            return Err(ConfigurationError::DelayTooLong {
                field,
                value_ms,
                max_ms: MAX_DELAY_MS,
            });
        }
        let mut seen = HashSet::new();
        for relay in &self.relays {
            let id = relay.relay_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigurationError::DuplicateRelayId(id.to_string()));
            }
        }
        Ok(())
    }
}

/// Home Assistant discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HaDiscoveryConfig {
    pub enabled: bool,
    /// Discovery prefix configured in Home Assistant.
    pub topic_prefix: String,
}

impl Default for HaDiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topic_prefix: "homeassistant".to_string(),
        }
    }
}

/// One relay output entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub pin: PinRef,
    /// Explicit id; the pin reference is used when absent.
    #[serde(default)]
    pub id: Option<RelayId>,
    /// Output implementation, see [`OutputKind`].
    #[serde(default = "default_output_kind")]
    pub kind: String,
}

fn default_output_kind() -> String {
    "gpio".to_string()
}

impl RelayConfig {
    /// The id this relay is addressed by.
    #[must_use]
    pub fn relay_id(&self) -> RelayId {
        self.id.clone().unwrap_or_else(|| RelayId::from(&self.pin))
    }

    /// Parse the configured kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownOutputKind`] for anything but `gpio`.
    pub fn output_kind(&self) -> Result<OutputKind, ConfigurationError> {
        self.kind.parse()
    }
}

/// One digital input entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub pin: PinRef,
    /// Explicit id; the pin reference is used when absent.
    #[serde(default)]
    pub id: Option<InputId>,
    #[serde(default)]
    pub pull: Pull,
    #[serde(default)]
    pub actions: HashMap<ClickType, ActionConfig>,
}

impl InputConfig {
    /// The id this input publishes under.
    #[must_use]
    pub fn input_id(&self) -> InputId {
        self.id.clone().unwrap_or_else(|| InputId::from(&self.pin))
    }

    /// Resolve every configured action.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownActionKind`] on the first
    /// unsupported action.
    pub fn resolve_actions(&self) -> Result<HashMap<ClickType, ActionSpec>, ConfigurationError> {
        self.actions
            .iter()
            .map(|(click, action)| Ok((*click, ActionSpec::try_from(action)?)))
            .collect()
    }
}
