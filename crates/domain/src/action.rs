//! Action: the effect performed when an input reports a click.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::id::RelayId;

/// Action entry as written in the board configuration.
///
/// ```toml
/// single = { action = "output", pin = "relay1" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Action kind. Only `"output"` is supported.
    pub action: String,
    /// Target of the action; for `output` this is the relay id.
    pub pin: String,
}

/// A resolved action bound to a click type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// Toggle the relay with the given id.
    Output { target_relay_id: RelayId },
}

impl TryFrom<&ActionConfig> for ActionSpec {
    type Error = ConfigurationError;

    fn try_from(config: &ActionConfig) -> Result<Self, Self::Error> {
        match config.action.as_str() {
            "output" => Ok(Self::Output {
                target_relay_id: RelayId::from(config.pin.as_str()),
            }),
            other => Err(ConfigurationError::UnknownActionKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Output { target_relay_id } => write!(f, "output({target_relay_id})"),
        }
    }
}
