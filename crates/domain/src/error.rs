//! Common error types used across the workspace.
//!
//! Startup is the only place errors surface: a pin that cannot be claimed
//! or a board description that cannot be honoured aborts the whole unit.
//! Runtime dispatch never fails.

use crate::id::PinRef;

/// Boxed error coming from a concrete adapter (pin driver, message bus).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Base error for the boneio workspace.
#[derive(Debug, thiserror::Error)]
pub enum BoneIoError {
    #[error("hardware initialisation failed")]
    HardwareInit(#[from] HardwareInitError),

    #[error("invalid board configuration")]
    Configuration(#[from] ConfigurationError),

    /// The message bus adapter failed.
    #[error("message bus error")]
    Bus(#[source] DriverError),
}

/// A pin could not be claimed or configured.
#[derive(Debug, thiserror::Error)]
pub enum HardwareInitError {
    #[error("pin {pin} is already in use")]
    PinInUse { pin: PinRef },

    #[error("invalid pin reference '{pin}'")]
    InvalidPin { pin: PinRef },

    #[error("pin driver unavailable")]
    DriverUnavailable(#[source] DriverError),
}

/// The board description asks for something that is not supported.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown output kind {0:?}")]
    UnknownOutputKind(String),

    #[error("unknown action kind {0:?}")]
    UnknownActionKind(String),

    #[error("relay id {0:?} is configured more than once")]
    DuplicateRelayId(String),

    #[error("topic prefix must not be empty")]
    EmptyTopicPrefix,

    #[error("{field} of {value_ms} ms exceeds the {max_ms} ms limit")]
    DelayTooLong {
        field: &'static str,
        value_ms: u64,
        max_ms: u64,
    },
}
