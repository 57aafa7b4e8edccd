//! Typed identifier newtypes backed by strings.
//!
//! Relays, inputs and pins are all addressed by short human-written names
//! taken from the board configuration (`"relay1"`, `"P8_30"`, `"17"`). They
//! end up verbatim in MQTT topics, so they stay plain strings on the wire.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a name.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the inner name.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier of a relay output within one board.
    RelayId
);

define_id!(
    /// Identifier of a digital input, used as the last input topic segment.
    InputId
);

define_id!(
    /// Reference to a physical pin, as understood by the pin driver.
    PinRef
);

impl From<&PinRef> for RelayId {
    fn from(pin: &PinRef) -> Self {
        Self(pin.0.clone())
    }
}

impl From<&PinRef> for InputId {
    fn from(pin: &PinRef) -> Self {
        Self(pin.0.clone())
    }
}
