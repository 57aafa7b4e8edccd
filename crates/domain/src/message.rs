//! Outbound messages handed to the message bus.

use serde_json::Value;

/// Body of a [`StateMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent verbatim (`ON`, `online`, `single`, …).
    Text(String),
    /// Serialised as compact JSON.
    Json(Value),
}

impl Payload {
    /// Encode for the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Json(value) => value.to_string().into_bytes(),
        }
    }

    /// The JSON body, if this is a structured payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A single publication: topic, payload and whether the broker should keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMessage {
    pub topic: String,
    pub payload: Payload,
    pub retain: bool,
}

impl StateMessage {
    /// A non-retained message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    /// Mark the message as retained.
    #[must_use]
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}
