//! Home Assistant MQTT discovery payloads.

use serde_json::{Value, json};

use crate::topic::{OFF, ON, RELAY, STATE, SET};

pub const MANUFACTURER: &str = "BoneIO";
pub const MODEL: &str = "BoneIO Relay Board";

/// Build the `switch` discovery document for one relay.
///
/// Pure and deterministic: identical inputs always yield an identical
/// document, so re-registering on every start is harmless.
#[must_use]
pub fn build_discovery(board_topic: &str, relay_id: &str) -> Value {
    json!({
        "availability": [{ "topic": format!("{board_topic}/{STATE}") }],
        "command_topic": format!("{board_topic}/{RELAY}/{relay_id}/{SET}"),
        "device": {
            "identifiers": [board_topic],
            "manufacturer": MANUFACTURER,
            "model": MODEL,
            "name": format!("{MANUFACTURER} {board_topic}"),
            "sw_version": env!("CARGO_PKG_VERSION"),
        },
        "name": format!("Relay {relay_id}"),
        "payload_off": OFF,
        "payload_on": ON,
        "state_topic": format!("{board_topic}/{RELAY}/{relay_id}"),
        "unique_id": format!("{board_topic}{RELAY}{relay_id}"),
        "value_template": "{{ value_json.state }}",
    })
}
