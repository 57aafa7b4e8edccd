//! # boneio-domain
//!
//! Pure domain model for the boneio relay board bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, pin levels, error conventions
//! - Define **click types** and the click detection state machine
//! - Define **actions** bound to inputs (`output` → toggle a relay)
//! - Define the **board description** (relays, inputs, discovery, timing)
//! - Define the **topic layout** and the outbound **state messages**
//! - Build Home Assistant **discovery** payloads
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod pin;

pub mod action;
pub mod board;
pub mod click;
pub mod discovery;
pub mod message;
pub mod topic;
