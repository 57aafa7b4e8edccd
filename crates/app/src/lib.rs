//! # boneio-app
//!
//! Application layer: the event coordination core and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `PinDriver`: claim, read, write and watch digital lines
//!   - `MessagePublisher`: fire-and-forget outbound publication
//! - Provide the **cooperative scheduler**: a single consumer loop plus a
//!   thread-safe handle any context may enqueue work through
//! - Own **relay outputs** and keep their published state consistent with
//!   the hardware
//! - Run **input watchers** on dedicated threads and turn edges into clicks
//! - Coordinate everything in the **manager**: dispatch clicks to actions,
//!   apply bus commands, publish discovery, status and state
//!
//! ## Dependency rule
//! Depends on `boneio-domain` only (plus `tokio::sync`/`tokio::time` for the
//! scheduler). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod input;
pub mod manager;
pub mod ports;
pub mod relay;
pub mod scheduler;
