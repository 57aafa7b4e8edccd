//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the coordination core and the outside
//! world. They are defined here (in `app`) so that both the core and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod pin_driver;
pub mod publisher;

pub use pin_driver::{EdgeCallback, PinDriver};
pub use publisher::MessagePublisher;
