//! Pin driver port: the minimal HAL surface the core depends on.
//!
//! Implementations live in adapter crates (`adapter-gpio` for real
//! hardware, `adapter-virtual` for simulation). All calls are synchronous
//! and expected to be fast; the core calls them from the cooperative loop
//! and from input watcher threads alike.

use boneio_domain::error::HardwareInitError;
use boneio_domain::id::PinRef;
use boneio_domain::pin::{Level, Pull};

/// Callback invoked with the new level on every edge of a watched input.
///
/// Runs on whatever thread the driver detects edges on.
pub type EdgeCallback = Box<dyn Fn(Level) + Send + Sync + 'static>;

/// Digital pin access.
pub trait PinDriver: Send + Sync + 'static {
    /// Claim `pin` as an output.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareInitError`] if the pin is invalid, already claimed,
    /// or the driver cannot be reached.
    fn setup_output(&self, pin: &PinRef) -> Result<(), HardwareInitError>;

    /// Drive a claimed output. Writes to unclaimed pins are ignored.
    fn write_output(&self, pin: &PinRef, level: Level);

    /// Claim `pin` as an input with the given bias.
    ///
    /// # Errors
    ///
    /// Same conditions as [`setup_output`](Self::setup_output).
    fn setup_input(&self, pin: &PinRef, pull: Pull) -> Result<(), HardwareInitError>;

    /// Read the live level of a claimed pin (input or output) and compare it
    /// with `on_state`. Unclaimed pins read as inactive.
    fn read_input(&self, pin: &PinRef, on_state: Level) -> bool;

    /// Register the edge callback of a claimed input. One callback per pin.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareInitError`] if the pin is not a claimed input or the
    /// driver cannot arm edge detection.
    fn edge_detect(&self, pin: &PinRef, callback: EdgeCallback) -> Result<(), HardwareInitError>;
}
