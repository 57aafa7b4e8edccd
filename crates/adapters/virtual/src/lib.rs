//! # boneio-adapter-virtual
//!
//! In-memory pin driver for demonstration and testing.
//!
//! Every pin reference is a valid line. Outputs hold the last written
//! level; inputs rest at the idle level implied by their pull and change
//! only when the caller simulates an edge with [`VirtualPins::press`],
//! [`VirtualPins::release`] or [`VirtualPins::set_level`]. Edge callbacks
//! run synchronously on the simulating thread.
//!
//! ## Dependency rule
//!
//! Depends on `boneio-app` (port traits) and `boneio-domain` only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use boneio_app::ports::{EdgeCallback, PinDriver};
use boneio_domain::error::HardwareInitError;
use boneio_domain::id::PinRef;
use boneio_domain::pin::{Level, Pull};

type SharedCallback = Arc<dyn Fn(Level) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Output,
    Input(Pull),
}

struct VirtualPin {
    mode: Mode,
    level: Level,
    on_edge: Option<SharedCallback>,
}

/// Simulated GPIO bank.
#[derive(Default)]
pub struct VirtualPins {
    pins: Mutex<HashMap<PinRef, VirtualPin>>,
}

impl VirtualPins {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a claimed pin.
    #[must_use]
    pub fn level(&self, pin: &str) -> Option<Level> {
        self.lock().get(pin).map(|state| state.level)
    }

    /// Simulate pressing the button wired to input `pin`.
    ///
    /// Returns `false` if `pin` is not a claimed input.
    pub fn press(&self, pin: &str) -> bool {
        self.drive(pin, |pull| pull.pressed_level())
    }

    /// Simulate releasing the button wired to input `pin`.
    ///
    /// Returns `false` if `pin` is not a claimed input.
    pub fn release(&self, pin: &str) -> bool {
        self.drive(pin, |pull| pull.pressed_level().inverted())
    }

    /// Force input `pin` to `level`, firing its edge callback on change.
    ///
    /// Returns `false` if `pin` is not a claimed input.
    pub fn set_level(&self, pin: &str, level: Level) -> bool {
        self.drive(pin, |_| level)
    }

    fn drive(&self, pin: &str, level_for: impl FnOnce(Pull) -> Level) -> bool {
        let callback = {
            let mut pins = self.lock();
            let Some(state) = pins.get_mut(pin) else {
                return false;
            };
            let Mode::Input(pull) = state.mode else {
                return false;
            };
            let level = level_for(pull);
            if state.level == level {
                return true;
            }
            state.level = level;
            state.on_edge.clone().map(|callback| (callback, level))
        };

        if let Some((callback, level)) = callback {
            tracing::trace!(pin, ?level, "virtual edge");
            callback(level);
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PinRef, VirtualPin>> {
        self.pins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, pin: &PinRef, mode: Mode, level: Level) -> Result<(), HardwareInitError> {
        if pin.as_str().trim().is_empty() {
            return Err(HardwareInitError::InvalidPin { pin: pin.clone() });
        }
        let mut pins = self.lock();
        if pins.contains_key(pin) {
            return Err(HardwareInitError::PinInUse { pin: pin.clone() });
        }
        pins.insert(
            pin.clone(),
            VirtualPin {
                mode,
                level,
                on_edge: None,
            },
        );
        tracing::debug!(%pin, ?mode, "virtual pin claimed");
        Ok(())
    }
}

impl PinDriver for VirtualPins {
    fn setup_output(&self, pin: &PinRef) -> Result<(), HardwareInitError> {
        self.claim(pin, Mode::Output, Level::Low)
    }

    fn write_output(&self, pin: &PinRef, level: Level) {
        match self.lock().get_mut(pin) {
            Some(state) if state.mode == Mode::Output => state.level = level,
            _ => tracing::debug!(%pin, "write to unclaimed output ignored"),
        }
    }

    fn setup_input(&self, pin: &PinRef, pull: Pull) -> Result<(), HardwareInitError> {
        self.claim(pin, Mode::Input(pull), pull.pressed_level().inverted())
    }

    fn read_input(&self, pin: &PinRef, on_state: Level) -> bool {
        self.level(pin.as_str()) == Some(on_state)
    }

    fn edge_detect(&self, pin: &PinRef, callback: EdgeCallback) -> Result<(), HardwareInitError> {
        let mut pins = self.lock();
        let state = pins
            .get_mut(pin)
            .ok_or_else(|| HardwareInitError::InvalidPin { pin: pin.clone() })?;
        state.on_edge = Some(Arc::from(callback));
        Ok(())
    }
}
