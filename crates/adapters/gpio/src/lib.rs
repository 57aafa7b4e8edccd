//! # boneio-adapter-gpio
//!
//! Pin driver for Raspberry Pi style GPIO, built on `rppal`.
//!
//! Pin references are BCM line numbers written as strings (`"17"`).
//! Claimed lines are kept open for the lifetime of the driver; dropping the
//! driver releases them and cancels every edge interrupt.
//!
//! Edge callbacks run on rppal's interrupt thread, one per input.
//!
//! ## Dependency rule
//!
//! Depends on `boneio-app` (port traits) and `boneio-domain` only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

use boneio_app::ports::{EdgeCallback, PinDriver};
use boneio_domain::error::HardwareInitError;
use boneio_domain::id::PinRef;
use boneio_domain::pin::{Level, Pull};

/// GPIO lines of the host SoC.
pub struct RppalDriver {
    gpio: Gpio,
    outputs: Mutex<HashMap<PinRef, OutputPin>>,
    inputs: Mutex<HashMap<PinRef, InputPin>>,
}

impl RppalDriver {
    /// Open the GPIO peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareInitError::DriverUnavailable`] when the peripheral
    /// cannot be accessed (unsupported board, missing permissions).
    pub fn new() -> Result<Self, HardwareInitError> {
        let gpio = Gpio::new().map_err(map_error)?;
        tracing::info!("gpio peripheral opened");
        Ok(Self {
            gpio,
            outputs: Mutex::new(HashMap::new()),
            inputs: Mutex::new(HashMap::new()),
        })
    }

    fn claim(&self, pin: &PinRef) -> Result<rppal::gpio::Pin, HardwareInitError> {
        let line = parse_line(pin)?;
        if lock(&self.outputs).contains_key(pin) || lock(&self.inputs).contains_key(pin) {
            return Err(HardwareInitError::PinInUse { pin: pin.clone() });
        }
        self.gpio.get(line).map_err(|err| match err {
            rppal::gpio::Error::PinUsed(_) => HardwareInitError::PinInUse { pin: pin.clone() },
            rppal::gpio::Error::PinNotAvailable(_) => {
                HardwareInitError::InvalidPin { pin: pin.clone() }
            }
            other => map_error(other),
        })
    }
}

impl PinDriver for RppalDriver {
    fn setup_output(&self, pin: &PinRef) -> Result<(), HardwareInitError> {
        let output = self.claim(pin)?.into_output_low();
        lock(&self.outputs).insert(pin.clone(), output);
        tracing::debug!(%pin, "output claimed");
        Ok(())
    }

    fn write_output(&self, pin: &PinRef, level: Level) {
        match lock(&self.outputs).get_mut(pin) {
            Some(output) => output.write(to_rppal(level)),
            None => tracing::warn!(%pin, "write to unclaimed output ignored"),
        }
    }

    fn setup_input(&self, pin: &PinRef, pull: Pull) -> Result<(), HardwareInitError> {
        let line = self.claim(pin)?;
        let input = match pull {
            Pull::Up => line.into_input_pullup(),
            Pull::Down => line.into_input_pulldown(),
            Pull::None => line.into_input(),
        };
        lock(&self.inputs).insert(pin.clone(), input);
        tracing::debug!(%pin, ?pull, "input claimed");
        Ok(())
    }

    fn read_input(&self, pin: &PinRef, on_state: Level) -> bool {
        let level = if let Some(output) = lock(&self.outputs).get(pin) {
            if output.is_set_high() {
                Level::High
            } else {
                Level::Low
            }
        } else if let Some(input) = lock(&self.inputs).get(pin) {
            from_rppal(input.read())
        } else {
            tracing::warn!(%pin, "read from unclaimed pin");
            return false;
        };
        level == on_state
    }

    fn edge_detect(&self, pin: &PinRef, callback: EdgeCallback) -> Result<(), HardwareInitError> {
        let mut inputs = lock(&self.inputs);
        let input = inputs
            .get_mut(pin)
            .ok_or_else(|| HardwareInitError::InvalidPin { pin: pin.clone() })?;
        input
            .set_async_interrupt(Trigger::Both, move |level| callback(from_rppal(level)))
            .map_err(map_error)?;
        tracing::debug!(%pin, "edge detection armed");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse_line(pin: &PinRef) -> Result<u8, HardwareInitError> {
    pin.as_str()
        .trim()
        .parse()
        .map_err(|_| HardwareInitError::InvalidPin { pin: pin.clone() })
}

fn map_error(err: rppal::gpio::Error) -> HardwareInitError {
    HardwareInitError::DriverUnavailable(Box::new(err))
}

fn to_rppal(level: Level) -> rppal::gpio::Level {
    match level {
        Level::Low => rppal::gpio::Level::Low,
        Level::High => rppal::gpio::Level::High,
    }
}

fn from_rppal(level: rppal::gpio::Level) -> Level {
    match level {
        rppal::gpio::Level::Low => Level::Low,
        rppal::gpio::Level::High => Level::High,
    }
}
