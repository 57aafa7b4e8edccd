//! Input watcher: edge detection and click classification for one input.
//!
//! The pin driver reports raw edges from its own interrupt context. Each
//! watcher forwards them to a dedicated OS thread that runs the
//! [`ClickDetector`] and invokes the click callback on that thread. Callers
//! must treat the callback as running outside the cooperative loop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;

use boneio_domain::click::{ClickDetector, ClickTiming, ClickType};
use boneio_domain::error::HardwareInitError;
use boneio_domain::id::{InputId, PinRef};
use boneio_domain::pin::{Level, Pull};

use crate::ports::PinDriver;

/// Invoked with every classified click, on the watcher thread.
pub type ClickCallback = Box<dyn Fn(ClickType) + Send + 'static>;

/// A running watcher bound to one input line.
///
/// The thread lives as long as the driver keeps the edge callback
/// registered, which for the real board is the whole process lifetime.
pub struct InputWatcher {
    id: InputId,
}

impl InputWatcher {
    /// Claim `pin` as an input and start watching it.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareInitError`] if the pin cannot be claimed, edge
    /// detection cannot be armed, or the watcher thread cannot be started.
    pub fn spawn<D: PinDriver>(
        driver: &D,
        id: InputId,
        pin: &PinRef,
        pull: Pull,
        timing: ClickTiming,
        on_click: ClickCallback,
        parent: &tracing::Span,
    ) -> Result<Self, HardwareInitError> {
        driver.setup_input(pin, pull)?;

        let span = tracing::debug_span!(parent: parent, "input", id = %id, pin = %pin);
        let (tx, rx) = mpsc::channel::<(Level, Instant)>();
        let pressed = pull.pressed_level();

        std::thread::Builder::new()
            .name(format!("input-{id}"))
            .spawn(move || {
                let _entered = span.entered();
                watch(&rx, ClickDetector::new(timing), pressed, &on_click);
                tracing::debug!("input watcher stopped");
            })
            .map_err(|err| HardwareInitError::DriverUnavailable(Box::new(err)))?;

        driver.edge_detect(
            pin,
            Box::new(move |level| {
                // the receiver only goes away once the watcher thread ended
                let _ = tx.send((level, Instant::now()));
            }),
        )?;

        Ok(Self { id })
    }

    #[must_use]
    pub fn id(&self) -> &InputId {
        &self.id
    }
}

fn watch(
    rx: &mpsc::Receiver<(Level, Instant)>,
    mut detector: ClickDetector,
    pressed: Level,
    on_click: &ClickCallback,
) {
    loop {
        let edge = match detector.deadline() {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(edge) => Some(edge),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(edge) => Some(edge),
                Err(_) => return,
            },
        };

        match edge {
            Some((level, at)) => {
                // settle anything that expired before this edge arrived
                if let Some(click) = detector.poll(at) {
                    emit(on_click, click);
                }
                if let Some(click) = detector.on_edge(level == pressed, at) {
                    emit(on_click, click);
                }
            }
            None => {
                if let Some(click) = detector.poll(Instant::now()) {
                    emit(on_click, click);
                }
            }
        }
    }
}

fn emit(on_click: &ClickCallback, click: ClickType) {
    tracing::debug!(%click, "click detected");
    on_click(click);
}
