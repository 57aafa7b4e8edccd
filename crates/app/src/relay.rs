//! Relay output: one physical output line and its published state.

use std::sync::Arc;

use tracing::Instrument;

use boneio_domain::error::HardwareInitError;
use boneio_domain::id::{PinRef, RelayId};
use boneio_domain::message::StateMessage;
use boneio_domain::pin::Level;
use boneio_domain::topic::{STATE, Topics};

use crate::ports::{MessagePublisher, PinDriver};
use crate::scheduler::{SchedulerHandle, Task};

/// A relay driven by a single GPIO line.
///
/// The pin is the only source of truth: [`is_active`](Self::is_active)
/// always reads the hardware. Every transition requests a state publication
/// on the cooperative loop; the loop reads the pin again when it publishes.
///
/// [`toggle`](Self::toggle) is a read followed by a write. Two contexts
/// toggling the same relay at the same instant can lose or duplicate a
/// transition.
pub struct RelayOutput<D> {
    id: RelayId,
    pin: PinRef,
    state_topic: String,
    driver: Arc<D>,
    scheduler: SchedulerHandle,
    span: tracing::Span,
}

impl<D: PinDriver> RelayOutput<D> {
    /// Claim `pin` as an output and force it low.
    ///
    /// `id` defaults to the pin reference.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareInitError`] if the driver refuses the pin.
    pub fn initialize(
        driver: Arc<D>,
        pin: PinRef,
        id: Option<RelayId>,
        topics: &Topics,
        scheduler: SchedulerHandle,
        parent: &tracing::Span,
    ) -> Result<Self, HardwareInitError> {
        let id = id.unwrap_or_else(|| RelayId::from(&pin));
        let span = tracing::debug_span!(parent: parent, "relay", id = %id, pin = %pin);

        driver.setup_output(&pin)?;
        driver.write_output(&pin, Level::Low);
        span.in_scope(|| tracing::debug!("relay output ready"));

        Ok(Self {
            state_topic: topics.relay_state(&id),
            id,
            pin,
            driver,
            scheduler,
            span,
        })
    }

    #[must_use]
    pub fn id(&self) -> &RelayId {
        &self.id
    }

    /// Live hardware state, high means active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.driver.read_input(&self.pin, Level::High)
    }

    /// Drive the line high and schedule a state publication.
    pub fn turn_on(&self) {
        self.set(Level::High);
    }

    /// Drive the line low and schedule a state publication.
    pub fn turn_off(&self) {
        self.set(Level::Low);
    }

    /// Flip the relay based on its current hardware state.
    pub fn toggle(&self) {
        if self.is_active() {
            self.turn_off();
        } else {
            self.turn_on();
        }
    }

    /// The state message for the current hardware level.
    #[must_use]
    pub fn state_message(&self) -> StateMessage {
        StateMessage::new(
            self.state_topic.clone(),
            serde_json::json!({ STATE: self.is_active() }),
        )
    }

    /// Publish the current state.
    pub async fn send_state<P: MessagePublisher>(&self, publisher: &P) {
        let message = self.state_message();
        publisher
            .send_message(message)
            .instrument(self.span.clone())
            .await;
    }

    fn set(&self, level: Level) {
        let _entered = self.span.enter();
        self.driver.write_output(&self.pin, level);
        tracing::debug!(?level, "relay switched");
        self.scheduler.call_soon(Task::SendState(self.id.clone()));
    }
}
