//! Click types and the press-pattern state machine that produces them.
//!
//! The detector is fed raw edges together with the instant they were
//! observed. It never reads a clock itself.

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Classification of a button press pattern, used as a dispatch key.
///
/// Deserialised through [`FromStr`] so it also works as a map key in
/// configuration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ClickType {
    Single,
    Double,
    Long,
}

impl ClickType {
    /// Label published on the input topic.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Long => "long",
        }
    }
}

/// A click label that is not one of `single`, `double`, `long`.
#[derive(Debug, thiserror::Error)]
#[error("unknown click type {0:?}")]
pub struct UnknownClickType(String);

impl FromStr for ClickType {
    type Err = UnknownClickType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            "long" => Ok(Self::Long),
            other => Err(UnknownClickType(other.to_string())),
        }
    }
}

impl TryFrom<String> for ClickType {
    type Error = UnknownClickType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for ClickType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing parameters of click detection, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickTiming {
    /// Pulses shorter than this are bounces.
    pub debounce_ms: u64,
    /// How long a released click waits for a second press.
    pub double_click_ms: u64,
    /// Holding at least this long is a long press.
    pub long_press_ms: u64,
}

impl Default for ClickTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            double_click_ms: 220,
            long_press_ms: 400,
        }
    }
}

impl ClickTiming {
    fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn double_click(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }

    fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// Button down. `pending` is set when a short click precedes this press.
    Pressed { since: Instant, pending: bool },
    /// A long press already fired; the release is swallowed.
    Held,
    /// One short click done, waiting for a possible second press.
    Released { at: Instant },
}

/// Debounce window opened by an accepted edge.
///
/// Edges inside the window are not fed to the state machine, but the level
/// they leave the line at is kept. When the window closes on a level other
/// than the accepted one, the pulse was a glitch: `undo` restores the state
/// from before the edge. An edge that already produced a click cannot be
/// undone, so the line level is applied as a fresh edge instead.
#[derive(Debug, Clone, Copy)]
struct Lockout {
    opened: Instant,
    pressed: bool,
    undo: Option<State>,
}

/// Turns a stream of press/release edges into [`ClickType`]s.
///
/// - press then release within the long-press threshold, followed by
///   silence for the double-click window: [`ClickType::Single`]
/// - two such clicks within the window: [`ClickType::Double`], emitted on
///   the second release
/// - holding past the threshold: [`ClickType::Long`], emitted as soon as
///   [`poll`](Self::poll) observes it (or on release, whichever is first)
/// - a pulse shorter than the debounce window: nothing
#[derive(Debug, Clone)]
pub struct ClickDetector {
    timing: ClickTiming,
    state: State,
    lockout: Option<Lockout>,
    /// Logical level after the most recent edge, accepted or not.
    observed: bool,
}

impl ClickDetector {
    #[must_use]
    pub fn new(timing: ClickTiming) -> Self {
        Self {
            timing,
            state: State::Idle,
            lockout: None,
            observed: false,
        }
    }

    /// Feed one edge. `pressed` is the logical button state after the edge.
    pub fn on_edge(&mut self, pressed: bool, at: Instant) -> Option<ClickType> {
        self.settle(at);
        self.observed = pressed;
        if self.lockout.is_some() {
            return None;
        }

        let before = self.state;
        let (next, click) = match (before, pressed) {
            (State::Idle, true) => (
                State::Pressed {
                    since: at,
                    pending: false,
                },
                None,
            ),
            (State::Released { .. }, true) => (
                State::Pressed {
                    since: at,
                    pending: true,
                },
                None,
            ),
            (State::Pressed { since, pending }, false) => {
                if at.saturating_duration_since(since) >= self.timing.long_press() {
                    (State::Idle, Some(ClickType::Long))
                } else if pending {
                    (State::Idle, Some(ClickType::Double))
                } else {
                    (State::Released { at }, None)
                }
            }
            (State::Held, false) => (State::Idle, None),
            // repeated level, nothing changed
            _ => return None,
        };

        self.state = next;
        self.lockout = Some(Lockout {
            opened: at,
            pressed,
            undo: click.is_none().then_some(before),
        });
        click
    }

    /// Resolve time-based outcomes: a lone click whose double-click window
    /// elapsed, or a press held past the long-press threshold.
    pub fn poll(&mut self, now: Instant) -> Option<ClickType> {
        self.settle(now);
        if self.lockout.is_some_and(|lockout| lockout.pressed != self.observed) {
            return None;
        }
        match self.state {
            State::Released { at }
                if now.saturating_duration_since(at) >= self.timing.double_click() =>
            {
                self.state = State::Idle;
                Some(ClickType::Single)
            }
            State::Pressed { since, .. }
                if now.saturating_duration_since(since) >= self.timing.long_press() =>
            {
                self.state = State::Held;
                Some(ClickType::Long)
            }
            _ => None,
        }
    }

    /// Next instant at which [`poll`](Self::poll) may produce a click or
    /// close the debounce window.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let state = match self.state {
            State::Released { at } => at.checked_add(self.timing.double_click()),
            State::Pressed { since, .. } => since.checked_add(self.timing.long_press()),
            State::Idle | State::Held => None,
        };
        let lockout = self
            .lockout
            .filter(|lockout| lockout.pressed != self.observed)
            .and_then(|lockout| lockout.opened.checked_add(self.timing.debounce()));
        match (state, lockout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Close the debounce window once it elapsed and reconcile the state
    /// with the level the line settled on.
    fn settle(&mut self, now: Instant) {
        let Some(lockout) = self.lockout else {
            return;
        };
        if now.saturating_duration_since(lockout.opened) < self.timing.debounce() {
            return;
        }
        self.lockout = None;
        if lockout.pressed == self.observed {
            return;
        }
        match lockout.undo {
            Some(before) => self.state = before,
            None if self.observed => {
                self.state = State::Pressed {
                    since: now,
                    pending: false,
                };
            }
            None => {}
        }
    }
}
