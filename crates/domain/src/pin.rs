//! Digital pin levels and input bias.

use serde::{Deserialize, Serialize};

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// The opposite level.
    #[must_use]
    pub fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Internal bias resistor applied to an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    /// Pulled up; a button to ground reads [`Level::Low`] while pressed.
    #[default]
    Up,
    /// Pulled down; a button to supply reads [`Level::High`] while pressed.
    Down,
    /// Floating; treated like [`Pull::Down`] for press detection.
    None,
}

impl Pull {
    /// Level the line sits at while the button is held.
    #[must_use]
    pub fn pressed_level(self) -> Level {
        match self {
            Self::Up => Level::Low,
            Self::Down | Self::None => Level::High,
        }
    }
}
