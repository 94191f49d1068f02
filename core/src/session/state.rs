//! Session lifecycle states

use std::fmt;

/// State of the session controller.
///
/// `Closed → Opening → Playing ⇄ Paused ⇄ SpeedAltered → Closing → Closed`;
/// a failed open falls back to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Opening,
    /// Running at exactly 1.0
    Playing,
    /// Running at 0.0
    Paused,
    /// Running at any other speed
    SpeedAltered,
    Closing,
}

impl SessionState {
    /// State a live session is in at `speed`
    pub fn for_speed(speed: f64) -> Self {
        if speed == 0.0 {
            Self::Paused
        } else if speed == 1.0 {
            Self::Playing
        } else {
            Self::SpeedAltered
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::SpeedAltered => "speed-altered",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}
