//! Typed session events
//!
//! Observers subscribe to a broadcast channel; events are queued, so an
//! observer reacting to one never re-enters the controller from inside its
//! lock.

use retroplay_shared::{CoreId, ResourceRef};
use tokio::sync::broadcast;

/// Events buffered per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 64;

/// Lifecycle and speed transitions of a playback session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session finished opening and is playing
    PlaybackStarted {
        core: CoreId,
        resource: Option<ResourceRef>,
        rewind: bool,
    },
    /// Speed crossed from nonzero to zero
    Paused,
    /// Speed became exactly 1.0 again
    Resumed,
    /// Speed changed to something other than 0.0 or 1.0
    SpeedChanged { speed: f64 },
    /// The session closed
    Ended,
}

pub(crate) fn channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Event announced by a speed change from `old` to `new`, if any
pub(crate) fn speed_transition(old: f64, new: f64) -> Option<SessionEvent> {
    if old == new {
        None
    } else if new == 0.0 {
        Some(SessionEvent::Paused)
    } else if new == 1.0 {
        Some(SessionEvent::Resumed)
    } else {
        Some(SessionEvent::SpeedChanged { speed: new })
    }
}
