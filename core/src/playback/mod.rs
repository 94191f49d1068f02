//! Playback engines
//!
//! A playback engine drives the per-frame execution clock of an emulation
//! core at a controllable speed. Two variants exist:
//! - [`RealtimePlayback`]: runs the core at wall-clock speed with no history
//! - [`ReversiblePlayback`]: additionally keeps a bounded [`RewindRing`] of
//!   snapshots so the session can seek backwards and forwards
//!
//! Callers branch on [`PlaybackCaps`], never on the concrete engine type.

mod clock;
mod realtime;
mod reversible;
mod ring;

#[cfg(test)]
mod tests;

use std::time::Duration;

use bitflags::bitflags;

use crate::emulator::EmulationCore;
use crate::savestate::StoreError;
use crate::stream::StreamManager;

pub use clock::FrameClock;
pub use realtime::RealtimePlayback;
pub use reversible::ReversiblePlayback;
pub use ring::{RewindRing, Snapshot};

bitflags! {
    /// Capabilities a playback engine declares
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlaybackCaps: u8 {
        /// Speed 0.0 holds the core between frames
        const PAUSE = 1 << 0;
        /// Seeking within the played timeline
        const SEEK = 1 << 1;
        /// History of snapshots for backward navigation
        const REWIND = 1 << 2;
        /// Full-state savestates can be created and loaded
        const SAVESTATES = 1 << 3;
    }
}

/// Error raised by a playback engine
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// Serialization failed or produced an unusable buffer
    #[error("failed to save state: {0}")]
    SaveFailed(String),
    /// The core rejected a state blob; the running state is untouched
    #[error("failed to load state: {0}")]
    LoadFailed(String),
    #[error("invalid playback speed {0}")]
    InvalidSpeed(f64),
    /// The engine does not support the operation, or the user declined it
    #[error("operation declined")]
    Declined,
    #[error("no session is open")]
    NotOpen,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Borrowed collaborators an engine operates on for one call
pub struct PlaybackContext<'a> {
    pub core: &'a mut dyn EmulationCore,
    pub streams: &'a mut StreamManager,
}

impl<'a> PlaybackContext<'a> {
    pub fn new(core: &'a mut dyn EmulationCore, streams: &'a mut StreamManager) -> Self {
        Self { core, streams }
    }
}

/// Drives an emulation core frame by frame
pub trait Playback: Send {
    fn caps(&self) -> PlaybackCaps;

    /// Whether a seek would currently do anything
    fn can_seek(&self) -> bool {
        self.caps().contains(PlaybackCaps::SEEK)
    }

    fn can_pause(&self) -> bool {
        self.caps().contains(PlaybackCaps::PAUSE)
    }

    fn speed(&self) -> f64;

    /// Change the execution speed; negative and non-finite values are rejected
    fn set_speed(&mut self, ctx: &mut PlaybackContext<'_>, speed: f64) -> Result<(), PlaybackError>;

    /// Credit `elapsed` wall time and run the frames that became due.
    ///
    /// Returns the number of frames executed.
    fn advance(&mut self, ctx: &mut PlaybackContext<'_>, elapsed: Duration) -> u32;

    /// Current position in milliseconds
    fn time_ms(&self) -> u64;

    /// Length of the played timeline in milliseconds
    fn total_time_ms(&self) -> u64;

    /// Span of the timeline that can be navigated without replaying from scratch
    fn cache_time_ms(&self) -> u64 {
        0
    }

    fn cache_percentage(&self) -> f64 {
        let total = self.total_time_ms();
        if total == 0 {
            return 0.0;
        }
        (self.cache_time_ms() as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Seek to an absolute time, clamped to the played timeline
    fn seek_time(&mut self, _ctx: &mut PlaybackContext<'_>, _time_ms: u64) {}

    /// Seek to a percentage of the played timeline, clamped to [0, 100]
    fn seek_percentage(&mut self, ctx: &mut PlaybackContext<'_>, percent: f64) {
        if !self.can_seek() || percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        let target = (self.total_time_ms() as f64 * percent / 100.0).round() as u64;
        self.seek_time(ctx, target);
    }

    /// Serialize the running state for a savestate.
    ///
    /// `Ok(None)` means the engine declines to produce one.
    fn save_state(&mut self, ctx: &mut PlaybackContext<'_>) -> Result<Option<Vec<u8>>, PlaybackError>;

    /// Replace the running state with `data`; on error nothing changes
    fn load_state(&mut self, ctx: &mut PlaybackContext<'_>, data: &[u8]) -> Result<(), PlaybackError>;

    /// Reset the emulated hardware and forget any history
    fn hardware_reset(&mut self, ctx: &mut PlaybackContext<'_>) {
        ctx.core.hardware_reset();
    }
}

/// Validate a requested playback speed
pub(crate) fn check_speed(speed: f64) -> Result<(), PlaybackError> {
    if speed.is_finite() && speed >= 0.0 {
        Ok(())
    } else {
        Err(PlaybackError::InvalidSpeed(speed))
    }
}

/// Convert a frame count into milliseconds at `frame_rate`
pub(crate) fn frames_to_ms(frames: u64, frame_rate: f64) -> u64 {
    if frame_rate <= 0.0 {
        return 0;
    }
    (frames as f64 * 1000.0 / frame_rate).round() as u64
}

/// Convert milliseconds into a frame count at `frame_rate`
pub(crate) fn ms_to_frames(ms: u64, frame_rate: f64) -> u64 {
    (ms as f64 * frame_rate / 1000.0).round() as u64
}
