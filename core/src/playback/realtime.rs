//! Realtime playback: wall-clock execution without history

use std::time::Duration;

use super::{
    FrameClock, Playback, PlaybackCaps, PlaybackContext, PlaybackError, check_speed, frames_to_ms,
};
use crate::emulator::AvFrame;

/// Runs the core at wall-clock speed with no rewind history.
///
/// Seeking is not possible and savestates are declined.
pub struct RealtimePlayback {
    clock: FrameClock,
    speed: f64,
    frames_played: u64,
    frame: AvFrame,
}

impl RealtimePlayback {
    pub fn new(clock: FrameClock) -> Self {
        tracing::debug!(fps = clock.frame_rate(), "Created realtime playback");
        Self {
            clock,
            speed: 1.0,
            frames_played: 0,
            frame: AvFrame::default(),
        }
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }
}

impl Playback for RealtimePlayback {
    fn caps(&self) -> PlaybackCaps {
        PlaybackCaps::PAUSE
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn set_speed(&mut self, ctx: &mut PlaybackContext<'_>, speed: f64) -> Result<(), PlaybackError> {
        check_speed(speed)?;
        self.speed = speed;
        ctx.core.set_speed(speed);
        ctx.streams.set_speed(speed);
        Ok(())
    }

    fn advance(&mut self, ctx: &mut PlaybackContext<'_>, elapsed: Duration) -> u32 {
        let due = self.clock.tick(elapsed, self.speed);
        for _ in 0..due {
            self.frame.clear();
            ctx.core.run_frame(&mut self.frame);
            ctx.streams.deliver(&self.frame);
        }
        self.frames_played += due as u64;
        due
    }

    fn time_ms(&self) -> u64 {
        frames_to_ms(self.frames_played, self.clock.frame_rate())
    }

    fn total_time_ms(&self) -> u64 {
        self.time_ms()
    }

    fn save_state(&mut self, _ctx: &mut PlaybackContext<'_>) -> Result<Option<Vec<u8>>, PlaybackError> {
        Ok(None)
    }

    fn load_state(&mut self, _ctx: &mut PlaybackContext<'_>, _data: &[u8]) -> Result<(), PlaybackError> {
        Err(PlaybackError::Declined)
    }
}
