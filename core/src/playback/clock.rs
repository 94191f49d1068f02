//! Fixed timestep frame clock

use std::time::Duration;

/// Frame rate used when a core reports a nonsensical one
const FALLBACK_FRAME_RATE: f64 = 60.0;

/// Converts wall time into whole emulated frames.
///
/// Wall time is clamped to `max_delta` per tick (so a stall never triggers a
/// catch-up burst), scaled by the playback speed and accumulated; every full
/// frame duration in the accumulator is one frame to run.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_rate: f64,
    frame_duration: Duration,
    max_delta: Duration,
    accumulator: Duration,
}

impl FrameClock {
    pub fn new(frame_rate: f64, max_delta: Duration) -> Self {
        let frame_rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            frame_rate
        } else {
            tracing::warn!(frame_rate, "Invalid core frame rate, assuming {}", FALLBACK_FRAME_RATE);
            FALLBACK_FRAME_RATE
        };
        Self {
            frame_rate,
            frame_duration: Duration::from_secs_f64(1.0 / frame_rate),
            max_delta,
            accumulator: Duration::ZERO,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Credit `elapsed` wall time at `speed` and return the frames now due
    pub fn tick(&mut self, elapsed: Duration, speed: f64) -> u32 {
        let delta = elapsed.min(self.max_delta);
        self.accumulator += delta.mul_f64(speed.max(0.0));

        let mut frames = 0u32;
        while self.accumulator >= self.frame_duration {
            self.accumulator -= self.frame_duration;
            frames += 1;
        }
        frames
    }

    /// Drop any partially accumulated frame
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
