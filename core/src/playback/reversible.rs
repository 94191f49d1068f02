//! Reversible playback: frame-stepped execution with a rewind history

use std::time::Duration;

use super::{
    FrameClock, Playback, PlaybackCaps, PlaybackContext, PlaybackError, RewindRing, Snapshot,
    check_speed, frames_to_ms, ms_to_frames,
};
use crate::emulator::AvFrame;

/// Runs the core frame by frame and captures a snapshot every
/// `capture_interval` completed frames into a bounded [`RewindRing`].
///
/// Seeking restores the nearest snapshot at or before the target and replays
/// forward to the exact frame without delivering audio or video. Running new
/// frames from an earlier position discards the old future.
pub struct ReversiblePlayback {
    clock: FrameClock,
    ring: RewindRing,
    capture_interval: u64,
    serialize_size: usize,
    speed: f64,
    /// Frames completed at the current position
    frame: u64,
    /// Frames completed at the end of the current timeline
    total: u64,
    av: AvFrame,
    /// Copy of the running state while a load is in flight
    backup: Vec<u8>,
}

impl ReversiblePlayback {
    pub fn new(clock: FrameClock, capacity: usize, capture_interval: u32, serialize_size: usize) -> Self {
        let ring = RewindRing::new(capacity);
        tracing::debug!(
            fps = clock.frame_rate(),
            capacity = ring.capacity(),
            capture_interval,
            serialize_size,
            "Created reversible playback"
        );
        Self {
            clock,
            ring,
            capture_interval: capture_interval.max(1) as u64,
            serialize_size,
            speed: 1.0,
            frame: 0,
            total: 0,
            av: AvFrame::default(),
            backup: Vec::new(),
        }
    }

    pub fn ring(&self) -> &RewindRing {
        &self.ring
    }

    /// Frames completed at the current position
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    fn run_frame(&mut self, ctx: &mut PlaybackContext<'_>, deliver: bool) {
        self.av.clear();
        ctx.core.run_frame(&mut self.av);
        if deliver {
            ctx.streams.deliver(&self.av);
        }
        self.frame += 1;
    }

    fn capture(&mut self, ctx: &mut PlaybackContext<'_>) {
        let mut buffer = self.ring.take_buffer();
        if ctx.core.serialize(&mut buffer) && !buffer.is_empty() && buffer.len() == self.serialize_size {
            self.ring.push(Snapshot::new(self.frame, buffer));
        } else {
            tracing::warn!(
                frame = self.frame,
                size = buffer.len(),
                expected = self.serialize_size,
                "Rewind capture failed"
            );
        }
    }

    fn serialize_checked(&self, ctx: &mut PlaybackContext<'_>, out: &mut Vec<u8>) -> Result<(), PlaybackError> {
        out.clear();
        if !ctx.core.serialize(out) {
            return Err(PlaybackError::SaveFailed("core failed to serialize".to_string()));
        }
        if out.is_empty() {
            return Err(PlaybackError::SaveFailed("core produced an empty state".to_string()));
        }
        if out.len() != self.serialize_size {
            return Err(PlaybackError::SaveFailed(format!(
                "state is {} bytes, core reports {}",
                out.len(),
                self.serialize_size
            )));
        }
        Ok(())
    }
}

impl Playback for ReversiblePlayback {
    fn caps(&self) -> PlaybackCaps {
        PlaybackCaps::PAUSE | PlaybackCaps::SEEK | PlaybackCaps::REWIND | PlaybackCaps::SAVESTATES
    }

    fn can_seek(&self) -> bool {
        !self.ring.is_empty()
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
        // Anchor the history at the state before the first frame runs, so
        // the start of the timeline stays reachable
        if due > 0 && self.ring.is_empty() {
            self.capture(ctx);
        }
        for _ in 0..due {
            if self.frame < self.total {
                tracing::debug!(from = self.frame, to = self.total, "Discarding rewound future");
                self.ring.truncate_from(self.frame + 1);
                self.total = self.frame;
            }

            self.run_frame(ctx, true);
            self.total = self.frame;

            if self.frame % self.capture_interval == 0 {
                self.capture(ctx);
            }
        }
        due
    }

    fn time_ms(&self) -> u64 {
        frames_to_ms(self.frame, self.clock.frame_rate())
    }

    fn total_time_ms(&self) -> u64 {
        frames_to_ms(self.total, self.clock.frame_rate())
    }

    fn cache_time_ms(&self) -> u64 {
        match self.ring.oldest() {
            Some(oldest) => frames_to_ms(self.total.saturating_sub(oldest.frame), self.clock.frame_rate()),
            None => 0,
        }
    }

    fn seek_time(&mut self, ctx: &mut PlaybackContext<'_>, time_ms: u64) {
        let requested = ms_to_frames(time_ms, self.clock.frame_rate()).min(self.total);

        let restored = {
            let Some(snapshot) = self.ring.at_or_before(requested).or_else(|| self.ring.oldest()) else {
                return;
            };
            if !snapshot.is_intact() {
                tracing::error!(frame = snapshot.frame, "Rewind snapshot failed its checksum");
                return;
            }
            ctx.core.deserialize(&snapshot.data).then_some(snapshot.frame)
        };
        let Some(snapshot_frame) = restored else {
            tracing::warn!(frame = requested, "Core rejected rewind snapshot");
            return;
        };

        let target = requested.max(snapshot_frame);
        self.frame = snapshot_frame;
        while self.frame < target {
            self.run_frame(ctx, false);
        }
        self.clock.reset();

        tracing::debug!(target, from_snapshot = snapshot_frame, "Seeked");
    }

    fn save_state(&mut self, ctx: &mut PlaybackContext<'_>) -> Result<Option<Vec<u8>>, PlaybackError> {
        let mut data = Vec::with_capacity(self.serialize_size);
        self.serialize_checked(ctx, &mut data)?;
        Ok(Some(data))
    }

    fn load_state(&mut self, ctx: &mut PlaybackContext<'_>, data: &[u8]) -> Result<(), PlaybackError> {
        if data.len() != self.serialize_size {
            return Err(PlaybackError::LoadFailed(format!(
                "state is {} bytes, core expects {}",
                data.len(),
                self.serialize_size
            )));
        }

        // Keep the running state so a core that fails half way can be put back
        let mut backup = std::mem::take(&mut self.backup);
        let have_backup = self.serialize_checked(ctx, &mut backup).is_ok();

        let loaded = ctx.core.deserialize(data);
        if !loaded && have_backup && !ctx.core.deserialize(&backup) {
            tracing::error!("Failed to restore running state after a rejected load");
        }
        self.backup = backup;
        if !loaded {
            return Err(PlaybackError::LoadFailed("core rejected the state".to_string()));
        }

        self.ring.clear();
        self.total = self.frame;
        self.ring.push(Snapshot::new(self.frame, data.to_vec()));
        self.clock.reset();
        Ok(())
    }

    fn hardware_reset(&mut self, ctx: &mut PlaybackContext<'_>) {
        ctx.core.hardware_reset();
        self.ring.clear();
        self.frame = 0;
        self.total = 0;
        self.clock.reset();
    }
}
