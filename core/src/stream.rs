//! Stream synchronizer
//!
//! Paces audio/video delivery to the playback speed:
//! - Interleaved stereo samples go into a bounded ring buffer consumed by the
//!   audio backend; pushes beyond capacity are dropped and counted
//! - Audio is accepted only at exactly 1.0 speed, so fast-forward and slow
//!   motion never produce pitch artifacts, and never while the user muted it
//! - The most recent video frame is kept for the render backend
//! - Frames replayed while seeking are never delivered (the playback engine
//!   simply does not hand them over)

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Observer, Producer, Split},
};

use crate::config::StreamConfig;
use crate::emulator::{AvFrame, VideoFrame};

/// Number of interleaved audio channels
pub const AUDIO_CHANNELS: usize = 2;

/// Audio/video delivery for one session
pub struct StreamManager {
    /// Producer side of the audio ring (playback thread writes here)
    producer: HeapProd<f32>,
    /// Consumer side, until the audio backend claims it
    consumer: Option<HeapCons<f32>>,
    normal_speed: bool,
    muted: bool,
    dropped_samples: u64,
    last_video: Option<VideoFrame>,
    frames_delivered: u64,
}

impl StreamManager {
    pub fn new(config: &StreamConfig) -> Self {
        let frames = config.sample_rate as usize * config.audio_buffer_ms as usize / 1000;
        let capacity = (frames * AUDIO_CHANNELS).max(AUDIO_CHANNELS);
        let ring = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = ring.split();

        tracing::debug!(capacity, "Created audio ring buffer");

        Self {
            producer,
            consumer: Some(consumer),
            normal_speed: true,
            muted: false,
            dropped_samples: 0,
            last_video: None,
            frames_delivered: 0,
        }
    }

    /// Hand the consumer side of the audio ring to the audio backend.
    ///
    /// Returns `None` once it has been taken.
    pub fn take_audio_consumer(&mut self) -> Option<HeapCons<f32>> {
        self.consumer.take()
    }

    /// Apply a playback speed: audio plays only at exactly normal speed
    pub fn set_speed(&mut self, speed: f64) {
        let normal = speed == 1.0;
        if normal != self.normal_speed {
            tracing::debug!(speed, enabled = normal && !self.muted, "Audio stream toggled");
        }
        self.normal_speed = normal;
    }

    /// User mute; independent of speed and kept across speed changes
    pub fn set_mute(&mut self, muted: bool) {
        if muted != self.muted {
            tracing::debug!(muted, "Audio mute toggled");
        }
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether delivered audio reaches the backend
    pub fn audio_enabled(&self) -> bool {
        self.normal_speed && !self.muted
    }

    /// Deliver one completed frame to the backends
    pub fn deliver(&mut self, frame: &AvFrame) {
        if self.audio_enabled() && !frame.audio.is_empty() {
            let pushed = self.producer.push_slice(&frame.audio);
            if pushed < frame.audio.len() {
                let dropped = frame.audio.len() - pushed;
                self.dropped_samples += dropped as u64;
                tracing::trace!(dropped, "Audio buffer overflow");
            }
        }
        if let Some(video) = &frame.video {
            self.last_video = Some(video.clone());
        }
        self.frames_delivered += 1;
    }

    /// Most recent video frame, if any frame produced video
    pub fn last_video(&self) -> Option<&VideoFrame> {
        self.last_video.as_ref()
    }

    /// Samples waiting for the audio backend
    pub fn buffered_samples(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn audio_capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    /// Samples dropped because the audio backend fell behind
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }
}
