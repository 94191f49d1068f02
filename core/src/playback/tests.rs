//! Playback engine tests

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::StreamConfig;
use crate::test_utils::{COUNTER_STATE_SIZE, CoreBehavior, CoreTracker, CounterCore};

const FPS: f64 = 50.0;
const FRAME: Duration = Duration::from_millis(20);

struct Rig {
    core: CounterCore,
    streams: StreamManager,
}

impl Rig {
    fn new(rewind: bool) -> Self {
        let behavior = CoreBehavior {
            rewind,
            frame_rate: FPS,
            ..CoreBehavior::default()
        };
        Self {
            core: CounterCore::new("core.test", behavior, Arc::new(CoreTracker::default())),
            streams: StreamManager::new(&StreamConfig::default()),
        }
    }

    fn ctx(&mut self) -> PlaybackContext<'_> {
        PlaybackContext::new(&mut self.core, &mut self.streams)
    }

    fn state(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        assert!(self.core.serialize(&mut out));
        out
    }
}

fn clock() -> FrameClock {
    FrameClock::new(FPS, Duration::from_secs(10))
}

fn reversible(capacity: usize, interval: u32) -> ReversiblePlayback {
    ReversiblePlayback::new(clock(), capacity, interval, COUNTER_STATE_SIZE)
}

fn run(engine: &mut dyn Playback, rig: &mut Rig, frames: u32) {
    for _ in 0..frames {
        assert_eq!(engine.advance(&mut rig.ctx(), FRAME), 1);
    }
}

// ============================================================================
// Realtime
// ============================================================================

#[test]
fn realtime_cannot_seek() {
    let mut rig = Rig::new(false);
    let mut engine = RealtimePlayback::new(clock());
    run(&mut engine, &mut rig, 10);

    assert!(!engine.can_seek());
    assert!(!engine.caps().contains(PlaybackCaps::SEEK));

    let before = rig.state();
    engine.seek_time(&mut rig.ctx(), 0);
    engine.seek_percentage(&mut rig.ctx(), 0.0);
    assert_eq!(rig.state(), before);
    assert_eq!(engine.time_ms(), 200);
}

#[test]
fn realtime_declines_savestates() {
    let mut rig = Rig::new(false);
    let mut engine = RealtimePlayback::new(clock());

    assert!(engine.save_state(&mut rig.ctx()).unwrap().is_none());
    assert!(matches!(
        engine.load_state(&mut rig.ctx(), &[0; COUNTER_STATE_SIZE]),
        Err(PlaybackError::Declined)
    ));
}

#[test]
fn realtime_speed_scales_execution() {
    let mut rig = Rig::new(false);
    let mut engine = RealtimePlayback::new(clock());

    engine.set_speed(&mut rig.ctx(), 2.0).unwrap();
    assert_eq!(engine.advance(&mut rig.ctx(), FRAME * 2), 4);

    engine.set_speed(&mut rig.ctx(), 0.0).unwrap();
    assert_eq!(engine.advance(&mut rig.ctx(), FRAME * 5), 0);
    assert_eq!(rig.core.counter(), 4);
}

// ============================================================================
// Reversible: history and seeking
// ============================================================================

#[test]
fn can_seek_only_after_first_frame() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(10, 2);
    assert!(!engine.can_seek());

    // A tick that runs nothing captures nothing
    assert_eq!(engine.advance(&mut rig.ctx(), Duration::from_millis(5)), 0);
    assert!(!engine.can_seek());

    run(&mut engine, &mut rig, 1);
    assert!(engine.can_seek());
    assert_eq!(engine.ring().oldest().map(|s| s.frame), Some(0));
}

#[test]
fn seek_reaches_start_of_timeline() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(100, 4);
    let at_start = rig.state();
    run(&mut engine, &mut rig, 5);

    engine.seek_time(&mut rig.ctx(), 0);
    assert_eq!(engine.frame(), 0);
    assert_eq!(engine.time_ms(), 0);
    assert_eq!(rig.state(), at_start);

    run(&mut engine, &mut rig, 3);
    engine.seek_percentage(&mut rig.ctx(), 0.0);
    assert_eq!(engine.time_ms(), 0);
    assert_eq!(rig.core.counter(), 0);
}

#[test]
fn ring_is_bounded() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(3, 1);

    run(&mut engine, &mut rig, 4);

    assert_eq!(engine.ring().len(), 3);
    assert_eq!(engine.ring().oldest().map(|s| s.frame), Some(2));
    assert!(engine.ring().at_or_before(1).is_none());

    run(&mut engine, &mut rig, 20);
    assert_eq!(engine.ring().len(), 3);
}

#[test]
fn seek_lands_on_exact_frame_without_delivery() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(100, 4);
    run(&mut engine, &mut rig, 20);
    let delivered = rig.streams.frames_delivered();

    engine.seek_time(&mut rig.ctx(), 210);

    assert_eq!(engine.frame(), 11);
    assert_eq!(rig.core.counter(), 11);
    assert_eq!(engine.time_ms(), 220);
    assert_eq!(engine.total_time_ms(), 400);
    assert_eq!(rig.streams.frames_delivered(), delivered);
}

#[test]
fn seek_reproduces_played_state() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(100, 3);
    run(&mut engine, &mut rig, 7);
    let at_seven = rig.state();
    run(&mut engine, &mut rig, 8);

    engine.seek_time(&mut rig.ctx(), 140);

    assert_eq!(rig.state(), at_seven);
}

#[test]
fn seek_clamps_to_timeline() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(5, 1);
    run(&mut engine, &mut rig, 10);

    engine.seek_percentage(&mut rig.ctx(), 150.0);
    assert_eq!(engine.frame(), 10);

    // Frames 0..=5 were evicted; the oldest retained snapshot is the floor
    engine.seek_percentage(&mut rig.ctx(), -20.0);
    assert_eq!(engine.frame(), 6);

    engine.seek_time(&mut rig.ctx(), u64::MAX);
    assert_eq!(engine.frame(), 10);
}

#[test]
fn playing_after_rewind_discards_future() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(100, 1);
    run(&mut engine, &mut rig, 10);

    engine.seek_time(&mut rig.ctx(), 100);
    assert_eq!(engine.frame(), 5);
    assert_eq!(engine.total_frames(), 10);

    run(&mut engine, &mut rig, 1);
    assert_eq!(engine.total_frames(), 6);
    assert_eq!(engine.ring().newest().map(|s| s.frame), Some(6));
}

#[test]
fn cache_covers_retained_history() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(5, 1);
    run(&mut engine, &mut rig, 10);

    // Snapshots 6..=10 retained: 4 frames of navigable history
    assert_eq!(engine.cache_time_ms(), 80);
    assert!((engine.cache_percentage() - 40.0).abs() < 1e-9);
}

// ============================================================================
// Reversible: speed and state
// ============================================================================

#[test]
fn rejects_negative_and_nan_speed() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(10, 1);

    assert!(matches!(
        engine.set_speed(&mut rig.ctx(), -1.0),
        Err(PlaybackError::InvalidSpeed(_))
    ));
    assert!(engine.set_speed(&mut rig.ctx(), f64::NAN).is_err());
    assert!(engine.set_speed(&mut rig.ctx(), f64::INFINITY).is_err());
    assert_eq!(engine.speed(), 1.0);

    engine.set_speed(&mut rig.ctx(), 0.5).unwrap();
    assert_eq!(engine.speed(), 0.5);
    assert!(!rig.streams.audio_enabled());
}

#[test]
fn save_load_round_trip_is_bit_identical() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(10, 1);
    run(&mut engine, &mut rig, 10);

    let saved = engine.save_state(&mut rig.ctx()).unwrap().unwrap();
    assert_eq!(saved.len(), COUNTER_STATE_SIZE);
    run(&mut engine, &mut rig, 5);

    engine.load_state(&mut rig.ctx(), &saved).unwrap();

    assert_eq!(rig.state(), saved);
    assert_eq!(rig.core.counter(), 10);
    assert!(engine.can_seek());
}

#[test]
fn failed_load_leaves_state_untouched() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(10, 1);
    run(&mut engine, &mut rig, 3);
    let before = rig.state();

    let result = engine.load_state(&mut rig.ctx(), &[1, 2, 3]);
    assert!(matches!(result, Err(PlaybackError::LoadFailed(_))));
    assert_eq!(rig.state(), before);
    assert_eq!(engine.ring().len(), 4);
}

#[test]
fn load_rejected_by_core_leaves_state_untouched() {
    let behavior = CoreBehavior {
        rewind: true,
        reject_loads: true,
        frame_rate: FPS,
        ..CoreBehavior::default()
    };
    let mut rig = Rig::new(true);
    rig.core = CounterCore::new("core.test", behavior, Arc::new(CoreTracker::default()));
    let mut engine = reversible(10, 1);
    run(&mut engine, &mut rig, 3);
    let before = rig.state();

    let result = engine.load_state(&mut rig.ctx(), &[0; COUNTER_STATE_SIZE]);
    assert!(matches!(result, Err(PlaybackError::LoadFailed(_))));
    assert_eq!(rig.state(), before);
}

#[test]
fn hardware_reset_forgets_history() {
    let mut rig = Rig::new(true);
    let mut engine = reversible(10, 1);
    run(&mut engine, &mut rig, 5);

    engine.hardware_reset(&mut rig.ctx());

    assert!(!engine.can_seek());
    assert_eq!(engine.time_ms(), 0);
    assert_eq!(rig.core.counter(), 0);
}
