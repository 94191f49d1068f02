//! RetroPlay Core - emulation playback session controller
//!
//! Owns the lifecycle of a running emulated program: drives its
//! time-reversible playback clock, persists and restores savestates, and
//! routes physical input devices onto the program's logical controller ports.
//!
//! # Architecture
//!
//! - [`SessionController`] - top-level state machine (open/close/pause/seek/speed)
//! - [`Playback`] - per-frame execution clock, realtime or reversible
//! - [`RewindRing`] - bounded snapshot history for reversible playback
//! - [`SavestateStore`] - immutable, enumerable savestate records
//! - [`PortMapper`] - device → controller port assignment
//! - [`StreamManager`] - audio/video delivery paced to the playback speed
//! - [`EmulationCore`] - the opaque core capability the controller drives

pub mod config;
pub mod emulator;
pub mod playback;
pub mod ports;
pub mod savestate;
pub mod session;
pub mod stream;
#[cfg(test)]
pub mod test_utils;

pub use config::{
    AchievementsConfig, ConfigError, PlayerConfig, RewindConfig, SavestateConfig, StreamConfig,
    TimingConfig,
};
pub use emulator::{
    AvFrame, CoreInfo, CoreProvider, EmulationCore, InputRouter, PortTopology, VideoFrame,
};
pub use playback::{
    FrameClock, Playback, PlaybackCaps, PlaybackContext, PlaybackError, RealtimePlayback,
    ReversiblePlayback, RewindRing, Snapshot,
};
pub use ports::{
    DeviceCapabilities, DeviceProvider, InputDevice, NoDevices, PortChange, PortChanges, PortMapper,
};
pub use savestate::{
    FileSavestateStore, MemorySavestateStore, SavestateDraft, SavestateRecord, SavestateStore,
    StoreError,
};
pub use session::{
    AchievementCommand, AchievementDispatcher, AchievementService, Confirmation, MetricsSink,
    NullMetrics, OpenOptions, PlayTimes, SavestateChoice, SessionController, SessionDeps,
    SessionError, SessionEvent, SessionState, Selector,
};
pub use stream::StreamManager;

// Re-export shared identifiers and metadata
pub use retroplay_shared::{
    CoreId, DeviceId, PortId, ResourceRef, SavestateKey, SavestateKind, SavestateMeta,
};
