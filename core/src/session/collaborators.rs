//! External collaborators of the session controller
//!
//! Everything the controller needs from the outside world is injected at
//! construction through these traits; there is no ambient lookup.

use retroplay_shared::{CoreId, ResourceRef, SavestateKey, SavestateMeta};

use crate::emulator::CoreInfo;

/// Outcome of asking the user which savestate to start from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavestateChoice {
    /// Start without loading a savestate
    NewGame,
    /// Load the given savestate after opening
    Load(SavestateKey),
    /// The user backed out; the open is abandoned
    Cancel,
}

/// Presentation surface that lets the user pick a core and a savestate.
///
/// Consumed synchronously while a session opens.
pub trait Selector: Send + Sync {
    /// Choose a core for `resource` (`None` = standalone).
    ///
    /// `installable` lists cores that could run the resource but are not
    /// installed. Returning `None` cancels the open.
    fn select_core(
        &self,
        resource: Option<&ResourceRef>,
        compatible: &[CoreInfo],
        installable: &[CoreInfo],
    ) -> Option<CoreId>;

    /// Choose a savestate to resume from; `saves` is most recent first
    fn select_savestate(&self, resource: &ResourceRef, core: &CoreId, saves: &[SavestateMeta]) -> SavestateChoice;
}

/// Accept/decline prompt, used for the destructive incompatible-savestate load
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Timing information published once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayTimes {
    pub time_ms: u64,
    pub total_time_ms: u64,
    pub cache_time_ms: u64,
    pub speed: f64,
}

/// External metrics/overlay sink
pub trait MetricsSink: Send + Sync {
    fn set_frame_rate(&self, fps: f64);

    fn set_play_times(&self, times: PlayTimes);
}

/// Metrics sink that discards everything
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn set_frame_rate(&self, _fps: f64) {}

    fn set_play_times(&self, _times: PlayTimes) {}
}

/// Network-backed achievement and rich-presence service.
///
/// Calls may block on the network; the controller only ever invokes it from
/// the achievement worker thread.
pub trait AchievementService: Send {
    /// Log in and start tracking `resource` running on `core`
    fn start(&mut self, core: &CoreId, resource: &ResourceRef);

    /// The emulated hardware was reset
    fn reset(&mut self);

    /// Stop tracking the current game
    fn stop(&mut self);
}
