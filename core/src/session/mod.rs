//! Playback session controller
//!
//! The single authoritative state machine for one playback session. It owns
//! the running emulation core, its playback engine, the stream synchronizer
//! and the device port binding, and coordinates savestate access.
//!
//! Locking:
//! - `lifecycle` totally orders open/close (and other multi-step operations
//!   that consult collaborators). An open is never interleaved with a close.
//! - `inner` serializes every mutation of session and port state. The
//!   per-frame tick, device notifications and control calls all take it.
//!
//! Lock order is always `lifecycle` then `inner`. Selection and confirmation
//! prompts run while only `lifecycle` is held, before the prior session is
//! torn down, so declining leaves a running session untouched. Periodic
//! autosaves are captured under `inner` and written by the autosave worker.

mod achievements;
mod autosave;
mod collaborators;
mod error;
mod events;
mod state;


use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use retroplay_shared::{CoreId, DeviceId, PortId, ResourceRef, SavestateKey, SavestateKind, SavestateMeta};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::emulator::{CoreProvider, EmulationCore};
use crate::playback::{
    FrameClock, Playback, PlaybackCaps, PlaybackContext, PlaybackError, RealtimePlayback,
    ReversiblePlayback,
};
use crate::ports::{DeviceProvider, PortMapper};
use crate::savestate::{SavestateDraft, SavestateStore, StoreError};
use crate::stream::StreamManager;

pub use achievements::{AchievementCommand, AchievementDispatcher};
use autosave::AutosaveWriter;
pub use collaborators::{
    AchievementService, Confirmation, MetricsSink, NullMetrics, PlayTimes, SavestateChoice, Selector,
};
pub use error::SessionError;
pub use events::{EVENT_CAPACITY, SessionEvent};
pub use state::SessionState;

/// Collaborators injected into a [`SessionController`]
pub struct SessionDeps {
    pub cores: Arc<dyn CoreProvider>,
    pub store: Arc<dyn SavestateStore>,
    pub devices: Arc<dyn DeviceProvider>,
    pub selector: Arc<dyn Selector>,
    pub confirmation: Arc<dyn Confirmation>,
    pub metrics: Arc<dyn MetricsSink>,
    /// Only used when achievements are enabled in the config
    pub achievements: Option<Box<dyn AchievementService>>,
}

/// Caller preferences for [`SessionController::open`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Use this core instead of asking the selector
    pub core: Option<CoreId>,
    /// Resume from this savestate instead of asking the selector
    pub savestate: Option<SavestateKey>,
}

/// Everything owned by a live session
struct ActiveSession {
    resource: Option<ResourceRef>,
    core_id: CoreId,
    core: Box<dyn EmulationCore>,
    playback: Box<dyn Playback>,
    streams: StreamManager,
    ports: PortMapper,
    autosave: bool,
    autosaves: AutosaveWriter,
    /// Play time since the last periodic autosave
    since_autosave: Duration,
    last_tick: Option<Instant>,
    frame_duration: Duration,
}

impl ActiveSession {
    fn with_playback<R>(&mut self, f: impl FnOnce(&mut dyn Playback, &mut PlaybackContext<'_>) -> R) -> R {
        let mut ctx = PlaybackContext::new(self.core.as_mut(), &mut self.streams);
        f(self.playback.as_mut(), &mut ctx)
    }

    fn play_times(&self) -> PlayTimes {
        PlayTimes {
            time_ms: self.playback.time_ms(),
            total_time_ms: self.playback.total_time_ms(),
            cache_time_ms: self.playback.cache_time_ms(),
            speed: self.playback.speed(),
        }
    }
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    session: Option<ActiveSession>,
    /// User mute, kept across sessions
    muted: bool,
}

/// Orchestrates the lifecycle of one playback session at a time
pub struct SessionController {
    config: PlayerConfig,
    cores: Arc<dyn CoreProvider>,
    store: Arc<dyn SavestateStore>,
    devices: Arc<dyn DeviceProvider>,
    selector: Arc<dyn Selector>,
    confirmation: Arc<dyn Confirmation>,
    metrics: Arc<dyn MetricsSink>,
    achievements: Option<AchievementDispatcher>,
    lifecycle: Mutex<()>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering poisoned session lock");
        poisoned.into_inner()
    })
}

impl SessionController {
    pub fn new(config: PlayerConfig, deps: SessionDeps) -> Self {
        let achievements = match deps.achievements {
            Some(service) if config.achievements.enabled => match AchievementDispatcher::spawn(service) {
                Ok(dispatcher) => Some(dispatcher),
                Err(e) => {
                    warn!(error = %e, "Failed to start achievement worker, achievements disabled");
                    None
                }
            },
            _ => None,
        };

        Self {
            config,
            cores: deps.cores,
            store: deps.store,
            devices: deps.devices,
            selector: deps.selector,
            confirmation: deps.confirmation,
            metrics: deps.metrics,
            achievements,
            lifecycle: Mutex::new(()),
            inner: Mutex::new(Inner::default()),
            events: events::channel(),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Receive session events (queued; never delivered under the session lock)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn achievement(&self, command: AchievementCommand) {
        if let Some(dispatcher) = &self.achievements {
            dispatcher.send(command);
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open `resource` (`None` = standalone), closing any running session first.
    ///
    /// On error the controller is `Closed` (or, for errors raised while
    /// selecting, unchanged) and every partially acquired resource is
    /// released.
    pub fn open(&self, resource: Option<ResourceRef>, options: OpenOptions) -> Result<(), SessionError> {
        let _lifecycle = lock(&self.lifecycle);

        let core_id = self.resolve_core(resource.as_ref(), options.core.as_ref())?;
        let savestate = match &resource {
            Some(resource) => self.resolve_savestate(resource, &core_id, options.savestate.as_ref())?,
            None => None,
        };
        if let Some(meta) = &savestate {
            self.confirm_compatibility(meta, &core_id)?;
        }

        let mut inner = lock(&self.inner);
        if inner.session.is_some() {
            info!("Closing running session before opening another");
            self.teardown(&mut inner);
        }
        inner.state = SessionState::Opening;

        let mut session = match self.start(resource, core_id, savestate) {
            Ok(session) => session,
            Err(e) => {
                inner.state = SessionState::Closed;
                error!(error = %e, "Failed to open session");
                return Err(e);
            }
        };

        let started = SessionEvent::PlaybackStarted {
            core: session.core_id.clone(),
            resource: session.resource.clone(),
            rewind: session.playback.caps().contains(PlaybackCaps::REWIND),
        };
        let achievement = session.resource.clone().map(|resource| AchievementCommand::Start {
            core: session.core_id.clone(),
            resource,
        });
        session.streams.set_mute(inner.muted);
        inner.state = SessionState::for_speed(session.playback.speed());
        inner.session = Some(session);
        drop(inner);

        self.emit(started);
        if let Some(command) = achievement {
            self.achievement(command);
        }
        Ok(())
    }

    /// Close the running session. Idempotent and never fails outwardly:
    /// a failed final autosave is logged.
    pub fn close(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let mut inner = lock(&self.inner);
        if inner.session.is_some() {
            self.teardown(&mut inner);
        }
    }

    fn resolve_core(&self, resource: Option<&ResourceRef>, preferred: Option<&CoreId>) -> Result<CoreId, SessionError> {
        let compatible = self.cores.compatible_cores(resource);

        if let Some(preferred) = preferred {
            if compatible.iter().any(|info| &info.id == preferred) {
                return Ok(preferred.clone());
            }
            warn!(core = %preferred, "Requested core cannot run this resource");
            return Err(SessionError::CoreUnavailable(preferred.clone()));
        }

        let installable = self.cores.installable_cores(resource);
        if compatible.is_empty() && installable.is_empty() {
            return Err(SessionError::NoCoreSelected);
        }
        if let ([only], []) = (compatible.as_slice(), installable.as_slice()) {
            debug!(core = %only.id, "Single compatible core, skipping selection");
            return Ok(only.id.clone());
        }

        match self.selector.select_core(resource, &compatible, &installable) {
            Some(core) => Ok(core),
            None => {
                info!("Core selection cancelled");
                Err(SessionError::SelectionCancelled)
            }
        }
    }

    fn resolve_savestate(
        &self,
        resource: &ResourceRef,
        core: &CoreId,
        requested: Option<&SavestateKey>,
    ) -> Result<Option<SavestateMeta>, SessionError> {
        if let Some(key) = requested {
            return self
                .store
                .meta(key)
                .map(Some)
                .map_err(|e| SessionError::OpenFailed(format!("savestate {}: {}", key, e)));
        }

        let saves = self.store.list_for(Some(resource), None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list savestates");
            Vec::new()
        });
        if saves.is_empty() {
            return Ok(None);
        }

        match self.selector.select_savestate(resource, core, &saves) {
            SavestateChoice::NewGame => Ok(None),
            SavestateChoice::Load(key) => match saves.iter().find(|meta| meta.key == key) {
                Some(meta) => Ok(Some(meta.clone())),
                None => self
                    .store
                    .meta(&key)
                    .map(Some)
                    .map_err(|e| SessionError::OpenFailed(format!("savestate {}: {}", key, e))),
            },
            SavestateChoice::Cancel => {
                info!("Savestate selection cancelled");
                Err(SessionError::SelectionCancelled)
            }
        }
    }

    fn incompatibility_prompt(&self, meta: &SavestateMeta, core: &CoreId) -> String {
        let name = |id: &CoreId| self.cores.core_name(id).unwrap_or_else(|| id.to_string());
        let label = if meta.label.is_empty() { meta.key.as_str() } else { meta.label.as_str() };
        format!(
            "The savestate \"{}\" was created by {} and will be loaded into {}. \
             Loading it may overwrite your progress. Continue?",
            label,
            name(&meta.core_id),
            name(core)
        )
    }

    fn confirm_compatibility(&self, meta: &SavestateMeta, core: &CoreId) -> Result<(), SessionError> {
        if meta.is_compatible_with(core) {
            return Ok(());
        }
        if !self.confirmation.confirm(&self.incompatibility_prompt(meta, core)) {
            info!(key = %meta.key, "Incompatible savestate declined");
            return Err(SessionError::IncompatibleSaveDeclined);
        }
        warn!(
            key = %meta.key,
            saved_by = %meta.core_id,
            core = %core,
            "Loading savestate created by a different core"
        );
        Ok(())
    }

    /// Acquire the core and build the session; releases the core on failure
    fn start(
        &self,
        resource: Option<ResourceRef>,
        core_id: CoreId,
        savestate: Option<SavestateMeta>,
    ) -> Result<ActiveSession, SessionError> {
        let Some(mut core) = self.cores.instantiate(&core_id) else {
            return Err(SessionError::CoreUnavailable(core_id));
        };

        if !core.initialize() {
            core.unload();
            return Err(SessionError::CoreInitFailed(core_id));
        }

        let opened = match &resource {
            Some(resource) => core.open_resource(resource),
            None => core.open_standalone(),
        };
        if !opened {
            core.unload();
            let what = resource
                .as_ref()
                .map_or_else(|| "standalone".to_string(), |r| r.to_string());
            return Err(SessionError::OpenFailed(format!("{} could not open {}", core_id, what)));
        }

        let clock = FrameClock::new(core.frame_rate(), self.config.timing.max_delta());
        let frame_rate = clock.frame_rate();
        let frame_duration = clock.frame_duration();
        let serialize_size = core.serialize_size();
        let reversible = self.config.rewind.enabled && core.supports_rewind() && serialize_size > 0;
        let playback: Box<dyn Playback> = if reversible {
            let capacity = self.config.rewind.ring_capacity(frame_rate, serialize_size);
            Box::new(ReversiblePlayback::new(
                clock,
                capacity,
                self.config.rewind.capture_interval_frames,
                serialize_size,
            ))
        } else {
            Box::new(RealtimePlayback::new(clock))
        };

        info!(
            resource = resource.as_ref().map_or("<standalone>", |r| r.as_str()),
            core = %core_id,
            mode = if reversible { "reversible" } else { "realtime" },
            fps = frame_rate,
            serialize_size,
            "Opened session"
        );

        let mut session = ActiveSession {
            resource,
            core_id,
            ports: PortMapper::new(core.input_topology()),
            core,
            playback,
            streams: StreamManager::new(&self.config.streams),
            autosave: self.config.savestates.autosave,
            autosaves: AutosaveWriter::spawn(self.store.clone()),
            since_autosave: Duration::ZERO,
            last_tick: None,
            frame_duration,
        };

        let live = self.devices.devices_with(session.ports.required());
        session.ports.process(&live, session.core.as_mut());
        self.metrics.set_frame_rate(frame_rate);

        if let Some(meta) = savestate {
            self.load_into(&mut session, &meta.key);
        }

        Ok(session)
    }

    /// Load a savestate chosen at open; failures are not fatal
    fn load_into(&self, session: &mut ActiveSession, key: &SavestateKey) {
        let record = match self.store.get(key) {
            Ok(record) => record,
            Err(e) => {
                warn!(%key, error = %e, "Failed to read savestate, starting fresh");
                return;
            }
        };
        match session.with_playback(|playback, ctx| playback.load_state(ctx, &record.data)) {
            Ok(()) => {
                info!(%key, "Loaded savestate");
                if record.meta.kind == SavestateKind::Auto && record.meta.is_compatible_with(&session.core_id) {
                    session.autosaves.adopt(key.clone());
                }
            }
            Err(e) => warn!(%key, error = %e, "Failed to load savestate, starting fresh"),
        }
    }

    /// Tear down the live session; always ends `Closed`
    fn teardown(&self, inner: &mut Inner) {
        let Some(mut session) = inner.session.take() else {
            inner.state = SessionState::Closed;
            return;
        };
        inner.state = SessionState::Closing;

        if session.autosave {
            match self.write_snapshot(&mut session, true) {
                Ok(Some(key)) => debug!(%key, "Final autosave written"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Final autosave failed"),
            }
        }

        session.ports.unbind(session.core.as_mut());
        session.core.close();
        session.core.unload();
        let played_ms = session.playback.total_time_ms();
        let core_id = session.core_id.clone();
        drop(session);

        inner.state = SessionState::Closed;
        info!(core = %core_id, played_ms, "Closed session");

        self.achievement(AchievementCommand::Stop);
        self.emit(SessionEvent::Ended);
    }

    // ========================================================================
    // Speed and seeking
    // ========================================================================

    /// Change the playback speed.
    ///
    /// Setting the current speed again does nothing; crossing into 0.0 pauses,
    /// reaching exactly 1.0 resumes, anything else alters speed (and mutes
    /// audio). Without a session this is a no-op.
    pub fn set_speed(&self, speed: f64) -> Result<(), PlaybackError> {
        let mut inner = lock(&self.inner);
        self.set_speed_locked(&mut inner, speed)
    }

    fn set_speed_locked(&self, inner: &mut Inner, speed: f64) -> Result<(), PlaybackError> {
        let Some(session) = inner.session.as_mut() else {
            return Ok(());
        };
        let old = session.playback.speed();
        if old == speed {
            return Ok(());
        }
        if speed == 0.0 && !session.playback.can_pause() {
            return Err(PlaybackError::Declined);
        }

        session
            .with_playback(|playback, ctx| playback.set_speed(ctx, speed))
            .inspect_err(|e| warn!(speed, error = %e, "Rejected speed change"))?;
        inner.state = SessionState::for_speed(speed);
        debug!(from = old, to = speed, state = %inner.state, "Speed changed");

        if let Some(event) = events::speed_transition(old, speed) {
            self.emit(event);
        }
        Ok(())
    }

    /// Flip between paused and normal speed
    pub fn toggle_pause(&self) -> Result<(), PlaybackError> {
        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_ref() else {
            return Ok(());
        };
        if !session.playback.can_pause() {
            return Ok(());
        }
        let target = if session.playback.speed() == 0.0 { 1.0 } else { 0.0 };
        self.set_speed_locked(&mut inner, target)
    }

    /// Seek to `time_ms`, clamped to the played timeline; no-op unless seekable
    pub fn seek_time(&self, time_ms: u64) {
        let mut inner = lock(&self.inner);
        if let Some(session) = inner.session.as_mut()
            && session.playback.can_seek()
        {
            session.with_playback(|playback, ctx| playback.seek_time(ctx, time_ms));
        }
    }

    /// Seek to `percent` of the played timeline, clamped to [0, 100]
    pub fn seek_percentage(&self, percent: f64) {
        let mut inner = lock(&self.inner);
        if let Some(session) = inner.session.as_mut()
            && session.playback.can_seek()
        {
            session.with_playback(|playback, ctx| playback.seek_percentage(ctx, percent));
        }
    }

    /// Seek by `delta_ms` from the current position; returns whether it seeked
    pub fn seek_relative(&self, delta_ms: i64) -> bool {
        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if !session.playback.can_seek() {
            return false;
        }
        let total = session.playback.total_time_ms();
        let target = session
            .playback
            .time_ms()
            .saturating_add_signed(delta_ms)
            .min(total);
        session.with_playback(|playback, ctx| playback.seek_time(ctx, target));
        true
    }

    // ========================================================================
    // Savestates
    // ========================================================================

    /// Save the running state.
    ///
    /// Returns `Ok(None)` when nothing was saved because the session is
    /// standalone, the engine declined, or no session is open.
    pub fn create_snapshot(&self, autosave: bool) -> Result<Option<SavestateKey>, PlaybackError> {
        let mut inner = lock(&self.inner);
        match inner.session.as_mut() {
            Some(session) => self.write_snapshot(session, autosave),
            None => Ok(None),
        }
    }

    fn write_snapshot(&self, session: &mut ActiveSession, autosave: bool) -> Result<Option<SavestateKey>, PlaybackError> {
        let Some(draft) = Self::snapshot_draft(session, autosave)? else {
            return Ok(None);
        };
        let kind = draft.kind;
        let key = if autosave {
            session.since_autosave = Duration::ZERO;
            session.autosaves.write(draft)?
        } else {
            self.store.put(draft)?
        };
        info!(%key, ?kind, "Created savestate");
        Ok(Some(key))
    }

    /// Capture the running state as a draft, without touching the store
    fn snapshot_draft(session: &mut ActiveSession, autosave: bool) -> Result<Option<SavestateDraft>, PlaybackError> {
        let Some(resource) = session.resource.clone() else {
            debug!("Standalone session, savestate declined");
            return Ok(None);
        };
        let Some(data) = session.with_playback(|playback, ctx| playback.save_state(ctx))? else {
            debug!("Playback engine declined to save");
            return Ok(None);
        };

        let kind = if autosave { SavestateKind::Auto } else { SavestateKind::Manual };
        let mut draft = SavestateDraft::new(session.core_id.clone(), Some(resource), kind, data);
        if !autosave {
            let label = draft.created.format("%Y-%m-%d %H:%M:%S").to_string();
            draft = draft.with_label(label);
        }
        if let Some(video) = session.streams.last_video() {
            draft = draft.with_thumbnail(video.data.clone());
        }
        Ok(Some(draft))
    }

    /// Replace the running state with a stored savestate.
    ///
    /// A savestate made by another core is only loaded after confirmation.
    /// On error the running state is untouched.
    pub fn load_savestate(&self, key: &SavestateKey) -> Result<(), PlaybackError> {
        let _lifecycle = lock(&self.lifecycle);

        let Some(core_id) = lock(&self.inner).session.as_ref().map(|s| s.core_id.clone()) else {
            return Err(PlaybackError::NotOpen);
        };
        let record = self.store.get(key)?;
        if !record.meta.is_compatible_with(&core_id) {
            if !self.confirmation.confirm(&self.incompatibility_prompt(&record.meta, &core_id)) {
                info!(%key, "Incompatible savestate declined");
                return Err(PlaybackError::Declined);
            }
            warn!(%key, saved_by = %record.meta.core_id, core = %core_id, "Loading savestate created by a different core");
        }

        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_mut() else {
            return Err(PlaybackError::NotOpen);
        };
        session
            .with_playback(|playback, ctx| playback.load_state(ctx, &record.data))
            .inspect_err(|e| warn!(%key, error = %e, "Failed to load savestate"))?;
        info!(%key, "Loaded savestate");
        Ok(())
    }

    /// Savestates for the running resource and core, most recent first
    pub fn list_savestates(&self) -> Result<Vec<SavestateMeta>, StoreError> {
        let (resource, core) = {
            let inner = lock(&self.inner);
            match inner.session.as_ref() {
                Some(ActiveSession {
                    resource: Some(resource),
                    core_id,
                    ..
                }) => (resource.clone(), core_id.clone()),
                _ => return Ok(Vec::new()),
            }
        };
        self.store.list_for(Some(&resource), Some(&core))
    }

    /// Autosave and return the key for handing the session state to another
    /// player. A failed save disables autosave for the rest of the session.
    pub fn player_state(&self) -> Option<SavestateKey> {
        let mut inner = lock(&self.inner);
        let session = inner.session.as_mut()?;
        if !session.autosave {
            return None;
        }
        match self.write_snapshot(session, true) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Failed to save player state, disabling autosave");
                session.autosave = false;
                None
            }
        }
    }

    /// Restore a state handed over by [`player_state`](Self::player_state)
    pub fn restore_player_state(&self, key: &SavestateKey) -> bool {
        self.load_savestate(key).is_ok()
    }

    // ========================================================================
    // Ticks and notifications
    // ========================================================================

    /// Per-frame tick, called once per render/logic tick by the scheduler
    pub fn advance(&self) -> u32 {
        let now = Instant::now();
        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_mut() else {
            return 0;
        };
        let elapsed = session
            .last_tick
            .map_or(session.frame_duration, |last| now.saturating_duration_since(last));
        session.last_tick = Some(now);
        self.tick(session, elapsed)
    }

    /// Per-frame tick with an explicit amount of elapsed wall time
    pub fn advance_by(&self, elapsed: Duration) -> u32 {
        let mut inner = lock(&self.inner);
        match inner.session.as_mut() {
            Some(session) => self.tick(session, elapsed),
            None => 0,
        }
    }

    fn tick(&self, session: &mut ActiveSession, elapsed: Duration) -> u32 {
        let frames = session.with_playback(|playback, ctx| playback.advance(ctx, elapsed));

        if session.playback.speed() > 0.0 {
            session.since_autosave += elapsed;
        }
        if let Some(interval) = self.config.savestates.autosave_interval()
            && session.autosave
            && session.since_autosave >= interval
        {
            session.since_autosave = Duration::ZERO;
            match Self::snapshot_draft(session, true) {
                Ok(Some(draft)) => {
                    session.autosaves.submit(draft);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Periodic autosave failed"),
            }
        }

        self.metrics.set_play_times(session.play_times());
        frames
    }

    /// Device-topology-changed notification: re-query devices and remap ports
    pub fn on_devices_changed(&self) {
        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        let live = self.devices.devices_with(session.ports.required());
        let changes = session.ports.process(&live, session.core.as_mut());
        debug!(devices = live.len(), changes = changes.len(), "Processed device change");
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Reset the emulated hardware, then resume at the prior speed (normal
    /// speed if it was paused)
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        let prior = session.playback.speed();
        session.with_playback(|playback, ctx| playback.hardware_reset(ctx));
        info!("Hardware reset");
        self.achievement(AchievementCommand::Reset);

        let resume = if prior > 0.0 { prior } else { 1.0 };
        if let Err(e) = self.set_speed_locked(&mut inner, resume) {
            warn!(error = %e, "Failed to resume after reset");
        }
    }

    /// Mute or unmute audio. The setting outlives the session and combines
    /// with the speed mute: audio plays only when unmuted at normal speed.
    pub fn set_mute(&self, muted: bool) {
        let mut inner = lock(&self.inner);
        inner.muted = muted;
        if let Some(session) = inner.session.as_mut() {
            session.streams.set_mute(muted);
        }
        debug!(muted, "Mute toggled");
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.inner).muted
    }

    pub fn enable_input(&self, enabled: bool) {
        let mut inner = lock(&self.inner);
        if let Some(session) = inner.session.as_mut() {
            session.core.enable_input(enabled);
            debug!(enabled, "Input toggled");
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> SessionState {
        lock(&self.inner).state
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner).session.is_some()
    }

    fn query<R>(&self, default: R, f: impl FnOnce(&ActiveSession) -> R) -> R {
        lock(&self.inner).session.as_ref().map_or(default, f)
    }

    pub fn speed(&self) -> f64 {
        self.query(0.0, |s| s.playback.speed())
    }

    pub fn can_seek(&self) -> bool {
        self.query(false, |s| s.playback.can_seek())
    }

    pub fn can_pause(&self) -> bool {
        self.query(false, |s| s.playback.can_pause())
    }

    pub fn playback_caps(&self) -> Option<PlaybackCaps> {
        self.query(None, |s| Some(s.playback.caps()))
    }

    pub fn time_ms(&self) -> u64 {
        self.query(0, |s| s.playback.time_ms())
    }

    pub fn total_time_ms(&self) -> u64 {
        self.query(0, |s| s.playback.total_time_ms())
    }

    pub fn cache_time_ms(&self) -> u64 {
        self.query(0, |s| s.playback.cache_time_ms())
    }

    pub fn cache_percentage(&self) -> f64 {
        self.query(0.0, |s| s.playback.cache_percentage())
    }

    pub fn core_id(&self) -> Option<CoreId> {
        self.query(None, |s| Some(s.core_id.clone()))
    }

    pub fn resource(&self) -> Option<ResourceRef> {
        self.query(None, |s| s.resource.clone())
    }

    pub fn is_standalone(&self) -> bool {
        self.query(false, |s| s.resource.is_none())
    }

    pub fn autosave_enabled(&self) -> bool {
        self.query(false, |s| s.autosave)
    }

    /// Current device → port assignment
    pub fn port_assignments(&self) -> Vec<(DeviceId, PortId)> {
        self.query(Vec::new(), |s| {
            s.ports
                .assignments()
                .map(|(device, port)| (device.clone(), port.clone()))
                .collect()
        })
    }

    /// Samples dropped by the audio stream so far
    pub fn dropped_audio_samples(&self) -> u64 {
        self.query(0, |s| s.streams.dropped_samples())
    }

    /// Claim the consumer side of the audio stream for the audio backend
    pub fn take_audio_consumer(&self) -> Option<ringbuf::HeapCons<f32>> {
        lock(&self.inner)
            .session
            .as_mut()
            .and_then(|s| s.streams.take_audio_consumer())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}
