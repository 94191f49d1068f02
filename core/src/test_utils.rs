//! Shared test utilities: fake cores and collaborators

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use retroplay_shared::{CoreId, DeviceId, PortId, ResourceRef, SavestateKey, SavestateMeta};

use crate::emulator::{AvFrame, CoreInfo, CoreProvider, EmulationCore, InputRouter, PortTopology, VideoFrame};
use crate::ports::{DeviceCapabilities, DeviceProvider, InputDevice};
use crate::savestate::{MemorySavestateStore, SavestateDraft, SavestateRecord, SavestateStore, StoreError};
use crate::session::{Confirmation, MetricsSink, PlayTimes, SavestateChoice, Selector};

// ============================================================================
// Input routing
// ============================================================================

/// One call made on an [`InputRouter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterCall {
    Register(PortId, DeviceId),
    Unregister(PortId, DeviceId),
}

/// Input router that records every call
#[derive(Debug, Default)]
pub struct RecordingRouter {
    pub calls: Vec<RouterCall>,
}

impl InputRouter for RecordingRouter {
    fn register_input(&mut self, port: &PortId, device: &InputDevice) {
        self.calls.push(RouterCall::Register(port.clone(), device.id.clone()));
    }

    fn unregister_input(&mut self, port: &PortId, device: &DeviceId) {
        self.calls.push(RouterCall::Unregister(port.clone(), device.clone()));
    }
}

// ============================================================================
// Counter core
// ============================================================================

/// Size of a serialized [`CounterCore`] state
pub const COUNTER_STATE_SIZE: usize = 16;

/// Observations shared between a test and every core it instantiates
#[derive(Debug, Default)]
pub struct CoreTracker {
    /// Handles instantiated and not yet unloaded
    pub live: AtomicUsize,
    pub instantiated: AtomicUsize,
    pub resets: AtomicU32,
    pub input_enabled: AtomicBool,
    pub router: Mutex<Vec<RouterCall>>,
}

impl CoreTracker {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn router_calls(&self) -> Vec<RouterCall> {
        self.router.lock().unwrap().clone()
    }
}

/// How a fake core behaves
#[derive(Debug, Clone)]
pub struct CoreBehavior {
    pub rewind: bool,
    pub fail_initialize: bool,
    pub fail_open: bool,
    /// Refuse every `deserialize`
    pub reject_loads: bool,
    pub frame_rate: f64,
    pub ports: usize,
}

impl Default for CoreBehavior {
    fn default() -> Self {
        Self {
            rewind: false,
            fail_initialize: false,
            fail_open: false,
            reject_loads: false,
            frame_rate: 50.0,
            ports: 2,
        }
    }
}

/// Deterministic core whose whole state is a frame counter and a running hash
pub struct CounterCore {
    id: CoreId,
    behavior: CoreBehavior,
    tracker: Arc<CoreTracker>,
    counter: u64,
    mix: u64,
    unloaded: bool,
}

impl CounterCore {
    pub fn new(id: impl Into<CoreId>, behavior: CoreBehavior, tracker: Arc<CoreTracker>) -> Self {
        tracker.live.fetch_add(1, Ordering::SeqCst);
        tracker.instantiated.fetch_add(1, Ordering::SeqCst);
        Self {
            id: id.into(),
            behavior,
            tracker,
            counter: 0,
            mix: 0,
            unloaded: false,
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }
}

impl InputRouter for CounterCore {
    fn register_input(&mut self, port: &PortId, device: &InputDevice) {
        self.tracker
            .router
            .lock()
            .unwrap()
            .push(RouterCall::Register(port.clone(), device.id.clone()));
    }

    fn unregister_input(&mut self, port: &PortId, device: &DeviceId) {
        self.tracker
            .router
            .lock()
            .unwrap()
            .push(RouterCall::Unregister(port.clone(), device.clone()));
    }
}

impl EmulationCore for CounterCore {
    fn id(&self) -> &CoreId {
        &self.id
    }

    fn supports_rewind(&self) -> bool {
        self.behavior.rewind
    }

    fn initialize(&mut self) -> bool {
        !self.behavior.fail_initialize
    }

    fn open_resource(&mut self, _resource: &ResourceRef) -> bool {
        !self.behavior.fail_open
    }

    fn open_standalone(&mut self) -> bool {
        !self.behavior.fail_open
    }

    fn close(&mut self) {}

    fn unload(&mut self) {
        assert!(!self.unloaded, "core unloaded twice");
        self.unloaded = true;
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn frame_rate(&self) -> f64 {
        self.behavior.frame_rate
    }

    fn serialize_size(&self) -> usize {
        COUNTER_STATE_SIZE
    }

    fn serialize(&mut self, out: &mut Vec<u8>) -> bool {
        out.clear();
        out.extend_from_slice(&self.counter.to_le_bytes());
        out.extend_from_slice(&self.mix.to_le_bytes());
        true
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        if self.behavior.reject_loads || data.len() != COUNTER_STATE_SIZE {
            return false;
        }
        let (counter, mix) = data.split_at(8);
        self.counter = u64::from_le_bytes(counter.try_into().unwrap());
        self.mix = u64::from_le_bytes(mix.try_into().unwrap());
        true
    }

    fn set_speed(&mut self, _speed: f64) {}

    fn run_frame(&mut self, out: &mut AvFrame) {
        self.counter += 1;
        self.mix = self
            .mix
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(self.counter);
        out.audio.extend_from_slice(&[0.1, -0.1]);
        out.video = Some(VideoFrame {
            width: 1,
            height: 1,
            data: self.counter.to_le_bytes()[..4].to_vec(),
        });
    }

    fn input_topology(&self) -> PortTopology {
        PortTopology::new((1..=self.behavior.ports).map(|i| PortId::new(format!("port{}", i))), None)
    }

    fn hardware_reset(&mut self) {
        self.counter = 0;
        self.mix = 0;
        self.tracker.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn enable_input(&mut self, enabled: bool) {
        self.tracker.input_enabled.store(enabled, Ordering::SeqCst);
    }
}

/// Provider of [`CounterCore`]s
pub struct CounterCoreProvider {
    pub cores: Vec<(CoreInfo, CoreBehavior)>,
    pub installable: Vec<CoreInfo>,
    pub tracker: Arc<CoreTracker>,
}

impl CounterCoreProvider {
    pub fn new() -> Self {
        Self {
            cores: Vec::new(),
            installable: Vec::new(),
            tracker: Arc::new(CoreTracker::default()),
        }
    }

    pub fn with_core(mut self, id: &str, behavior: CoreBehavior) -> Self {
        self.cores.push((CoreInfo::new(id, format!("Core {}", id)), behavior));
        self
    }
}

impl CoreProvider for CounterCoreProvider {
    fn compatible_cores(&self, _resource: Option<&ResourceRef>) -> Vec<CoreInfo> {
        self.cores.iter().map(|(info, _)| info.clone()).collect()
    }

    fn installable_cores(&self, _resource: Option<&ResourceRef>) -> Vec<CoreInfo> {
        self.installable.clone()
    }

    fn instantiate(&self, id: &CoreId) -> Option<Box<dyn EmulationCore>> {
        let (info, behavior) = self.cores.iter().find(|(info, _)| &info.id == id)?;
        Some(Box::new(CounterCore::new(
            info.id.clone(),
            behavior.clone(),
            self.tracker.clone(),
        )))
    }
}

// ============================================================================
// Selection and confirmation
// ============================================================================

/// Selector that answers from a script and records what it was asked
#[derive(Default)]
pub struct ScriptedSelector {
    /// Core to pick (`None` cancels)
    pub core: Mutex<Option<CoreId>>,
    pub savestate: Mutex<Option<SavestateChoice>>,
    pub core_prompts: AtomicUsize,
    /// Savestate lists offered, in call order
    pub offered: Mutex<Vec<Vec<SavestateMeta>>>,
}

impl ScriptedSelector {
    pub fn picking(core: &str) -> Self {
        let selector = Self::default();
        *selector.core.lock().unwrap() = Some(CoreId::new(core));
        selector
    }

    pub fn set_savestate(&self, choice: SavestateChoice) {
        *self.savestate.lock().unwrap() = Some(choice);
    }
}

impl Selector for ScriptedSelector {
    fn select_core(
        &self,
        _resource: Option<&ResourceRef>,
        _compatible: &[CoreInfo],
        _installable: &[CoreInfo],
    ) -> Option<CoreId> {
        self.core_prompts.fetch_add(1, Ordering::SeqCst);
        self.core.lock().unwrap().clone()
    }

    fn select_savestate(&self, _resource: &ResourceRef, _core: &CoreId, saves: &[SavestateMeta]) -> SavestateChoice {
        self.offered.lock().unwrap().push(saves.to_vec());
        self.savestate
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(SavestateChoice::NewGame)
    }
}

/// Confirmation that gives a fixed answer and counts prompts
pub struct ScriptedConfirmation {
    pub answer: AtomicBool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Confirmation for ScriptedConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Devices and metrics
// ============================================================================

/// Device provider backed by a mutable list
#[derive(Default)]
pub struct StaticDevices {
    pub devices: Mutex<Vec<InputDevice>>,
}

impl StaticDevices {
    pub fn set(&self, devices: Vec<InputDevice>) {
        *self.devices.lock().unwrap() = devices;
    }
}

impl DeviceProvider for StaticDevices {
    fn devices_with(&self, required: DeviceCapabilities) -> Vec<InputDevice> {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.capabilities.contains(required))
            .cloned()
            .collect()
    }
}

/// Metrics sink that keeps the latest values
#[derive(Default)]
pub struct RecordingMetrics {
    pub frame_rate: Mutex<Option<f64>>,
    pub play_times: Mutex<Option<PlayTimes>>,
    pub updates: AtomicUsize,
}

impl MetricsSink for RecordingMetrics {
    fn set_frame_rate(&self, fps: f64) {
        *self.frame_rate.lock().unwrap() = Some(fps);
    }

    fn set_play_times(&self, times: PlayTimes) {
        *self.play_times.lock().unwrap() = Some(times);
        self.updates.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Savestate store
// ============================================================================

/// In-memory store whose writes block until [`release`](Self::release)
#[derive(Default)]
pub struct GatedStore {
    pub records: MemorySavestateStore,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedStore {
    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl SavestateStore for GatedStore {
    fn put(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.records.put(draft)
    }

    fn get(&self, key: &SavestateKey) -> Result<SavestateRecord, StoreError> {
        self.records.get(key)
    }

    fn meta(&self, key: &SavestateKey) -> Result<SavestateMeta, StoreError> {
        self.records.meta(key)
    }

    fn list_for(&self, resource: Option<&ResourceRef>, core: Option<&CoreId>) -> Result<Vec<SavestateMeta>, StoreError> {
        self.records.list_for(resource, core)
    }

    fn retire(&self, key: &SavestateKey) -> Result<(), StoreError> {
        self.records.retire(key)
    }
}
