//! Emulation core capability traits
//!
//! The session controller treats an emulation core as an opaque capability
//! provider: it can run one frame, (de)serialize its full state, report its
//! frame rate and serialize size, and accept input from physical devices on
//! its logical controller ports. Cores are obtained through a [`CoreProvider`].

use retroplay_shared::{CoreId, DeviceId, PortId, ResourceRef};

use crate::ports::InputDevice;

/// Receiver of port (un)registrations made by the device port mapper.
///
/// Registering a device on a port makes the core start receiving that
/// device's input on the port; unregistering stops it.
pub trait InputRouter {
    /// Route `device` to `port`, polling it with the port's controller profile
    fn register_input(&mut self, port: &PortId, device: &InputDevice);

    /// Stop routing `device` to `port`
    fn unregister_input(&mut self, port: &PortId, device: &DeviceId);
}

/// Logical controller ports declared by the emulated program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortTopology {
    /// Ports in declaration order
    pub ports: Vec<PortId>,
    /// Maximum number of simultaneous players (`None` = unbounded)
    pub player_limit: Option<usize>,
}

impl PortTopology {
    pub fn new(ports: impl IntoIterator<Item = PortId>, player_limit: Option<usize>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
            player_limit,
        }
    }

    /// Number of ports that may hold a device at the same time
    pub fn usable_ports(&self) -> usize {
        match self.player_limit {
            Some(limit) => limit.min(self.ports.len()),
            None => self.ports.len(),
        }
    }
}

/// Video output of one emulated frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Audio/video produced by one call to [`EmulationCore::run_frame`]
#[derive(Debug, Clone, Default)]
pub struct AvFrame {
    /// Interleaved stereo samples
    pub audio: Vec<f32>,
    pub video: Option<VideoFrame>,
}

impl AvFrame {
    pub fn clear(&mut self) {
        self.audio.clear();
        self.video = None;
    }
}

/// A loaded emulation core.
///
/// Lifecycle: `initialize` → `open_resource`/`open_standalone` → frames →
/// `close` → `unload`. `unload` must be called exactly once for every core
/// handed out by a [`CoreProvider`], whether or not opening succeeded.
pub trait EmulationCore: InputRouter + Send {
    /// Identity of this core
    fn id(&self) -> &CoreId;

    /// Whether the core can be driven frame-by-frame with state snapshots
    fn supports_rewind(&self) -> bool;

    fn initialize(&mut self) -> bool;

    fn open_resource(&mut self, resource: &ResourceRef) -> bool;

    /// Open without a backing resource
    fn open_standalone(&mut self) -> bool;

    fn close(&mut self);

    fn unload(&mut self);

    /// Native frame rate in frames per second
    fn frame_rate(&self) -> f64;

    /// Exact size in bytes of a serialized state
    fn serialize_size(&self) -> usize;

    /// Serialize the full core state into `out` (cleared first)
    fn serialize(&mut self, out: &mut Vec<u8>) -> bool;

    /// Restore a state produced by [`serialize`](Self::serialize).
    ///
    /// Returning `false` must leave the running state untouched.
    fn deserialize(&mut self, data: &[u8]) -> bool;

    /// Execution speed hint (1.0 = normal)
    fn set_speed(&mut self, speed: f64);

    /// Execute exactly one frame
    fn run_frame(&mut self, out: &mut AvFrame);

    /// Logical controller ports exposed by the running program
    fn input_topology(&self) -> PortTopology;

    fn hardware_reset(&mut self) {}

    fn enable_input(&mut self, _enabled: bool) {}
}

/// Description of an emulation core that may run a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInfo {
    pub id: CoreId,
    pub name: String,
}

impl CoreInfo {
    pub fn new(id: impl Into<CoreId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Source of emulation cores.
pub trait CoreProvider: Send + Sync {
    /// Installed cores able to run `resource` (or standalone when `None`)
    fn compatible_cores(&self, resource: Option<&ResourceRef>) -> Vec<CoreInfo>;

    /// Cores that could run `resource` but are not installed
    fn installable_cores(&self, _resource: Option<&ResourceRef>) -> Vec<CoreInfo> {
        Vec::new()
    }

    /// Human-readable name for `id`, if the core is known
    fn core_name(&self, id: &CoreId) -> Option<String> {
        self.compatible_cores(None)
            .into_iter()
            .find(|info| &info.id == id)
            .map(|info| info.name)
    }

    /// Load a new handle to the core identified by `id`
    fn instantiate(&self, id: &CoreId) -> Option<Box<dyn EmulationCore>>;
}
