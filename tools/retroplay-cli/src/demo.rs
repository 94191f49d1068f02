//! Built-in demo cores and terminal collaborators
//!
//! The demo cores are deterministic: the whole machine is a frame counter,
//! a xorshift generator and a small RAM page.

use std::io::{self, BufRead, Write};

use retroplay_core::{
    AchievementService, AvFrame, Confirmation, CoreInfo, CoreProvider, DeviceCapabilities,
    DeviceProvider, EmulationCore, InputDevice, InputRouter, MetricsSink, PlayTimes, PortTopology,
    SavestateChoice, Selector, VideoFrame,
};
use retroplay_shared::{CoreId, DeviceId, PortId, ResourceRef, SavestateMeta, blob_checksum};
use tracing::{debug, info};

pub const REWIND_CORE: &str = "demo.rewind";
pub const REALTIME_CORE: &str = "demo.realtime";

const RAM_SIZE: usize = 48;
const STATE_SIZE: usize = 16 + RAM_SIZE;
const FRAME_RATE: f64 = 60.0;
const SAMPLE_RATE: u32 = 48_000;
const SCREEN: u32 = 8;

// ============================================================================
// Demo core
// ============================================================================

pub struct DemoCore {
    id: CoreId,
    rewind: bool,
    frame: u64,
    rng: u64,
    ram: [u8; RAM_SIZE],
    input_enabled: bool,
}

impl DemoCore {
    fn new(id: CoreId, rewind: bool) -> Self {
        Self {
            id,
            rewind,
            frame: 0,
            rng: 0x9E37_79B9_7F4A_7C15,
            ram: [0; RAM_SIZE],
            input_enabled: true,
        }
    }

    fn step_rng(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }
}

impl InputRouter for DemoCore {
    fn register_input(&mut self, port: &PortId, device: &InputDevice) {
        info!(%port, device = %device.id, profile = %device.profile, "Controller connected");
    }

    fn unregister_input(&mut self, port: &PortId, device: &DeviceId) {
        info!(%port, %device, "Controller disconnected");
    }
}

impl EmulationCore for DemoCore {
    fn id(&self) -> &CoreId {
        &self.id
    }

    fn supports_rewind(&self) -> bool {
        self.rewind
    }

    fn initialize(&mut self) -> bool {
        true
    }

    fn open_resource(&mut self, resource: &ResourceRef) -> bool {
        // Seed the machine from the resource so different resources diverge
        self.rng ^= blob_checksum(resource.as_str().as_bytes()) | 1;
        true
    }

    fn open_standalone(&mut self) -> bool {
        true
    }

    fn close(&mut self) {}

    fn unload(&mut self) {
        debug!(core = %self.id, "Demo core unloaded");
    }

    fn frame_rate(&self) -> f64 {
        FRAME_RATE
    }

    fn serialize_size(&self) -> usize {
        STATE_SIZE
    }

    fn serialize(&mut self, out: &mut Vec<u8>) -> bool {
        out.clear();
        out.extend_from_slice(&self.frame.to_le_bytes());
        out.extend_from_slice(&self.rng.to_le_bytes());
        out.extend_from_slice(&self.ram);
        true
    }

    fn deserialize(&mut self, data: &[u8]) -> bool {
        if data.len() != STATE_SIZE {
            return false;
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[..8]);
        self.frame = u64::from_le_bytes(word);
        word.copy_from_slice(&data[8..16]);
        self.rng = u64::from_le_bytes(word);
        self.ram.copy_from_slice(&data[16..]);
        true
    }

    fn set_speed(&mut self, speed: f64) {
        debug!(core = %self.id, speed, "Demo core speed");
    }

    fn run_frame(&mut self, out: &mut AvFrame) {
        self.frame += 1;
        let noise = self.step_rng();
        let slot = (self.frame % RAM_SIZE as u64) as usize;
        if self.input_enabled {
            self.ram[slot] ^= noise as u8;
        }

        // Square wave whose pitch follows the RAM byte just written
        let samples = (SAMPLE_RATE as f64 / FRAME_RATE) as usize;
        let period = 40 + self.ram[slot] as usize;
        for i in 0..samples {
            let level = if (i / period) % 2 == 0 { 0.2 } else { -0.2 };
            out.audio.extend_from_slice(&[level, level]);
        }

        let pixels = (SCREEN * SCREEN) as usize;
        out.video = Some(VideoFrame {
            width: SCREEN,
            height: SCREEN,
            data: (0..pixels).map(|i| self.ram[i % RAM_SIZE]).collect(),
        });
    }

    fn input_topology(&self) -> PortTopology {
        PortTopology::new([PortId::new("port1"), PortId::new("port2")], None)
    }

    fn hardware_reset(&mut self) {
        let id = self.id.clone();
        *self = Self::new(id, self.rewind);
    }

    fn enable_input(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }
}

/// Provides the two demo cores for any resource
pub struct DemoCores;

impl CoreProvider for DemoCores {
    fn compatible_cores(&self, _resource: Option<&ResourceRef>) -> Vec<CoreInfo> {
        vec![
            CoreInfo::new(REWIND_CORE, "Demo (rewind)"),
            CoreInfo::new(REALTIME_CORE, "Demo (realtime)"),
        ]
    }

    fn instantiate(&self, id: &CoreId) -> Option<Box<dyn EmulationCore>> {
        match id.as_str() {
            REWIND_CORE => Some(Box::new(DemoCore::new(id.clone(), true))),
            REALTIME_CORE => Some(Box::new(DemoCore::new(id.clone(), false))),
            _ => None,
        }
    }
}

// ============================================================================
// Terminal collaborators
// ============================================================================

/// Non-interactive selector: first compatible core, optionally resuming the
/// most recent savestate
pub struct CliSelector {
    pub resume: bool,
}

impl Selector for CliSelector {
    fn select_core(
        &self,
        resource: Option<&ResourceRef>,
        compatible: &[CoreInfo],
        installable: &[CoreInfo],
    ) -> Option<CoreId> {
        if compatible.is_empty() {
            for core in installable {
                info!(core = %core.id, "Core available for installation: {}", core.name);
            }
            return None;
        }
        let choice = compatible[0].id.clone();
        info!(resource = ?resource, core = %choice, "Selected core");
        Some(choice)
    }

    fn select_savestate(&self, _resource: &ResourceRef, _core: &CoreId, saves: &[SavestateMeta]) -> SavestateChoice {
        match saves.first() {
            Some(latest) if self.resume => {
                info!(key = %latest.key, created = %latest.created, "Resuming savestate");
                SavestateChoice::Load(latest.key.clone())
            }
            _ => SavestateChoice::NewGame,
        }
    }
}

/// Asks on the terminal unless `assume_yes` is set
pub struct TerminalConfirmation {
    pub assume_yes: bool,
}

impl Confirmation for TerminalConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
            Err(_) => false,
        }
    }
}

/// A fixed set of virtual joysticks
pub struct VirtualJoysticks {
    devices: Vec<InputDevice>,
}

impl VirtualJoysticks {
    pub fn new(count: usize) -> Self {
        Self {
            devices: (0..count)
                .map(|i| InputDevice::joystick(format!("virtual-joy{}", i)).with_profile("gamepad"))
                .collect(),
        }
    }
}

impl DeviceProvider for VirtualJoysticks {
    fn devices_with(&self, required: DeviceCapabilities) -> Vec<InputDevice> {
        self.devices
            .iter()
            .filter(|d| d.capabilities.contains(required))
            .cloned()
            .collect()
    }
}

/// Achievement service stand-in that only logs
pub struct LoggingAchievements;

impl AchievementService for LoggingAchievements {
    fn start(&mut self, core: &CoreId, resource: &ResourceRef) {
        info!(%core, %resource, "Achievements: tracking game");
    }

    fn reset(&mut self) {
        info!("Achievements: hardware reset");
    }

    fn stop(&mut self) {
        info!("Achievements: stopped");
    }
}

/// Metrics sink that writes to the debug log
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn set_frame_rate(&self, fps: f64) {
        debug!(fps, "Frame rate");
    }

    fn set_play_times(&self, times: PlayTimes) {
        debug!(
            time_ms = times.time_ms,
            total_ms = times.total_time_ms,
            cache_ms = times.cache_time_ms,
            speed = times.speed,
            "Play times"
        );
    }
}
