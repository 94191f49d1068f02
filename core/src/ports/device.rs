//! Physical input devices as seen by the port mapper

use std::time::Instant;

use bitflags::bitflags;
use retroplay_shared::DeviceId;

bitflags! {
    /// Input capabilities a device declares
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceCapabilities: u8 {
        /// Generic joystick-like input (gamepads, arcade sticks, wheels)
        const JOYSTICK = 1 << 0;
        const KEYBOARD = 1 << 1;
        const MOUSE = 1 << 2;
    }
}

/// Snapshot of a connected input device.
///
/// Mirrors the live device topology; the mapper never owns device lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub id: DeviceId,
    /// Last time the user pressed something on this device (`None` = never)
    pub last_active: Option<Instant>,
    pub capabilities: DeviceCapabilities,
    /// Controller profile the device reports (e.g. `"game.controller.default"`)
    pub profile: String,
}

impl InputDevice {
    pub fn joystick(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            last_active: None,
            capabilities: DeviceCapabilities::JOYSTICK,
            profile: String::from("game.controller.default"),
        }
    }

    pub fn with_last_active(mut self, at: Instant) -> Self {
        self.last_active = Some(at);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

/// Source of the live device set.
///
/// Queried whenever a device-topology-changed notification arrives.
pub trait DeviceProvider: Send + Sync {
    /// Devices currently exposing all of `required`
    fn devices_with(&self, required: DeviceCapabilities) -> Vec<InputDevice>;
}

/// Device provider with no devices
pub struct NoDevices;

impl DeviceProvider for NoDevices {
    fn devices_with(&self, _required: DeviceCapabilities) -> Vec<InputDevice> {
        Vec::new()
    }
}
