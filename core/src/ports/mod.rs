//! Device port mapping
//!
//! Assigns physical input devices to the logical controller ports of the
//! running program and keeps that assignment in sync as devices come and go.
//!
//! On every device-topology-changed notification the mapper:
//! 1. drops assignments of devices that disappeared ("expired"),
//! 2. builds a fresh candidate assignment: devices ordered by most recent
//!    activity (never-active devices last) are paired greedily with ports in
//!    declaration order, up to the player limit,
//! 3. applies only the difference, so unaffected device/port pairs see no
//!    handler churn.
//!
//! The candidate assignment is rebuilt from scratch each time; a device is not
//! preferentially kept on its previous port.

mod device;


use hashbrown::{HashMap, HashSet};
use retroplay_shared::{DeviceId, PortId};
use smallvec::SmallVec;

use crate::emulator::{InputRouter, PortTopology};

pub use device::{DeviceCapabilities, DeviceProvider, InputDevice, NoDevices};

/// One observable (un)registration performed by the mapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortChange {
    Registered { device: DeviceId, port: PortId },
    Unregistered { device: DeviceId, port: PortId },
}

/// Changes applied by a single mapping pass (usually a handful)
pub type PortChanges = SmallVec<[PortChange; 4]>;

/// Maintains the device → port assignment for one session
pub struct PortMapper {
    topology: PortTopology,
    required: DeviceCapabilities,
    assignments: HashMap<DeviceId, PortId>,
}

impl PortMapper {
    /// Create a mapper for joystick-like devices
    pub fn new(topology: PortTopology) -> Self {
        Self::with_required(topology, DeviceCapabilities::JOYSTICK)
    }

    pub fn with_required(topology: PortTopology, required: DeviceCapabilities) -> Self {
        Self {
            topology,
            required,
            assignments: HashMap::new(),
        }
    }

    /// Capability a device must expose to be mapped
    pub fn required(&self) -> DeviceCapabilities {
        self.required
    }

    pub fn topology(&self) -> &PortTopology {
        &self.topology
    }

    /// Port currently assigned to `device`
    pub fn port_of(&self, device: &DeviceId) -> Option<&PortId> {
        self.assignments.get(device)
    }

    /// Device currently assigned to `port`
    pub fn device_on(&self, port: &PortId) -> Option<&DeviceId> {
        self.assignments
            .iter()
            .find_map(|(device, p)| (p == port).then_some(device))
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&DeviceId, &PortId)> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Recompute the assignment for the live device set and apply the difference.
    ///
    /// Devices lacking the required capability are ignored. All
    /// unregistrations are applied before any registration, so a port never
    /// holds two devices at once, even transiently.
    pub fn process<R: InputRouter + ?Sized>(&mut self, live: &[InputDevice], router: &mut R) -> PortChanges {
        let live = self.eligible(live);
        let mut changes = PortChanges::new();

        // Expired devices
        let live_ids: HashSet<&DeviceId> = live.iter().map(|d| &d.id).collect();
        let expired: Vec<(DeviceId, PortId)> = self
            .assignments
            .iter()
            .filter(|(device, _)| !live_ids.contains(device))
            .map(|(device, port)| (device.clone(), port.clone()))
            .collect();
        for (device, port) in expired {
            router.unregister_input(&port, &device);
            self.assignments.remove(&device);
            tracing::info!(%device, %port, "Input device expired, unregistered from port");
            changes.push(PortChange::Unregistered { device, port });
        }

        let candidate = self.map_devices(&live);

        // Moved or removed assignments
        for device in &live {
            let old = self.assignments.get(&device.id);
            let new = candidate.get(&device.id);
            if let Some(old_port) = old {
                if new != Some(old_port) {
                    let port = old_port.clone();
                    router.unregister_input(&port, &device.id);
                    self.assignments.remove(&device.id);
                    tracing::debug!(device = %device.id, %port, "Unregistered input device");
                    changes.push(PortChange::Unregistered {
                        device: device.id.clone(),
                        port,
                    });
                }
            }
        }

        // Moved or new assignments
        for device in &live {
            let Some(port) = candidate.get(&device.id) else {
                continue;
            };
            if self.assignments.get(&device.id) == Some(port) {
                continue;
            }
            router.register_input(port, device);
            self.assignments.insert(device.id.clone(), port.clone());
            tracing::info!(device = %device.id, %port, profile = %device.profile, "Registered input device");
            changes.push(PortChange::Registered {
                device: device.id.clone(),
                port: port.clone(),
            });
        }

        changes
    }

    /// Build the candidate assignment for `live` without applying it.
    ///
    /// Devices are ordered by last activity, most recent first, with devices
    /// that were never active after all others; ties keep their input order.
    pub fn map_devices(&self, live: &[InputDevice]) -> HashMap<DeviceId, PortId> {
        let mut sorted: Vec<&InputDevice> = live.iter().collect();
        sorted.sort_by(|lhs, rhs| match (lhs.last_active, rhs.last_active) {
            (Some(l), Some(r)) => r.cmp(&l),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        self.topology
            .ports
            .iter()
            .take(self.topology.usable_ports())
            .zip(sorted)
            .map(|(port, device)| (device.id.clone(), port.clone()))
            .collect()
    }

    /// Unregister every assigned device (session teardown)
    pub fn unbind<R: InputRouter + ?Sized>(&mut self, router: &mut R) -> PortChanges {
        let mut changes = PortChanges::new();
        for (device, port) in self.assignments.drain() {
            router.unregister_input(&port, &device);
            changes.push(PortChange::Unregistered { device, port });
        }
        if !changes.is_empty() {
            tracing::debug!(count = changes.len(), "Released all port assignments");
        }
        changes
    }

    /// Devices exposing the required capability, first occurrence of each id
    fn eligible(&self, live: &[InputDevice]) -> Vec<InputDevice> {
        let mut seen = HashSet::new();
        live.iter()
            .filter(|device| device.capabilities.contains(self.required))
            .filter(|device| seen.insert(device.id.clone()))
            .cloned()
            .collect()
    }
}
