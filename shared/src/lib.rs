//! Shared types for the retroplay session controller and its tools.

pub mod ids;
pub mod savestate;

pub use ids::{CoreId, DeviceId, PortId, ResourceRef, SavestateKey, is_safe_key};
pub use savestate::{SavestateKind, SavestateMeta, blob_checksum};
