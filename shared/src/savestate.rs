//! Savestate metadata persisted alongside each snapshot blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::ids::{CoreId, ResourceRef, SavestateKey};

/// Whether a savestate was written by the autosave slot or by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SavestateKind {
    /// Written on close, on hand-off, or by the periodic autosave
    #[default]
    Auto,
    /// Written on explicit user request
    Manual,
}

/// Structured metadata for a stored savestate.
///
/// The metadata never lives inside the blob; stores keep it in a separate
/// record so the blob stays exactly `serialize_size` bytes long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavestateMeta {
    pub key: SavestateKey,
    /// Emulation core that produced the blob
    pub core_id: CoreId,
    /// Resource the blob belongs to (`None` for standalone sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: SavestateKind,
    /// Blob length in bytes
    pub size: u64,
    /// xxHash3-64 of the blob
    pub checksum: u64,
    #[serde(default)]
    pub has_thumbnail: bool,
}

impl SavestateMeta {
    /// True if `core` can load this savestate without overwriting foreign history.
    pub fn is_compatible_with(&self, core: &CoreId) -> bool {
        &self.core_id == core
    }

    /// True if `data` matches the recorded size and checksum.
    pub fn verify(&self, data: &[u8]) -> bool {
        data.len() as u64 == self.size && blob_checksum(data) == self.checksum
    }
}

/// Checksum used for savestate blobs.
pub fn blob_checksum(data: &[u8]) -> u64 {
    xxh3_64(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(data: &[u8]) -> SavestateMeta {
        SavestateMeta {
            key: SavestateKey::new("k"),
            core_id: CoreId::new("core.a"),
            resource: Some(ResourceRef::new("/roms/a.sfc")),
            created: Utc::now(),
            label: "Level 2".to_string(),
            kind: SavestateKind::Manual,
            size: data.len() as u64,
            checksum: blob_checksum(data),
            has_thumbnail: false,
        }
    }

    #[test]
    fn verify_detects_tampering() {
        let m = meta(&[1, 2, 3, 4]);
        assert!(m.verify(&[1, 2, 3, 4]));
        assert!(!m.verify(&[1, 2, 3, 5]));
        assert!(!m.verify(&[1, 2, 3]));
    }

    #[test]
    fn compatibility_is_by_core_identity() {
        let m = meta(&[0]);
        assert!(m.is_compatible_with(&CoreId::new("core.a")));
        assert!(!m.is_compatible_with(&CoreId::new("core.b")));
    }

    #[test]
    fn metadata_json_omits_missing_resource() {
        let mut m = meta(&[0]);
        m.resource = None;
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("resource"));
        let back: SavestateMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
