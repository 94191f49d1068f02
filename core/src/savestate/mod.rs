//! Savestate persistence
//!
//! A savestate is an immutable record: an opaque core-memory blob plus
//! structured metadata (producing core, resource, label, timestamp).
//! "Overwriting" a save writes a new record and retires the old key, so a
//! crash mid-write can never corrupt a previously good snapshot.

mod fs;
mod memory;


use chrono::{DateTime, Utc};
use retroplay_shared::{CoreId, ResourceRef, SavestateKey, SavestateKind, SavestateMeta};

pub use fs::FileSavestateStore;
pub use memory::MemorySavestateStore;

/// A savestate that has not been written yet
#[derive(Debug, Clone)]
pub struct SavestateDraft {
    pub core_id: CoreId,
    pub resource: Option<ResourceRef>,
    pub created: DateTime<Utc>,
    pub label: String,
    pub kind: SavestateKind,
    pub thumbnail: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

impl SavestateDraft {
    pub fn new(core_id: CoreId, resource: Option<ResourceRef>, kind: SavestateKind, data: Vec<u8>) -> Self {
        Self {
            core_id,
            resource,
            created: Utc::now(),
            label: String::new(),
            kind,
            thumbnail: None,
            data,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Vec<u8>) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Build the metadata this draft will be stored under
    pub(crate) fn to_meta(&self, key: SavestateKey) -> SavestateMeta {
        SavestateMeta {
            key,
            core_id: self.core_id.clone(),
            resource: self.resource.clone(),
            created: self.created,
            label: self.label.clone(),
            kind: self.kind,
            size: self.data.len() as u64,
            checksum: retroplay_shared::blob_checksum(&self.data),
            has_thumbnail: self.thumbnail.is_some(),
        }
    }
}

/// A stored savestate
#[derive(Debug, Clone, PartialEq)]
pub struct SavestateRecord {
    pub meta: SavestateMeta,
    pub thumbnail: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

impl SavestateRecord {
    pub fn key(&self) -> &SavestateKey {
        &self.meta.key
    }
}

/// Error accessing a savestate store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("savestate {0} not found")]
    NotFound(SavestateKey),
    #[error("invalid savestate key {0:?}")]
    InvalidKey(String),
    #[error("savestate {key} is corrupt: {reason}")]
    Corrupt { key: SavestateKey, reason: String },
    #[error("savestate I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("savestate metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Persistent, enumerable collection of savestates
pub trait SavestateStore: Send + Sync {
    /// Write a new immutable record and return its key
    fn put(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError>;

    fn get(&self, key: &SavestateKey) -> Result<SavestateRecord, StoreError>;

    /// Metadata only, without reading the blob
    fn meta(&self, key: &SavestateKey) -> Result<SavestateMeta, StoreError>;

    /// Savestates matching `resource` and `core` (`None` matches anything),
    /// most recent first
    fn list_for(
        &self,
        resource: Option<&ResourceRef>,
        core: Option<&CoreId>,
    ) -> Result<Vec<SavestateMeta>, StoreError>;

    /// Remove a record; retiring an unknown key is not an error
    fn retire(&self, key: &SavestateKey) -> Result<(), StoreError>;

    /// Write `draft` as a new record, then retire `old`.
    ///
    /// Failing to retire the old record is logged but does not fail the write.
    fn replace(&self, old: &SavestateKey, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        let key = self.put(draft)?;
        if &key != old {
            if let Err(e) = self.retire(old) {
                tracing::warn!(%old, error = %e, "Failed to retire replaced savestate");
            }
        }
        Ok(key)
    }
}

/// Filter and order metadata the way every store lists it
pub(crate) fn select_most_recent(
    records: impl Iterator<Item = SavestateMeta>,
    resource: Option<&ResourceRef>,
    core: Option<&CoreId>,
) -> Vec<SavestateMeta> {
    let mut selected: Vec<SavestateMeta> = records
        .filter(|meta| resource.is_none_or(|r| meta.resource.as_ref() == Some(r)))
        .filter(|meta| core.is_none_or(|c| &meta.core_id == c))
        .collect();
    selected.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.key.cmp(&a.key)));
    selected
}
