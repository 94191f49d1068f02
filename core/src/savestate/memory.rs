//! In-memory savestate store (standalone sessions and tests)

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use retroplay_shared::{CoreId, ResourceRef, SavestateKey, SavestateMeta};

use super::{SavestateDraft, SavestateRecord, SavestateStore, StoreError, select_most_recent};

/// Savestate store that keeps every record in process memory
#[derive(Default)]
pub struct MemorySavestateStore {
    records: Mutex<HashMap<SavestateKey, SavestateRecord>>,
    seq: AtomicU32,
}

impl MemorySavestateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records written since creation, including retired ones
    pub fn writes(&self) -> u32 {
        self.seq.load(Ordering::Relaxed)
    }

    fn records(&self) -> MutexGuard<'_, HashMap<SavestateKey, SavestateRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SavestateStore for MemorySavestateStore {
    fn put(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = SavestateKey::generate(
            draft.resource.as_ref(),
            &draft.core_id,
            draft.created.timestamp_millis(),
            seq,
        );
        let record = SavestateRecord {
            meta: draft.to_meta(key.clone()),
            thumbnail: draft.thumbnail,
            data: draft.data,
        };
        self.records().insert(key.clone(), record);
        Ok(key)
    }

    fn get(&self, key: &SavestateKey) -> Result<SavestateRecord, StoreError> {
        self.records()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn meta(&self, key: &SavestateKey) -> Result<SavestateMeta, StoreError> {
        self.records()
            .get(key)
            .map(|record| record.meta.clone())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn list_for(
        &self,
        resource: Option<&ResourceRef>,
        core: Option<&CoreId>,
    ) -> Result<Vec<SavestateMeta>, StoreError> {
        let records = self.records();
        Ok(select_most_recent(
            records.values().map(|record| record.meta.clone()),
            resource,
            core,
        ))
    }

    fn retire(&self, key: &SavestateKey) -> Result<(), StoreError> {
        self.records().remove(key);
        Ok(())
    }
}
