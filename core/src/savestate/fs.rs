//! Directory-backed savestate store
//!
//! Layout, one record per key:
//! - `<key>.state`: the opaque core blob
//! - `<key>.thumb`: optional thumbnail
//! - `<key>.json`: metadata, written last
//!
//! Every file is written to a `.tmp` sibling, synced and renamed into place.
//! The metadata file is the commit marker: a record without it is invisible,
//! so a crash mid-write never exposes a half-written savestate.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use retroplay_shared::{CoreId, ResourceRef, SavestateKey, SavestateMeta};

use super::{SavestateDraft, SavestateRecord, SavestateStore, StoreError, select_most_recent};

const STATE_EXT: &str = "state";
const THUMB_EXT: &str = "thumb";
const META_EXT: &str = "json";

/// Savestate store rooted at a directory
pub struct FileSavestateStore {
    dir: PathBuf,
    seq: AtomicU32,
}

impl FileSavestateStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seq: AtomicU32::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &SavestateKey, ext: &str) -> Result<PathBuf, StoreError> {
        if !key.is_safe() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, ext)))
    }

    fn read_meta(&self, key: &SavestateKey) -> Result<SavestateMeta, StoreError> {
        let path = self.path_for(key, META_EXT)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let meta: SavestateMeta = serde_json::from_slice(&bytes)?;
        if &meta.key != key {
            return Err(StoreError::Corrupt {
                key: key.clone(),
                reason: format!("metadata names key {}", meta.key),
            });
        }
        Ok(meta)
    }

    fn next_key(&self, draft: &SavestateDraft) -> Result<SavestateKey, StoreError> {
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let key = SavestateKey::generate(
                draft.resource.as_ref(),
                &draft.core_id,
                draft.created.timestamp_millis(),
                seq,
            );
            if !self.path_for(&key, META_EXT)?.exists() {
                return Ok(key);
            }
        }
    }
}

/// Write `bytes` to `path` atomically (temp file, fsync, rename)
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = match path.file_name() {
        Some(name) => {
            let mut tmp_name = OsString::from(name);
            tmp_name.push(".tmp");
            path.with_file_name(tmp_name)
        }
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "savestate path has no file name",
            ));
        }
    };

    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }

    #[cfg(windows)]
    {
        if path.exists() {
            // Windows rename fails if destination exists.
            fs::remove_file(path)?;
        }
    }

    fs::rename(&tmp_path, path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Blob, thumbnail, then the metadata that commits the record
fn write_record(
    state_path: &Path,
    thumb_path: &Path,
    meta_path: &Path,
    draft: &SavestateDraft,
    meta: &SavestateMeta,
) -> Result<(), StoreError> {
    write_atomic(state_path, &draft.data)?;
    if let Some(thumbnail) = &draft.thumbnail {
        write_atomic(thumb_path, thumbnail)?;
    }
    let json = serde_json::to_vec_pretty(meta)?;
    write_atomic(meta_path, &json)?;
    Ok(())
}

impl SavestateStore for FileSavestateStore {
    fn put(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        let key = self.next_key(&draft)?;
        let meta = draft.to_meta(key.clone());
        let state_path = self.path_for(&key, STATE_EXT)?;
        let thumb_path = self.path_for(&key, THUMB_EXT)?;

        if let Err(e) = write_record(&state_path, &thumb_path, &self.path_for(&key, META_EXT)?, &draft, &meta) {
            // Uncommitted files are invisible but would otherwise never be removed
            for path in [&state_path, &thumb_path] {
                if let Err(cleanup) = remove_if_exists(path) {
                    tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial savestate file");
                }
            }
            return Err(e);
        }

        tracing::debug!(%key, size = meta.size, core = %meta.core_id, "Wrote savestate");
        Ok(key)
    }

    fn get(&self, key: &SavestateKey) -> Result<SavestateRecord, StoreError> {
        let meta = self.read_meta(key)?;

        let data = match fs::read(self.path_for(key, STATE_EXT)?) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Corrupt {
                    key: key.clone(),
                    reason: "state blob is missing".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.verify(&data) {
            return Err(StoreError::Corrupt {
                key: key.clone(),
                reason: format!(
                    "blob is {} bytes with a mismatched checksum (expected {} bytes)",
                    data.len(),
                    meta.size
                ),
            });
        }

        let thumbnail = if meta.has_thumbnail {
            match fs::read(self.path_for(key, THUMB_EXT)?) {
                Ok(thumb) => Some(thumb),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "Savestate thumbnail unreadable");
                    None
                }
            }
        } else {
            None
        };

        Ok(SavestateRecord {
            meta,
            thumbnail,
            data,
        })
    }

    fn meta(&self, key: &SavestateKey) -> Result<SavestateMeta, StoreError> {
        self.read_meta(key)
    }

    fn list_for(
        &self,
        resource: Option<&ResourceRef>,
        core: Option<&CoreId>,
    ) -> Result<Vec<SavestateMeta>, StoreError> {
        let mut metas = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice::<SavestateMeta>(&bytes).map_err(StoreError::from));
            match parsed {
                Ok(meta) => metas.push(meta),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable savestate metadata");
                }
            }
        }
        Ok(select_most_recent(metas.into_iter(), resource, core))
    }

    fn retire(&self, key: &SavestateKey) -> Result<(), StoreError> {
        // Metadata first: once it is gone the record is no longer visible.
        remove_if_exists(&self.path_for(key, META_EXT)?)?;
        remove_if_exists(&self.path_for(key, THUMB_EXT)?)?;
        remove_if_exists(&self.path_for(key, STATE_EXT)?)?;
        tracing::debug!(%key, "Retired savestate");
        Ok(())
    }
}
