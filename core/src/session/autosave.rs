//! Autosave writer thread
//!
//! Periodic autosaves are captured on the tick path while the session lock is
//! held, but the store write happens on a dedicated worker so disk latency
//! never stalls frame delivery. Writes that must complete before the caller
//! continues (closing, handing state to another player) go through the same
//! queue and wait for their result, so every write to the slot stays ordered.

use std::io;
use std::sync::mpsc::{self, Receiver, SendError, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use retroplay_shared::SavestateKey;
use tracing::{debug, info, warn};

use super::lock;
use crate::savestate::{SavestateDraft, SavestateStore, StoreError};

/// One write may be in flight; a periodic save arriving behind it is skipped
const QUEUE_DEPTH: usize = 1;

type Reply = Sender<Result<SavestateKey, StoreError>>;

struct Job {
    draft: SavestateDraft,
    reply: Option<Reply>,
}

/// Owns a session's autosave slot and the worker that writes it.
///
/// Each write replaces the record in the slot, or creates it if the slot is
/// empty. Dropping the writer joins the worker after queued writes finish.
pub(crate) struct AutosaveWriter {
    store: Arc<dyn SavestateStore>,
    slot: Arc<Mutex<Option<SavestateKey>>>,
    /// Option so it can be dropped before joining
    tx: Option<SyncSender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveWriter {
    /// Spawn the worker. If the thread cannot be started, writes run inline.
    pub fn spawn(store: Arc<dyn SavestateStore>) -> Self {
        let slot = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::sync_channel::<Job>(QUEUE_DEPTH);
        let worker = {
            let store = store.clone();
            let slot = slot.clone();
            thread::Builder::new()
                .name("autosave".into())
                .spawn(move || run(store, slot, rx))
        };

        match worker {
            Ok(handle) => Self {
                store,
                slot,
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(e) => {
                warn!(error = %e, "Failed to start autosave writer, writing inline");
                Self {
                    store,
                    slot,
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    /// Take over an existing record (a resumed autosave) as the slot
    pub fn adopt(&self, key: SavestateKey) {
        *lock(&self.slot) = Some(key);
    }

    /// Queue a write without waiting; returns whether it was accepted
    pub fn submit(&self, draft: SavestateDraft) -> bool {
        let Some(tx) = &self.tx else {
            return self.write_inline(draft).is_ok();
        };
        match tx.try_send(Job { draft, reply: None }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Autosave writer busy, skipping periodic autosave");
                false
            }
            Err(TrySendError::Disconnected(job)) => {
                warn!("Autosave writer disconnected, writing inline");
                self.write_inline(job.draft).is_ok()
            }
        }
    }

    /// Write behind any queued job and wait for the result
    pub fn write(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        let Some(tx) = &self.tx else {
            return write_slot(self.store.as_ref(), &self.slot, draft);
        };
        let (reply, result) = mpsc::channel();
        match tx.send(Job {
            draft,
            reply: Some(reply),
        }) {
            Ok(()) => result
                .recv()
                .unwrap_or_else(|_| Err(StoreError::Io(io::Error::other("autosave writer stopped")))),
            Err(SendError(job)) => {
                warn!("Autosave writer disconnected, writing inline");
                write_slot(self.store.as_ref(), &self.slot, job.draft)
            }
        }
    }

    fn write_inline(&self, draft: SavestateDraft) -> Result<SavestateKey, StoreError> {
        write_slot(self.store.as_ref(), &self.slot, draft)
            .inspect_err(|e| warn!(error = %e, "Autosave failed"))
    }
}

impl Drop for AutosaveWriter {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn write_slot(
    store: &dyn SavestateStore,
    slot: &Mutex<Option<SavestateKey>>,
    draft: SavestateDraft,
) -> Result<SavestateKey, StoreError> {
    let previous = lock(slot).clone();
    let key = match &previous {
        Some(old) => store.replace(old, draft)?,
        None => store.put(draft)?,
    };
    *lock(slot) = Some(key.clone());
    Ok(key)
}

fn run(store: Arc<dyn SavestateStore>, slot: Arc<Mutex<Option<SavestateKey>>>, rx: Receiver<Job>) {
    debug!("Autosave writer started");
    while let Ok(job) = rx.recv() {
        let result = write_slot(store.as_ref(), &slot, job.draft);
        match (&result, job.reply) {
            (_, Some(reply)) => {
                // The waiting caller logs the outcome
                let _ = reply.send(result);
            }
            (Ok(key), None) => info!(%key, "Periodic autosave written"),
            (Err(e), None) => warn!(error = %e, "Periodic autosave failed"),
        }
    }
    debug!("Autosave writer finished");
}
