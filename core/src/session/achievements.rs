//! Achievement worker thread
//!
//! The achievement service talks to the network, so it never runs on the
//! caller's thread. The session controller queues commands over a bounded
//! channel and a dedicated worker drains them in order.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use retroplay_shared::{CoreId, ResourceRef};
use tracing::{debug, warn};

use super::collaborators::AchievementService;

/// Commands queued beyond this are dropped
const QUEUE_DEPTH: usize = 32;

/// Work item for the achievement worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AchievementCommand {
    Start { core: CoreId, resource: ResourceRef },
    Reset,
    Stop,
}

/// Handle to the achievement worker thread.
///
/// Dropping the handle closes the channel and joins the worker after it has
/// drained every queued command.
pub struct AchievementDispatcher {
    /// Option so it can be dropped before joining
    tx: Option<SyncSender<AchievementCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl AchievementDispatcher {
    /// Spawn the worker that owns `service`
    pub fn spawn(service: Box<dyn AchievementService>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<AchievementCommand>(QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name("achievements".into())
            .spawn(move || run(service, rx))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a command without blocking; returns whether it was accepted
    pub fn send(&self, command: AchievementCommand) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                warn!(?command, "Achievement queue full, dropping command");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Achievement worker disconnected");
                false
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for AchievementDispatcher {
    fn drop(&mut self) {
        // Closing the channel first lets the worker's recv() return.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(mut service: Box<dyn AchievementService>, rx: Receiver<AchievementCommand>) {
    debug!("Achievement worker started");
    while let Ok(command) = rx.recv() {
        match command {
            AchievementCommand::Start { core, resource } => service.start(&core, &resource),
            AchievementCommand::Reset => service.reset(),
            AchievementCommand::Stop => service.stop(),
        }
    }
    debug!("Achievement worker finished");
}
