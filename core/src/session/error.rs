//! Session errors

use retroplay_shared::CoreId;

/// Error opening or operating a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The user backed out of a selection; not a failure
    #[error("selection cancelled")]
    SelectionCancelled,
    #[error("no emulation core can run this resource")]
    NoCoreSelected,
    #[error("emulation core {0} is not available")]
    CoreUnavailable(CoreId),
    #[error("emulation core {0} failed to initialize")]
    CoreInitFailed(CoreId),
    #[error("failed to open: {0}")]
    OpenFailed(String),
    /// The user declined loading a savestate made by another core
    #[error("incompatible savestate was not confirmed")]
    IncompatibleSaveDeclined,
}

impl SessionError {
    /// User aborts that callers should treat as a no-op
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::SelectionCancelled | Self::IncompatibleSaveDeclined)
    }
}
