//! Configuration management (~/.config/RetroPlay/config.toml)
//!
//! Handles loading, saving, and providing defaults for player settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Player configuration.
///
/// Contains all user-configurable settings organized into sections.
/// Serialized to/from TOML format for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerConfig {
    /// Savestate and autosave settings
    #[serde(default)]
    pub savestates: SavestateConfig,
    /// Rewind history settings
    #[serde(default)]
    pub rewind: RewindConfig,
    /// Audio/video stream buffering
    #[serde(default)]
    pub streams: StreamConfig,
    /// Frame timing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Achievement/rich-presence service
    #[serde(default)]
    pub achievements: AchievementsConfig,
}

/// Savestate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavestateConfig {
    /// Save on close and periodically while playing (default: true)
    #[serde(default = "default_true")]
    pub autosave: bool,
    /// Seconds between periodic autosaves, 0 disables them (default: 10)
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    /// Override for the savestate directory (default: `<data_dir>/savestates`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// Rewind history configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewindConfig {
    /// Use reversible playback for cores that support it (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds of history to keep (default: 60)
    #[serde(default = "default_max_history_secs")]
    pub max_history_secs: u32,
    /// Memory budget for the history in MiB (default: 64)
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// Frames between two captured snapshots (default: 1)
    #[serde(default = "default_capture_interval")]
    pub capture_interval_frames: u32,
}

/// Stream buffering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Audio buffered ahead of the backend in milliseconds (default: 100)
    #[serde(default = "default_audio_buffer_ms")]
    pub audio_buffer_ms: u32,
    /// Output sample rate (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

/// Frame timing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Maximum wall time credited to a single tick (default: 100)
    #[serde(default = "default_max_delta_ms")]
    pub max_delta_ms: u64,
}

/// Achievement service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AchievementsConfig {
    /// Enable rich presence and achievements (default: false)
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}
fn default_autosave_interval() -> u64 {
    10
}
fn default_max_history_secs() -> u32 {
    60
}
fn default_max_memory_mb() -> usize {
    64
}
fn default_capture_interval() -> u32 {
    1
}
fn default_audio_buffer_ms() -> u32 {
    100
}
fn default_sample_rate() -> u32 {
    48_000
}
fn default_max_delta_ms() -> u64 {
    100
}

impl Default for SavestateConfig {
    fn default() -> Self {
        Self {
            autosave: default_true(),
            autosave_interval_secs: default_autosave_interval(),
            directory: None,
        }
    }
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_history_secs: default_max_history_secs(),
            max_memory_mb: default_max_memory_mb(),
            capture_interval_frames: default_capture_interval(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            audio_buffer_ms: default_audio_buffer_ms(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            max_delta_ms: default_max_delta_ms(),
        }
    }
}

impl SavestateConfig {
    /// Interval of the periodic autosave, `None` when disabled
    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave && self.autosave_interval_secs > 0)
            .then(|| Duration::from_secs(self.autosave_interval_secs))
    }

    /// Directory savestates are written to
    pub fn resolve_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("savestates")))
    }
}

impl RewindConfig {
    /// Number of snapshots the rewind ring may hold for a core.
    ///
    /// Bounded by both the history length and the memory budget; never 0.
    pub fn ring_capacity(&self, frame_rate: f64, serialize_size: usize) -> usize {
        let interval = self.capture_interval_frames.max(1) as f64;
        let by_time = (self.max_history_secs as f64 * frame_rate / interval).round() as usize;
        let by_memory = self
            .max_memory_mb
            .saturating_mul(1024 * 1024)
            .checked_div(serialize_size)
            .unwrap_or(usize::MAX);
        by_time.min(by_memory).max(1)
    }
}

impl TimingConfig {
    pub fn max_delta(&self) -> Duration {
        Duration::from_millis(self.max_delta_ms)
    }
}

/// Error loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\RetroPlay\config`
/// On macOS: `~/Library/Application Support/io.retroplay.RetroPlay`
/// On Linux: `~/.config/RetroPlay`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.retroplay", "", "RetroPlay")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory (savestates live here).
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.retroplay", "", "RetroPlay")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> PlayerConfig {
    let Some(path) = config_dir().map(|dir| dir.join("config.toml")) else {
        return PlayerConfig::default();
    };
    match load_from(&path) {
        Ok(config) => config,
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            PlayerConfig::default()
        }
        Err(e) => {
            tracing::warn!("Using default config: {}", e);
            PlayerConfig::default()
        }
    }
}

/// Loads the configuration from an explicit path, surfacing errors.
pub fn load_from(path: &Path) -> Result<PlayerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to disk.
///
/// Writes `config.toml` to the platform's configuration directory.
/// Creates the directory if it doesn't exist.
pub fn save(config: &PlayerConfig) -> Result<(), ConfigError> {
    match config_dir() {
        Some(dir) => save_to(config, &dir.join("config.toml")),
        None => Ok(()),
    }
}

/// Saves the configuration to an explicit path.
pub fn save_to(config: &PlayerConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(io_err)
}
