//! RetroPlay CLI - drive playback sessions and manage savestates
//!
//! # Commands
//!
//! - `retroplay run` - Play a resource on the built-in demo cores
//! - `retroplay saves list` - List stored savestates
//! - `retroplay saves show` - Print the metadata of one savestate
//! - `retroplay saves delete` - Retire a savestate
//!
//! # Usage
//!
//! ```bash
//! # Play 600 frames, rewind to 2.5s and take a manual snapshot
//! retroplay run --resource demo.rom --frames 600 --seek-ms 2500 --snapshot
//!
//! # Inspect what was written
//! retroplay saves list --resource demo.rom
//! ```
//!
//! Logging follows `RUST_LOG` (default `info`).

mod demo;
mod run;
mod saves;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retroplay_core::{FileSavestateStore, PlayerConfig, config};

/// RetroPlay CLI - playback sessions and savestates
#[derive(Parser)]
#[command(name = "retroplay")]
#[command(about = "Playback session controller for emulated programs")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Savestate directory (overrides the config)
    #[arg(long, global = true)]
    saves_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a resource (or a standalone program) for a number of frames
    Run(run::RunArgs),

    /// Manage stored savestates
    #[command(subcommand)]
    Saves(saves::SavesCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load(),
    };
    if let Some(dir) = cli.saves_dir {
        config.savestates.directory = Some(dir);
    }

    match cli.command {
        Commands::Run(args) => run::execute(args, config),
        Commands::Saves(command) => saves::execute(command, &config),
    }
}

/// Open the savestate store the config points at
pub(crate) fn open_store(config: &PlayerConfig) -> Result<FileSavestateStore> {
    let dir = config
        .savestates
        .resolve_directory()
        .context("No savestate directory: pass --saves-dir or set savestates.directory")?;
    FileSavestateStore::open(&dir)
        .with_context(|| format!("Failed to open savestate directory {}", dir.display()))
}
