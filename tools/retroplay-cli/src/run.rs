//! Run command - open a session on the demo cores and play it headless
//!
//! Simulates a host loop: wall time is fed to the controller in 1/60 s
//! ticks, the audio ring is drained as a backend would, and session events
//! are printed once the session closes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use ringbuf::traits::Consumer;
use retroplay_core::{
    AchievementService, OpenOptions, PlayerConfig, SessionController, SessionDeps, SessionEvent,
};
use retroplay_shared::{CoreId, ResourceRef, SavestateKey};
use tracing::{info, warn};

use crate::demo::{
    CliSelector, DemoCores, LogMetrics, LoggingAchievements, TerminalConfirmation, VirtualJoysticks,
};
use crate::open_store;

const TICK: Duration = Duration::from_micros(16_667);

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Resource to play (omit for a standalone session)
    #[arg(short, long)]
    pub resource: Option<String>,

    /// Core to use instead of asking (demo.rewind or demo.realtime)
    #[arg(long)]
    pub core: Option<String>,

    /// Savestate key to load after opening
    #[arg(long, conflicts_with = "resume")]
    pub load: Option<String>,

    /// Resume the most recent savestate of the resource
    #[arg(long)]
    pub resume: bool,

    /// Number of 1/60 s host ticks to simulate
    #[arg(short, long, default_value = "300")]
    pub ticks: u32,

    /// Playback speed (0 = paused)
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    /// Seek to this position after playing
    #[arg(long)]
    pub seek_ms: Option<u64>,

    /// Seek relative to the current position after playing
    #[arg(long, allow_hyphen_values = true)]
    pub seek_by: Option<i64>,

    /// Write a manual savestate before closing
    #[arg(long)]
    pub snapshot: bool,

    /// Virtual joysticks to connect
    #[arg(long, default_value = "1")]
    pub players: usize,

    /// Disable reversible playback
    #[arg(long)]
    pub no_rewind: bool,

    /// Mute audio for the whole run
    #[arg(long)]
    pub mute: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the run command
pub fn execute(args: RunArgs, mut config: PlayerConfig) -> Result<()> {
    if args.no_rewind {
        config.rewind.enabled = false;
    }
    let store = Arc::new(open_store(&config)?);
    let achievements = config
        .achievements
        .enabled
        .then(|| Box::new(LoggingAchievements) as Box<dyn AchievementService>);

    let controller = SessionController::new(
        config,
        SessionDeps {
            cores: Arc::new(DemoCores),
            store,
            devices: Arc::new(VirtualJoysticks::new(args.players)),
            selector: Arc::new(CliSelector { resume: args.resume }),
            confirmation: Arc::new(TerminalConfirmation { assume_yes: args.yes }),
            metrics: Arc::new(LogMetrics),
            achievements,
        },
    );
    let mut events = controller.subscribe();
    controller.set_mute(args.mute);

    let options = OpenOptions {
        core: args.core.map(CoreId::new),
        savestate: args.load.map(SavestateKey::new),
    };
    match controller.open(args.resource.map(ResourceRef::new), options) {
        Err(e) if e.is_quiet() => {
            info!("Cancelled: {}", e);
            return Ok(());
        }
        result => result.context("Failed to open session")?,
    }

    let mut audio = controller.take_audio_consumer();
    if args.speed != 1.0 {
        controller.set_speed(args.speed).context("Failed to set speed")?;
    }

    let mut frames = 0u64;
    let mut played_samples = 0usize;
    for _ in 0..args.ticks {
        frames += controller.advance_by(TICK) as u64;
        if let Some(audio) = audio.as_mut() {
            played_samples += audio.clear();
        }
    }

    if let Some(target) = args.seek_ms {
        if controller.can_seek() {
            controller.seek_time(target);
        } else {
            warn!("Playback cannot seek; ignoring --seek-ms");
        }
    }
    if let Some(delta) = args.seek_by
        && !controller.seek_relative(delta)
    {
        warn!("Playback cannot seek; ignoring --seek-by");
    }

    if args.snapshot {
        match controller.create_snapshot(false).context("Failed to write savestate")? {
            Some(key) => println!("Saved {}", key),
            None => warn!("This session does not support savestates"),
        }
    }

    println!("core:      {}", controller.core_id().map(|id| id.to_string()).unwrap_or_default());
    println!("state:     {}", controller.state());
    println!("frames:    {}", frames);
    println!(
        "position:  {} / {} ms (history {} ms, {:.1}%)",
        controller.time_ms(),
        controller.total_time_ms(),
        controller.cache_time_ms(),
        controller.cache_percentage()
    );
    println!(
        "audio:     {} samples played, {} dropped{}",
        played_samples,
        controller.dropped_audio_samples(),
        if controller.is_muted() { " (muted)" } else { "" }
    );
    for (device, port) in controller.port_assignments() {
        println!("port:      {} <- {}", port, device);
    }

    controller.close();

    while let Ok(event) = events.try_recv() {
        println!("event:     {}", describe(&event));
    }
    Ok(())
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::PlaybackStarted { core, resource, rewind } => format!(
            "started {} on {}{}",
            resource.as_ref().map(ResourceRef::as_str).unwrap_or("<standalone>"),
            core,
            if *rewind { " (rewind)" } else { "" }
        ),
        SessionEvent::Paused => "paused".to_string(),
        SessionEvent::Resumed => "resumed".to_string(),
        SessionEvent::SpeedChanged { speed } => format!("speed {}", speed),
        SessionEvent::Ended => "ended".to_string(),
    }
}
