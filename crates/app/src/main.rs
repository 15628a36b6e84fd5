use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use soundpool_core::{
    linear_to_db, AppConfig, BgmState, Channel, CueScript, PlaybackClock, Scheduler, SoundError,
    SoundManager,
};
use tracing_subscriber::EnvFilter;

fn main() -> soundpool_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            script,
            config,
            dt,
            duration,
        } => run_simulate(&script, config.as_deref(), dt, duration),
        Commands::Db { value, config } => run_db(value, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> soundpool_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn run_simulate(
    script_path: &Path,
    config_path: Option<&Path>,
    dt: f32,
    duration: Option<f32>,
) -> soundpool_core::Result<()> {
    if !(dt > 0.0) {
        return Err(SoundError::msg(format!("tick length must be positive, got {dt}")));
    }

    let config = load_config(config_path)?;
    let script = CueScript::load(script_path)?;
    let library = script.library();
    script.validate(&library)?;

    let duration = duration
        .unwrap_or_else(|| script.end_time() + 2.0 * config.fade.volume_fade_time + 1.0);
    tracing::info!(script = ?script_path, cues = script.cues.len(), duration, dt, "running simulation");

    let mut manager = SoundManager::headless(&config);
    let prewarmed = manager.prewarm();
    tracing::debug!(prewarmed, "pool ready");

    let mut scheduler = Scheduler::new();
    scheduler.set_cues(script.cues.clone());
    let mut clock = PlaybackClock::default();

    loop {
        for cue in scheduler.due(&clock) {
            if let Err(err) = cue.apply(&mut manager, &library) {
                tracing::warn!(time = cue.time, action = ?cue.action, error = %err, "cue failed");
            }
        }
        if clock.time_seconds >= duration {
            break;
        }

        match manager.tick(dt) {
            Ok(report) => {
                for released in &report.released {
                    tracing::debug!(
                        time = clock.time_seconds,
                        emitter = %released.id,
                        clip = ?released.clip.as_ref().map(|clip| clip.id.as_str()),
                        "emitter returned to pool"
                    );
                }
                for reclaimed in &report.reclaimed {
                    tracing::debug!(
                        time = clock.time_seconds,
                        emitter = %reclaimed.id,
                        clip = ?reclaimed.clip.as_ref().map(|clip| clip.id.as_str()),
                        "effect cut short by reclaim"
                    );
                }
            }
            Err(SoundError::FadeInterrupted { source, released }) => {
                tracing::warn!(
                    time = clock.time_seconds,
                    error = %source,
                    finished = released.len(),
                    "music fade interrupted"
                );
            }
            Err(err) => tracing::warn!(time = clock.time_seconds, error = %err, "tick failed"),
        }
        clock.advance(dt);
    }

    let summary = Summary::capture(&manager, &clock);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_db(value: f32, config_path: Option<&Path>) -> soundpool_core::Result<()> {
    let config = load_config(config_path)?;
    let db = linear_to_db(value, config.mixer.min_db, config.mixer.max_db);
    println!("{db:.2} dB");
    Ok(())
}

/// Final state printed after a simulation run.
#[derive(Debug, Serialize)]
struct Summary {
    time: f32,
    bgm_state: BgmState,
    bgm_clip: Option<String>,
    bgm_volume: Option<f32>,
    active_emitters: usize,
    idle_emitters: usize,
    master_volume: f32,
    bgm_channel_volume: f32,
    se_channel_volume: f32,
}

impl Summary {
    fn capture<F, B>(manager: &SoundManager<F, B>, clock: &PlaybackClock) -> Self
    where
        F: soundpool_core::EmitterFactory,
        B: soundpool_core::MixerBackend,
    {
        let bgm = manager.bgm_emitter();
        Self {
            time: clock.time_seconds,
            bgm_state: manager.bgm_state(),
            bgm_clip: bgm
                .and_then(|emitter| emitter.clip())
                .map(|clip| clip.id.to_string()),
            bgm_volume: bgm.map(|emitter| emitter.volume()),
            active_emitters: manager.pool().count_active(),
            idle_emitters: manager.pool().count_idle(),
            master_volume: manager.mixer().volume(Channel::Master),
            bgm_channel_volume: manager.mixer().volume(Channel::Bgm),
            se_channel_volume: manager.mixer().volume(Channel::Se),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pooled sound manager simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a cue script through a headless sound manager and print the final state.
    Simulate {
        /// JSON cue script declaring clips and timed playback requests.
        script: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seconds per update tick.
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
        /// Seconds to simulate. Defaults to the last cue plus time for a full fade.
        #[arg(long)]
        duration: Option<f32>,
    },
    /// Print the mixer attenuation a linear volume maps to.
    Db {
        /// Linear volume, clamped to [0, 1].
        value: f32,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
