//! # Tidepool Audition
//!
//! Plays the audition script from the engine config on the default output
//! device. Pass a config path as the first argument, or the per-user config
//! file is used.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use tidepool_engine::backend::load_sounds;
use tidepool_engine::{open_mixer, AuditionSession, EngineConfig, FrameClock};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tidepool=info".parse()?))
        .init();

    info!("Tidepool audition starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    let (device, mixer) = open_mixer(&config).context("Failed to open audio output")?;
    let mut session = AuditionSession::new(mixer, &config.audition);
    for (name, sound) in load_sounds(&device, &config, &config.audition) {
        session.register_sound(&name, sound);
    }

    let mut clock = FrameClock::new(config.target_fps);
    session.run(|| clock.wait());

    info!(
        "Tidepool audition complete ({} late frames)",
        clock.overruns()
    );
    Ok(())
}
