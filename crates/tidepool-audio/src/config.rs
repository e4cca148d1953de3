//! Mixer configuration.
//!
//! Every timing value is expressed in frame ticks, because the mixer only
//! advances when [`AudioMixer::update`](crate::AudioMixer::update) is called.
//! The configuration can be loaded from a TOML file or embedded as a table in
//! a larger config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Mixer timing and envelope parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    // === Sound Effects ===
    /// Replay cooldown in frames. Stored for callers that read it back; the
    /// registry does not enforce it.
    pub cooldown_frames: u32,
    /// Frames a non-looping instance stays registered.
    pub time_limit_frames: u32,
    /// New instances allowed per frame.
    pub frame_limit: u32,

    // === Music ===
    /// Instantaneous multiplier applied by a sidechain hit.
    pub sidechain_factor: f32,
    /// Frames the sidechain ramp takes to recover.
    pub sidechain_frames: u32,
    /// Total frames of a crossfade transition.
    pub crossfade_frames: u32,
    /// Share of the crossfade budget each side spends fading.
    pub crossfade_fade_fraction: f32,
    /// Multiplier applied while music is ducked.
    pub duck_factor: f32,
    /// Whether the music buffer loops.
    pub music_looping: bool,

    // === Foley ===
    /// Oscillation center, as a fraction of sound volume.
    pub foley_center: f32,
    /// Oscillation amplitude, as a fraction of sound volume.
    pub foley_amplitude: f32,
    /// Frames per oscillation period.
    pub foley_period_frames: u32,
    /// Frames a foley fade-out takes.
    pub foley_fade_frames: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 10,
            time_limit_frames: 120,
            frame_limit: 2,

            sidechain_factor: 0.5,
            sidechain_frames: 120,
            crossfade_frames: 90,
            crossfade_fade_fraction: 2.0 / 3.0,
            duck_factor: 0.6,
            music_looping: true,

            foley_center: 0.25,
            foley_amplitude: 0.15,
            foley_period_frames: 600,
            foley_fade_frames: 120,
        }
    }
}

impl MixerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Load configuration from a file.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Mixer config not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded mixer config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse mixer config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read mixer config: {e}");
                Self::default()
            },
        }
    }

    /// Clamp values to ranges the envelopes can work with.
    pub fn validate(&mut self) {
        self.time_limit_frames = self.time_limit_frames.max(1);

        self.sidechain_factor = self.sidechain_factor.clamp(0.0, 1.0);
        self.sidechain_frames = self.sidechain_frames.max(1);
        self.crossfade_frames = self.crossfade_frames.max(2);
        self.crossfade_fade_fraction = self.crossfade_fade_fraction.clamp(0.1, 1.0);
        self.duck_factor = self.duck_factor.clamp(0.0, 1.0);

        self.foley_center = self.foley_center.clamp(0.0, 1.0);
        self.foley_amplitude = self.foley_amplitude.clamp(0.0, 1.0);
        self.foley_period_frames = self.foley_period_frames.max(1);
        self.foley_fade_frames = self.foley_fade_frames.max(1);
    }

    /// Frames each side of a crossfade spends fading.
    #[must_use]
    pub fn crossfade_fade_frames(&self) -> u32 {
        let frames = (self.crossfade_frames as f32 * self.crossfade_fade_fraction).round() as u32;
        frames.clamp(1, self.crossfade_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MixerConfig::default();
        assert_eq!(config.time_limit_frames, 120);
        assert_eq!(config.frame_limit, 2);
        assert_eq!(config.sidechain_frames, 120);
        assert_eq!(config.crossfade_frames, 90);
        assert_eq!(config.crossfade_fade_frames(), 60);
        assert!((config.duck_factor - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MixerConfig::from_toml_str("frame_limit = 4\nduck_factor = 0.3\n")
            .expect("valid toml");
        assert_eq!(config.frame_limit, 4);
        assert!((config.duck_factor - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.time_limit_frames, 120);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = MixerConfig {
            sidechain_factor: 3.0,
            sidechain_frames: 0,
            crossfade_frames: 0,
            foley_period_frames: 0,
            ..MixerConfig::default()
        };
        config.validate();

        assert!((config.sidechain_factor - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.sidechain_frames, 1);
        assert_eq!(config.crossfade_frames, 2);
        assert_eq!(config.foley_period_frames, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let config = MixerConfig::load_from("/nonexistent/path/mixer.toml");
        assert_eq!(config, MixerConfig::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "frame_limit = \"lots\"").expect("write");

        let config = MixerConfig::load_from(file.path());
        assert_eq!(config, MixerConfig::default());
    }
}
