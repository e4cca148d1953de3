//! Ambient foley layer.
//!
//! At most one looping source is resident. While playing, its volume swings
//! sinusoidally around a center; a fade-out replaces the swing with a linear
//! ramp to silence, after which the source is dropped.

use std::f32::consts::TAU;

use tracing::{debug, info, warn};

use crate::config::MixerConfig;
use crate::envelope::LinearRamp;
use crate::service::{AssetStore, StreamBuffer};
use crate::volume::VolumeSettings;

/// Oscillation and fade parameters taken from [`MixerConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoleySettings {
    /// Oscillation center, as a fraction of sound volume.
    pub center: f32,
    /// Oscillation amplitude, as a fraction of sound volume.
    pub amplitude: f32,
    /// Frames per oscillation period.
    pub period_frames: u32,
    /// Frames a fade-out takes.
    pub fade_frames: u32,
}

impl From<&MixerConfig> for FoleySettings {
    fn from(config: &MixerConfig) -> Self {
        Self {
            center: config.foley_center,
            amplitude: config.foley_amplitude,
            period_frames: config.foley_period_frames,
            fade_frames: config.foley_fade_frames,
        }
    }
}

/// The foley channel.
#[derive(Debug)]
pub struct FoleyEngine<S: StreamBuffer> {
    buffer: S,
    playing: bool,
    volume: f32,
    /// `sound × master` as of the last volume push.
    level: f32,
    phase: u32,
    fade: Option<LinearRamp>,
    settings: FoleySettings,
}

impl<S: StreamBuffer> FoleyEngine<S> {
    /// Create an idle foley channel.
    #[must_use]
    pub fn new(buffer: S, settings: FoleySettings) -> Self {
        Self {
            buffer,
            playing: false,
            volume: 0.0,
            level: 0.0,
            phase: 0,
            fade: None,
            settings,
        }
    }

    /// Replace the oscillation parameters.
    pub fn set_settings(&mut self, settings: FoleySettings) {
        self.settings = settings;
        self.phase %= settings.period_frames.max(1);
    }

    /// The foley buffer.
    #[must_use]
    pub fn buffer(&self) -> &S {
        &self.buffer
    }

    /// Whether foley is playing (including while fading out).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether a fade-out is running.
    #[must_use]
    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Envelope volume before the mute switch and clamp.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Oscillation phase in frames.
    #[must_use]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    fn apply(&mut self, volumes: &VolumeSettings) {
        self.level = volumes.effective_sound();
        self.buffer.set_volume(volumes.emit(self.volume));
    }

    /// Replace the current foley with `path` and start it at the
    /// oscillation center.
    pub fn play<A>(&mut self, path: &str, assets: &mut A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        if !assets.is_loaded(path) {
            if let Err(e) = assets.finish_loading(path) {
                warn!("Foley '{}' unavailable: {}", path, e);
                return;
            }
        }
        let Some(track) = assets.get(path) else {
            warn!("Foley '{}' is not loaded", path);
            return;
        };

        self.buffer.stop();
        self.buffer.clear_sources();
        self.buffer.add_source(track);
        self.buffer.jump_to_source(0);
        self.buffer.set_looping(true);
        self.buffer.set_loop_behavior(false);

        self.volume = volumes.sound * self.settings.center * volumes.master;
        self.phase = 0;
        self.fade = None;
        self.apply(volumes);
        self.buffer.play();
        self.playing = true;
        info!("Playing foley '{}'", path);
    }

    /// Fade the current foley to silence, then stop it.
    pub fn fade_out(&mut self) {
        if !self.playing || self.fade.is_some() {
            return;
        }
        self.fade = Some(LinearRamp::new(self.volume, 0.0, self.settings.fade_frames));
        self.phase = 0;
        debug!("Foley fading out");
    }

    /// Stop and drop the current foley immediately.
    pub fn stop(&mut self) {
        self.buffer.stop();
        self.buffer.clear_sources();
        self.playing = false;
        self.fade = None;
        self.phase = 0;
        self.volume = 0.0;
    }

    /// Re-derive the volume after a master/sound/mute change. A running
    /// fade is scaled by the change in `sound × master` and keeps its length.
    pub fn refresh(&mut self, volumes: &VolumeSettings) {
        if !self.playing {
            return;
        }
        if let Some(ramp) = self.fade.as_mut() {
            let level = volumes.effective_sound();
            if self.level > 0.0 {
                self.volume *= level / self.level;
            }
            ramp.retarget(self.volume, 0.0);
        } else {
            self.volume = self.oscillation(volumes);
        }
        self.apply(volumes);
    }

    fn oscillation(&self, volumes: &VolumeSettings) -> f32 {
        let period = self.settings.period_frames.max(1);
        let angle = TAU * self.phase as f32 / period as f32;
        let swing = self.settings.center + self.settings.amplitude * angle.sin();
        (volumes.sound * swing * volumes.master)
            .min(volumes.effective_sound())
            .max(0.0)
    }

    /// Advance the oscillation or fade by one frame.
    pub fn update(&mut self, volumes: &VolumeSettings) {
        if !self.playing {
            return;
        }
        self.buffer.update();

        if let Some(ramp) = self.fade.as_mut() {
            let (volume, done) = ramp.advance(self.volume, 0.0);
            self.volume = volume;
            if done {
                self.stop();
                debug!("Foley faded out");
                return;
            }
        } else {
            self.phase = (self.phase + 1) % self.settings.period_frames.max(1);
            self.volume = self.oscillation(volumes);
        }
        self.apply(volumes);
    }
}
