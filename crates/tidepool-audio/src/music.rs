//! Music engine.
//!
//! Owns the primary streaming buffer and a transient crossfade buffer, and
//! drives four envelope behaviors onto one music volume:
//!
//! - plain playback at `music × master`
//! - sidechain: an instant cut followed by a linear recovery ramp
//! - crossfade: the old track fades out on the transient buffer while the
//!   new one fades in on the primary
//! - duck: a sustained multiplier, ignored while a crossfade runs
//!
//! Tracks are appended to the primary buffer once and remembered by path, so
//! requesting a resident track seeks to it instead of enqueuing it again.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::MixerConfig;
use crate::envelope::LinearRamp;
use crate::service::{AssetStore, StreamBuffer, TrackData};
use crate::volume::VolumeSettings;

/// Envelope parameters taken from [`MixerConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicSettings {
    /// Sidechain cut multiplier.
    pub sidechain_factor: f32,
    /// Sidechain recovery frames.
    pub sidechain_frames: u32,
    /// Total crossfade frames.
    pub crossfade_frames: u32,
    /// Frames each crossfade side spends fading.
    pub crossfade_fade_frames: u32,
    /// Duck multiplier.
    pub duck_factor: f32,
    /// Whether the music buffer loops.
    pub looping: bool,
}

impl From<&MixerConfig> for MusicSettings {
    fn from(config: &MixerConfig) -> Self {
        Self {
            sidechain_factor: config.sidechain_factor,
            sidechain_frames: config.sidechain_frames,
            crossfade_frames: config.crossfade_frames,
            crossfade_fade_frames: config.crossfade_fade_frames(),
            duck_factor: config.duck_factor,
            looping: config.music_looping,
        }
    }
}

/// Which envelopes are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MusicEnvelope {
    /// A sidechain ramp is recovering.
    pub sidechained: bool,
    /// A crossfade is running.
    pub crossfaded: bool,
    /// Duck was requested.
    pub ducked: bool,
}

/// An in-flight crossfade. Frame counts are fixed when it starts.
#[derive(Debug, Clone, Copy)]
struct Crossfade {
    total: u32,
    fade_frames: u32,
    remaining: u32,
    out_volume: f32,
    fade_out: LinearRamp,
    fade_in: LinearRamp,
}

/// Music playback with sidechain, crossfade and duck envelopes.
#[derive(Debug)]
pub struct MusicEngine<S: StreamBuffer> {
    buffer: S,
    crossfade_buffer: S,
    /// Buffer position of every resident track, by path.
    positions: HashMap<String, usize>,
    paths: Vec<String>,
    current: Option<usize>,
    playing: bool,
    /// Envelope volume of the primary buffer, master included.
    volume: f32,
    /// `music × master` as of the last volume push.
    level: f32,
    preloads: Vec<String>,
    duck: bool,
    sidechain: Option<LinearRamp>,
    crossfade: Option<Crossfade>,
    settings: MusicSettings,
}

impl<S: StreamBuffer> MusicEngine<S> {
    /// Create an engine over a primary and a crossfade buffer.
    #[must_use]
    pub fn new(buffer: S, crossfade_buffer: S, settings: MusicSettings) -> Self {
        Self {
            buffer,
            crossfade_buffer,
            positions: HashMap::new(),
            paths: Vec::new(),
            current: None,
            playing: false,
            volume: 0.0,
            level: 0.0,
            preloads: Vec::new(),
            duck: false,
            sidechain: None,
            crossfade: None,
            settings,
        }
    }

    /// Replace the envelope parameters. In-flight envelopes keep their steps.
    pub fn set_settings(&mut self, settings: MusicSettings) {
        self.settings = settings;
    }

    /// Envelope parameters.
    #[must_use]
    pub fn settings(&self) -> &MusicSettings {
        &self.settings
    }

    /// The primary buffer.
    #[must_use]
    pub fn buffer(&self) -> &S {
        &self.buffer
    }

    /// The transient crossfade buffer.
    #[must_use]
    pub fn crossfade_buffer(&self) -> &S {
        &self.crossfade_buffer
    }

    /// Index of the selected track in the primary buffer.
    #[must_use]
    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    /// Envelope volume of the primary buffer before the mute switch and clamp.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Envelope flags.
    #[must_use]
    pub fn envelope(&self) -> MusicEnvelope {
        MusicEnvelope {
            sidechained: self.sidechain.is_some(),
            crossfaded: self.crossfade.is_some(),
            ducked: self.duck,
        }
    }

    /// Whether music is playing (including mid-crossfade).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Path of the playing track.
    #[must_use]
    pub fn current_track(&self) -> Option<&str> {
        if !self.playing {
            return None;
        }
        self.current
            .and_then(|i| self.paths.get(i))
            .map(String::as_str)
    }

    /// Volume music settles at when no transient envelope runs.
    fn target(&self, volumes: &VolumeSettings) -> f32 {
        let base = volumes.effective_music();
        if self.duck && self.crossfade.is_none() {
            base * self.settings.duck_factor
        } else {
            base
        }
    }

    fn apply(&mut self, volumes: &VolumeSettings) {
        self.level = volumes.effective_music();
        self.buffer.set_volume(volumes.emit(self.volume));
    }

    fn ensure_loaded<A>(path: &str, assets: &mut A) -> bool
    where
        A: AssetStore<Track = S::Track>,
    {
        if assets.is_loaded(path) {
            return true;
        }
        match assets.finish_loading(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Music '{}' unavailable: {}", path, e);
                false
            },
        }
    }

    /// Buffer index of `path`, appending the track if it is not resident.
    fn select<A>(&mut self, path: &str, assets: &A) -> Option<usize>
    where
        A: AssetStore<Track = S::Track>,
    {
        if let Some(&index) = self.positions.get(path) {
            return Some(index);
        }

        let track = assets.get(path)?;
        self.buffer.add_source(track);
        let index = self.buffer.source_count() - 1;
        self.positions.insert(path.to_string(), index);
        self.paths.push(path.to_string());
        debug!("Queued music '{}' at position {}", path, index);
        Some(index)
    }

    fn cancel_crossfade(&mut self) {
        if self.crossfade.take().is_some() {
            self.crossfade_buffer.stop();
            self.crossfade_buffer.clear_sources();
        }
    }

    /// Start the selected track on the primary buffer.
    fn start(&mut self, volumes: &VolumeSettings) {
        let target = self.target(volumes);
        match self.sidechain.as_mut() {
            Some(ramp) => ramp.retarget(self.volume, target),
            None => self.volume = target,
        }

        self.buffer.set_looping(self.settings.looping);
        self.buffer.set_loop_behavior(false);
        self.apply(volumes);
        self.buffer.play();
        self.playing = true;
    }

    fn hard_stop(&mut self) {
        self.buffer.stop();
        self.playing = false;
        self.sidechain = None;
    }

    /// Load `path` synchronously if needed and play it from the start.
    pub fn play_music<A>(&mut self, path: &str, assets: &mut A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        if Self::ensure_loaded(path, assets) {
            self.play_loaded_music(path, assets, volumes);
        }
    }

    /// Play a track that is already loaded.
    ///
    /// Re-requesting the track that is already playing changes nothing.
    pub fn play_loaded_music<A>(&mut self, path: &str, assets: &A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        let Some(index) = self.select(path, assets) else {
            warn!("Music '{}' is not loaded", path);
            return;
        };
        if self.playing && self.current == Some(index) {
            debug!("Music '{}' already playing", path);
            return;
        }

        self.cancel_crossfade();
        self.buffer.jump_to_source(index);
        self.current = Some(index);
        self.start(volumes);
        info!("Playing music '{}'", path);
    }

    /// Switch to `path` while keeping the playback spot.
    ///
    /// The spot is the offset on the timeline formed by laying the queued
    /// tracks end to end, wrapped into the new track. Equal-length stems
    /// therefore switch at the same offset. A failed seek stops the music.
    pub fn play_music_from_spot<A>(&mut self, path: &str, assets: &mut A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        if !Self::ensure_loaded(path, assets) {
            return;
        }
        let previous = self.current.filter(|_| self.playing);
        let offset = self.buffer.position();

        let Some(index) = self.select(path, &*assets) else {
            warn!("Music '{}' is not loaded", path);
            return;
        };
        if previous == Some(index) {
            debug!("Music '{}' already playing", path);
            return;
        }

        let spot = previous.map(|old| self.scrub_offset(old, index, offset));
        self.cancel_crossfade();
        self.buffer.jump_to_source(index);
        self.current = Some(index);

        if let Some(spot) = spot {
            if let Err(e) = self.buffer.set_position(spot) {
                warn!("Scrub to {:.2}s in '{}' failed: {}", spot, path, e);
                self.hard_stop();
                return;
            }
        }
        self.start(volumes);
        info!("Playing music '{}' from {:.2}s", path, spot.unwrap_or(0.0));
    }

    fn scrub_offset(&self, old: usize, new: usize, offset: f32) -> f32 {
        let before = |index: usize| -> f32 {
            (0..index)
                .filter_map(|i| self.buffer.source(i))
                .map(TrackData::duration_secs)
                .sum()
        };
        let length = self
            .buffer
            .source(new)
            .map_or(0.0, TrackData::duration_secs);
        if length <= 0.0 {
            return 0.0;
        }
        (before(old) + offset - before(new)).rem_euclid(length)
    }

    /// Stop music and any crossfade or sidechain in flight.
    pub fn stop_music(&mut self) {
        self.cancel_crossfade();
        self.hard_stop();
        debug!("Music stopped");
    }

    /// Cut the music volume and ramp it back.
    ///
    /// A hit during an active ramp cuts the already reduced volume again.
    /// Ignored while a crossfade owns the volume.
    pub fn sidechain(&mut self, volumes: &VolumeSettings) {
        if !self.playing || self.crossfade.is_some() {
            return;
        }

        self.volume *= self.settings.sidechain_factor;
        let target = self.target(volumes);
        self.sidechain = Some(LinearRamp::new(
            self.volume,
            target,
            self.settings.sidechain_frames,
        ));
        self.apply(volumes);
    }

    /// Fade from the playing track to `path`.
    ///
    /// With nothing playing this is [`play_music`](Self::play_music). A new
    /// crossfade during a running one drops the outgoing track and fades out
    /// the track that was fading in.
    pub fn crossfade<A>(&mut self, path: &str, assets: &mut A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        if !self.playing {
            self.play_music(path, assets, volumes);
            return;
        }
        if !Self::ensure_loaded(path, assets) {
            return;
        }
        let Some(index) = self.select(path, &*assets) else {
            warn!("Music '{}' is not loaded", path);
            return;
        };
        if self.current == Some(index) {
            debug!("Music '{}' already playing", path);
            return;
        }

        self.cancel_crossfade();
        self.sidechain = None;

        let out_volume = self.volume;
        let offset = self.buffer.position();
        let outgoing = self.current.and_then(|i| self.buffer.source(i)).cloned();
        if let Some(track) = outgoing {
            self.crossfade_buffer.add_source(track);
            self.crossfade_buffer.jump_to_source(0);
            self.crossfade_buffer.set_looping(self.settings.looping);
            self.crossfade_buffer.set_loop_behavior(false);
            if let Err(e) = self.crossfade_buffer.set_position(offset) {
                debug!("Crossfade buffer could not seek: {}", e);
            }
            self.crossfade_buffer.set_volume(volumes.emit(out_volume));
            if self.buffer.is_playing() {
                self.crossfade_buffer.play();
            }
        }

        self.buffer.stop();
        self.buffer.jump_to_source(index);
        self.buffer.set_looping(self.settings.looping);
        self.buffer.set_loop_behavior(false);
        self.current = Some(index);
        self.volume = 0.0;
        self.apply(volumes);

        let fade_frames = self.settings.crossfade_fade_frames;
        self.crossfade = Some(Crossfade {
            total: self.settings.crossfade_frames,
            fade_frames,
            remaining: self.settings.crossfade_frames,
            out_volume,
            fade_out: LinearRamp::new(out_volume, 0.0, fade_frames),
            fade_in: LinearRamp::new(0.0, volumes.effective_music(), fade_frames),
        });
        info!("Crossfading to '{}'", path);
    }

    /// Turn the sustained duck on or off.
    ///
    /// While a crossfade runs the request is remembered and takes effect when
    /// the crossfade lands.
    pub fn set_duck(&mut self, duck: bool, volumes: &VolumeSettings) {
        if self.duck == duck {
            return;
        }
        self.duck = duck;
        if self.crossfade.is_some() {
            debug!("Duck deferred until crossfade completes");
            return;
        }

        let factor = self.settings.duck_factor;
        if duck && self.sidechain.is_some() {
            self.volume *= factor;
        }
        let target = self.target(volumes);
        match self.sidechain.as_mut() {
            Some(ramp) => {
                if duck {
                    ramp.scale_remaining(factor);
                }
                ramp.retarget(self.volume, target);
            },
            None => self.volume = target,
        }
        self.apply(volumes);
    }

    /// Whether duck was requested.
    #[must_use]
    pub fn is_ducked(&self) -> bool {
        self.duck
    }

    /// Re-derive volumes after a master/music/mute change.
    ///
    /// Running envelopes are scaled by the change in `music × master`, so a
    /// cut or a fade keeps its shape under the new level.
    pub fn refresh(&mut self, volumes: &VolumeSettings) {
        let level = volumes.effective_music();
        let ratio = if self.level > 0.0 { level / self.level } else { 1.0 };
        let target = self.target(volumes);

        if let Some(crossfade) = self.crossfade.as_mut() {
            crossfade.out_volume *= ratio;
            crossfade.fade_out.retarget(crossfade.out_volume, 0.0);
            self.volume *= ratio;
            crossfade.fade_in.retarget(self.volume, target);
            self.crossfade_buffer
                .set_volume(volumes.emit(crossfade.out_volume));
        } else if let Some(ramp) = self.sidechain.as_mut() {
            self.volume *= ratio;
            ramp.retarget(self.volume, target);
        } else if self.playing {
            self.volume = target;
        }
        self.apply(volumes);
    }

    /// Request an asynchronous load; the track joins the buffer once loaded.
    pub fn preload_music<A>(&mut self, path: &str, assets: &mut A)
    where
        A: AssetStore<Track = S::Track>,
    {
        if self.positions.contains_key(path) || self.preloads.iter().any(|p| p == path) {
            return;
        }
        assets.load(path);
        self.preloads.push(path.to_string());
    }

    /// Tracks whose preload is still in flight.
    #[must_use]
    pub fn pending_preloads(&self) -> usize {
        self.preloads.len()
    }

    fn poll_preloads<A>(&mut self, assets: &A)
    where
        A: AssetStore<Track = S::Track>,
    {
        if self.preloads.is_empty() {
            return;
        }

        let mut ready = Vec::new();
        self.preloads.retain(|path| {
            if assets.is_loaded(path) {
                ready.push(path.clone());
                false
            } else if assets.contains(path) {
                true
            } else {
                warn!("Preload of '{}' failed", path);
                false
            }
        });
        for path in ready {
            self.select(&path, assets);
        }
    }

    /// Advance preloads and every envelope by one frame.
    pub fn update<A>(&mut self, assets: &A, volumes: &VolumeSettings)
    where
        A: AssetStore<Track = S::Track>,
    {
        self.poll_preloads(assets);
        self.buffer.update();
        self.crossfade_buffer.update();

        // The primary buffer is silent before a crossfade's fade-in starts.
        if self.playing && self.crossfade.is_none() && !self.buffer.is_playing() {
            info!("Music reached the end of its queue");
            self.playing = false;
            self.sidechain = None;
            return;
        }

        if self.crossfade.is_some() {
            self.update_crossfade(volumes);
        } else if self.sidechain.is_some() {
            self.update_sidechain(volumes);
        }
    }

    fn update_sidechain(&mut self, volumes: &VolumeSettings) {
        let target = self.target(volumes);
        let Some(ramp) = self.sidechain.as_mut() else {
            return;
        };
        let (volume, done) = ramp.advance(self.volume, target);
        self.volume = volume;
        if done {
            self.sidechain = None;
        }
        self.apply(volumes);
    }

    fn update_crossfade(&mut self, volumes: &VolumeSettings) {
        let target = self.target(volumes);
        let Some(crossfade) = self.crossfade.as_mut() else {
            return;
        };

        crossfade.remaining = crossfade.remaining.saturating_sub(1);
        let elapsed = crossfade.total.saturating_sub(crossfade.remaining);
        let fade_frames = crossfade.fade_frames;

        if elapsed <= fade_frames && crossfade.out_volume > 0.0 {
            let (out_volume, _) = crossfade.fade_out.advance(crossfade.out_volume, 0.0);
            crossfade.out_volume = out_volume;
            self.crossfade_buffer.set_volume(volumes.emit(out_volume));
        }

        if crossfade.remaining < fade_frames {
            if !self.buffer.is_playing() {
                self.buffer.play();
            }
            let (volume, _) = crossfade.fade_in.advance(self.volume, target);
            self.volume = volume;
        }

        if crossfade.remaining == 0 {
            self.crossfade = None;
            self.crossfade_buffer.stop();
            self.crossfade_buffer.clear_sources();
            self.volume = self.target(volumes);
            debug!("Crossfade complete");
        }
        self.apply(volumes);
    }
}
