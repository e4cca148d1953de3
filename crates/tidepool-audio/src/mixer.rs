//! The mixer facade.
//!
//! [`AudioMixer`] owns every section and the shared [`VolumeSettings`]. Game
//! code calls its fire-and-forget operations from anywhere in a frame and
//! calls [`update`](AudioMixer::update) exactly once per frame.
//!
//! A game holds a single mixer for the whole process: two mixers would drive
//! the same output device with independent envelopes.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::MixerConfig;
use crate::foley::{FoleyEngine, FoleySettings};
use crate::music::{MusicEngine, MusicEnvelope, MusicSettings};
use crate::service::{AssetStore, AudioBackend, StreamBuffer};
use crate::sfx::{AssetId, SfxRegistry};
use crate::volume::VolumeSettings;

/// Time the asset store may spend collecting finished loads each frame.
pub const ASSET_BUDGET: Duration = Duration::from_millis(2);

/// Options for [`AudioMixer::play_sound_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoundOptions {
    /// Loop until stopped.
    pub looping: bool,
    /// Sidechain the music when the sound starts.
    pub sidechain: bool,
    /// Volume before master scaling. Defaults to the sound volume.
    pub volume: Option<f32>,
}

impl SoundOptions {
    /// Loop the sound.
    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sidechain the music.
    #[must_use]
    pub fn sidechain(mut self, sidechain: bool) -> Self {
        self.sidechain = sidechain;
        self
    }

    /// Play at an explicit volume.
    #[must_use]
    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Layered game audio mixer.
pub struct AudioMixer<B: AudioBackend> {
    config: MixerConfig,
    volumes: VolumeSettings,
    assets: B::Assets,
    sfx: SfxRegistry<B::Sound>,
    music: MusicEngine<B::Stream>,
    foley: FoleyEngine<B::Stream>,
    frame: u64,
}

impl<B: AudioBackend> AudioMixer<B> {
    /// Create a mixer over an asset store and three streaming buffers:
    /// primary music, crossfade, and foley.
    pub fn new(
        config: MixerConfig,
        assets: B::Assets,
        music: B::Stream,
        crossfade: B::Stream,
        foley: B::Stream,
    ) -> Self {
        let mut config = config;
        config.validate();

        let sfx = SfxRegistry::new(
            config.cooldown_frames,
            config.time_limit_frames,
            config.frame_limit,
        );
        let music = MusicEngine::new(music, crossfade, MusicSettings::from(&config));
        let foley = FoleyEngine::new(foley, FoleySettings::from(&config));

        info!(
            "Audio mixer initialized (time limit {} frames, {} sounds/frame)",
            config.time_limit_frames, config.frame_limit
        );

        Self {
            config,
            volumes: VolumeSettings::default(),
            assets,
            sfx,
            music,
            foley,
            frame: 0,
        }
    }

    /// Register a pre-loaded sound effect.
    pub fn register_sound(&mut self, sound: B::Sound) -> AssetId {
        self.sfx.register(sound)
    }

    // === Sound Effects ===

    /// Play a sound effect under `key` at the sound volume.
    ///
    /// Returns whether an instance was started.
    pub fn play_sound(&mut self, key: &str, asset: AssetId, looping: bool) -> bool {
        self.play_sound_with(key, asset, SoundOptions::default().looping(looping))
    }

    /// Play a sound effect with explicit options.
    pub fn play_sound_with(&mut self, key: &str, asset: AssetId, options: SoundOptions) -> bool {
        let volume = options.volume.unwrap_or(self.volumes.sound);
        let started = self
            .sfx
            .play(key, asset, options.looping, volume, &self.volumes);
        if started && options.sidechain {
            self.music.sidechain(&self.volumes);
        }
        started
    }

    /// Soft-stop the sound effect under `key`.
    pub fn stop_sound(&mut self, key: &str) {
        self.sfx.stop(key);
    }

    /// Whether `key` names a live sound effect.
    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.sfx.is_active(key)
    }

    /// Number of live sound effects.
    #[must_use]
    pub fn active_sounds(&self) -> usize {
        self.sfx.active_count()
    }

    // === Music ===

    /// Play `path` from the start, loading it synchronously if needed.
    pub fn play_music(&mut self, path: &str) {
        self.music.play_music(path, &mut self.assets, &self.volumes);
    }

    /// Switch to `path` at the current playback spot.
    pub fn play_music_from_spot(&mut self, path: &str) {
        self.music
            .play_music_from_spot(path, &mut self.assets, &self.volumes);
    }

    /// Play a track that was preloaded.
    pub fn play_loaded_music(&mut self, path: &str) {
        self.music
            .play_loaded_music(path, &self.assets, &self.volumes);
    }

    /// Start loading `path` in the background.
    pub fn preload_music(&mut self, path: &str) {
        self.music.preload_music(path, &mut self.assets);
    }

    /// Stop music.
    pub fn stop_music(&mut self) {
        self.music.stop_music();
    }

    /// Cut the music and let it recover.
    pub fn sidechain(&mut self) {
        self.music.sidechain(&self.volumes);
    }

    /// Crossfade to `path`.
    pub fn crossfade(&mut self, path: &str) {
        self.music.crossfade(path, &mut self.assets, &self.volumes);
    }

    /// Turn the music duck on or off.
    pub fn set_duck_music(&mut self, duck: bool) {
        self.music.set_duck(duck, &self.volumes);
    }

    // === Foley ===

    /// Replace the foley layer with `path`.
    pub fn play_foley(&mut self, path: &str) {
        self.foley.play(path, &mut self.assets, &self.volumes);
    }

    /// Fade out the foley layer.
    pub fn fade_out_foley(&mut self) {
        self.foley.fade_out();
    }

    /// Stop the foley layer immediately.
    pub fn stop_foley(&mut self) {
        self.foley.stop();
    }

    // === Frame Tick ===

    /// Advance the mixer by one frame: sound effects, then foley, then music.
    ///
    /// The music step first gives the asset store [`ASSET_BUDGET`] to finish
    /// in-flight loads, so preloads join the music buffer without the game
    /// polling the store itself.
    pub fn update(&mut self) {
        self.sfx.update();
        self.foley.update(&self.volumes);
        self.assets.update(ASSET_BUDGET);
        self.music.update(&self.assets, &self.volumes);
        self.frame += 1;
    }

    /// Frames processed so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // === Volume ===

    /// Current volume settings.
    #[must_use]
    pub fn volumes(&self) -> &VolumeSettings {
        &self.volumes
    }

    /// Replace every volume setting at once.
    pub fn set_volumes(&mut self, volumes: VolumeSettings) {
        let mut volumes = volumes;
        volumes.validate();
        self.volumes = volumes;
        self.refresh_all();
    }

    /// Master volume.
    #[must_use]
    pub fn master_volume(&self) -> f32 {
        self.volumes.master
    }

    /// Set master volume; every section re-emits its volume.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.volumes.set_master(volume);
        self.refresh_all();
    }

    /// Music volume.
    #[must_use]
    pub fn music_volume(&self) -> f32 {
        self.volumes.music
    }

    /// Set music volume.
    pub fn set_music_volume(&mut self, volume: f32) {
        self.volumes.set_music(volume);
        self.music.refresh(&self.volumes);
    }

    /// Sound volume, shared by sound effects and foley.
    #[must_use]
    pub fn sound_volume(&self) -> f32 {
        self.volumes.sound
    }

    /// Set sound volume. Live effects keep the volume they were started at;
    /// foley follows at once.
    pub fn set_sound_volume(&mut self, volume: f32) {
        self.volumes.set_sound(volume);
        self.foley.refresh(&self.volumes);
    }

    /// Turn all output on or off.
    pub fn set_sound_active(&mut self, active: bool) {
        if self.volumes.enabled == active {
            return;
        }
        self.volumes.enabled = active;
        debug!("Sound {}", if active { "enabled" } else { "disabled" });
        self.refresh_all();
    }

    /// Whether output is on.
    #[must_use]
    pub fn is_sound_active(&self) -> bool {
        self.volumes.enabled
    }

    fn refresh_all(&mut self) {
        self.sfx.refresh_volumes(&self.volumes);
        self.music.refresh(&self.volumes);
        self.foley.refresh(&self.volumes);
    }

    // === Status ===

    /// Path of the playing music track.
    #[must_use]
    pub fn currently_playing_track(&self) -> Option<&str> {
        self.music.current_track()
    }

    /// Whether music is playing.
    #[must_use]
    pub fn is_music_playing(&self) -> bool {
        self.music.is_playing()
    }

    /// Whether foley is playing.
    #[must_use]
    pub fn is_foley_playing(&self) -> bool {
        self.foley.is_playing()
    }

    /// Music envelopes in flight.
    #[must_use]
    pub fn music_envelope(&self) -> MusicEnvelope {
        self.music.envelope()
    }

    // === Configuration ===

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Replace the configuration. Running envelopes finish with the values
    /// they started with.
    pub fn set_config(&mut self, config: MixerConfig) {
        let mut config = config;
        config.validate();
        self.sfx.set_cooldown_frames(config.cooldown_frames);
        self.sfx.set_time_limit_frames(config.time_limit_frames);
        self.sfx.set_frame_limit(config.frame_limit);
        self.music.set_settings(MusicSettings::from(&config));
        self.foley.set_settings(FoleySettings::from(&config));
        self.config = config;
    }

    /// Advisory replay cooldown in frames.
    #[must_use]
    pub fn cooldown(&self) -> u32 {
        self.sfx.cooldown_frames()
    }

    /// Set the advisory replay cooldown.
    pub fn set_cooldown(&mut self, frames: u32) {
        self.config.cooldown_frames = frames;
        self.sfx.set_cooldown_frames(frames);
    }

    /// Lifetime of non-looping sound effects in frames.
    #[must_use]
    pub fn time_limit(&self) -> u32 {
        self.sfx.time_limit_frames()
    }

    /// Set the lifetime of non-looping sound effects.
    pub fn set_time_limit(&mut self, frames: u32) {
        let frames = frames.max(1);
        self.config.time_limit_frames = frames;
        self.sfx.set_time_limit_frames(frames);
    }

    /// Sound effects allowed to start per frame.
    #[must_use]
    pub fn frame_limit(&self) -> u32 {
        self.sfx.frame_limit()
    }

    /// Set the per-frame sound effect limit.
    pub fn set_frame_limit(&mut self, limit: u32) {
        self.config.frame_limit = limit;
        self.sfx.set_frame_limit(limit);
    }

    // === Collaborators ===

    /// The asset store.
    #[must_use]
    pub fn assets(&self) -> &B::Assets {
        &self.assets
    }

    /// Mutable access to the asset store, e.g. to drive loads.
    pub fn assets_mut(&mut self) -> &mut B::Assets {
        &mut self.assets
    }

    /// The primary music buffer.
    #[must_use]
    pub fn music_buffer(&self) -> &B::Stream {
        self.music.buffer()
    }

    /// The crossfade buffer.
    #[must_use]
    pub fn crossfade_buffer(&self) -> &B::Stream {
        self.music.crossfade_buffer()
    }

    /// The foley buffer.
    #[must_use]
    pub fn foley_buffer(&self) -> &B::Stream {
        self.foley.buffer()
    }

    /// Volume the music buffer is currently emitting.
    #[must_use]
    pub fn music_output(&self) -> f32 {
        self.music.buffer().volume()
    }
}

impl<B: AudioBackend> std::fmt::Debug for AudioMixer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("frame", &self.frame)
            .field("volumes", &self.volumes)
            .field("active_sounds", &self.sfx.active_count())
            .field("music", &self.music.current_track())
            .field("foley", &self.foley.is_playing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessAssets, HeadlessBackend, HeadlessSound, HeadlessStream};

    fn mixer() -> AudioMixer<HeadlessBackend> {
        let assets = HeadlessAssets::new()
            .with_track("music/reef.ogg", 120.0)
            .with_track("music/trench.ogg", 120.0)
            .with_track("foley/surf.ogg", 30.0);
        AudioMixer::new(
            MixerConfig::default(),
            assets,
            HeadlessStream::new(),
            HeadlessStream::new(),
            HeadlessStream::new(),
        )
    }

    #[test]
    fn test_sidechain_option_cuts_music() {
        let mut mixer = mixer();
        let splash = mixer.register_sound(HeadlessSound::new("splash"));
        mixer.play_music("music/reef.ogg");

        assert!(mixer.play_sound_with("hit", splash, SoundOptions::default().sidechain(true)));
        assert!(mixer.music_envelope().sidechained);
        assert!((mixer.music_output() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_dropped_sound_does_not_sidechain() {
        let mut mixer = mixer();
        let splash = mixer.register_sound(HeadlessSound::new("splash"));
        mixer.set_frame_limit(0);
        mixer.play_music("music/reef.ogg");

        assert!(!mixer.play_sound_with("hit", splash, SoundOptions::default().sidechain(true)));
        assert!(!mixer.music_envelope().sidechained);
    }

    #[test]
    fn test_default_volume_is_sound_volume() {
        let mut mixer = mixer();
        let sound = HeadlessSound::new("ink");
        let ink = mixer.register_sound(sound.clone());
        mixer.set_sound_volume(0.4);

        mixer.play_sound("ink", ink, false);
        let voice = sound.voices()[0];
        assert!((sound.volume(voice) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_master_change_refreshes_every_section() {
        let mut mixer = mixer();
        let sound = HeadlessSound::new("bubbles");
        let bubbles = mixer.register_sound(sound.clone());
        mixer.play_sound("loop", bubbles, true);
        mixer.play_music("music/reef.ogg");
        mixer.play_foley("foley/surf.ogg");

        mixer.set_master_volume(0.5);

        let voice = sound.voices()[0];
        assert!((sound.volume(voice) - 0.5).abs() < 1e-6);
        assert!((mixer.music_output() - 0.5).abs() < 1e-6);
        assert!((mixer.foley_buffer().volume() - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_update_counts_frames() {
        let mut mixer = mixer();
        mixer.update();
        mixer.update();
        assert_eq!(mixer.frame(), 2);
    }

    #[test]
    fn test_set_config_applies_limits() {
        let mut mixer = mixer();
        mixer.set_config(MixerConfig {
            frame_limit: 5,
            time_limit_frames: 0,
            ..MixerConfig::default()
        });
        assert_eq!(mixer.frame_limit(), 5);
        assert_eq!(mixer.time_limit(), 1);
    }

    #[test]
    fn test_status_queries() {
        let mut mixer = mixer();
        assert_eq!(mixer.currently_playing_track(), None);
        mixer.play_music("music/trench.ogg");
        mixer.play_foley("foley/surf.ogg");

        assert_eq!(mixer.currently_playing_track(), Some("music/trench.ogg"));
        assert!(mixer.is_music_playing());
        assert!(mixer.is_foley_playing());
    }
}
