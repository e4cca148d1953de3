//! Sound effect instance registry.
//!
//! Tracks live one-shot and looping effect instances by a caller-chosen key.
//! The playback service never reports that a sound finished, so lifetime is
//! bounded by frame count: every [`update`](SfxRegistry::update) ages each
//! instance, and non-looping instances past the time limit are soft-stopped.
//!
//! Invariants:
//! - at most one live instance per key; replaying a key stops the old one
//! - at most `frame_limit` new instances per frame
//! - soft-stop means looping off, volume 0, entry removed

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::service::{SoundPlayback, VoiceId};
use crate::volume::VolumeSettings;

/// Identifier of a sound registered in a [`SoundBank`].
///
/// Identity is by registration, not by content: registering the same
/// resource twice yields two distinct IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(u32);

impl AssetId {
    /// Get the raw ID.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Registry of pre-loaded sound effect resources.
#[derive(Debug)]
pub struct SoundBank<S> {
    sounds: HashMap<AssetId, S>,
    next_id: u32,
}

impl<S> Default for SoundBank<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SoundBank<S> {
    /// Create an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sounds: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a loaded sound and return its ID.
    pub fn insert(&mut self, sound: S) -> AssetId {
        let id = AssetId(self.next_id);
        self.next_id += 1;
        self.sounds.insert(id, sound);
        id
    }

    /// Look up a sound.
    #[must_use]
    pub fn get(&self, id: AssetId) -> Option<&S> {
        self.sounds.get(&id)
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.sounds.contains_key(&id)
    }

    /// Number of registered sounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Whether the bank is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

/// One live sound effect instance.
#[derive(Debug)]
struct SoundInstance<S> {
    sound: S,
    voice: VoiceId,
    looping: bool,
    /// Requested volume before master scaling.
    volume: f32,
    frames: u32,
}

impl<S: SoundPlayback> SoundInstance<S> {
    fn soft_stop(&self) {
        self.sound.set_looping(self.voice, false);
        self.sound.set_volume(self.voice, 0.0);
    }
}

/// Keyed registry of live sound effect instances.
#[derive(Debug)]
pub struct SfxRegistry<S> {
    bank: SoundBank<S>,
    active: HashMap<String, SoundInstance<S>>,
    played_this_frame: u32,
    cooldown_frames: u32,
    time_limit_frames: u32,
    frame_limit: u32,
}

impl<S: SoundPlayback> SfxRegistry<S> {
    /// Create a registry with the given limits.
    #[must_use]
    pub fn new(cooldown_frames: u32, time_limit_frames: u32, frame_limit: u32) -> Self {
        Self {
            bank: SoundBank::new(),
            active: HashMap::new(),
            played_this_frame: 0,
            cooldown_frames,
            time_limit_frames,
            frame_limit,
        }
    }

    /// The sound bank.
    #[must_use]
    pub fn bank(&self) -> &SoundBank<S> {
        &self.bank
    }

    /// Register a loaded sound.
    pub fn register(&mut self, sound: S) -> AssetId {
        self.bank.insert(sound)
    }

    /// Start a new instance under `key`.
    ///
    /// Returns `false` when nothing was started: unknown asset, frame limit
    /// reached, or the playback service could not allocate a voice.
    pub fn play(
        &mut self,
        key: &str,
        asset: AssetId,
        looping: bool,
        volume: f32,
        volumes: &VolumeSettings,
    ) -> bool {
        let Some(sound) = self.bank.get(asset) else {
            debug!("Sound {:?} for '{}' is not in the bank", asset, key);
            return false;
        };
        if self.played_this_frame >= self.frame_limit {
            debug!("Frame limit reached, dropping '{}'", key);
            return false;
        }
        let sound = sound.clone();

        self.stop(key);

        let Some(voice) = sound.play(volumes.emit(volume * volumes.master)) else {
            warn!("Playback service refused a voice for '{}'", key);
            return false;
        };
        if looping {
            sound.set_looping(voice, true);
        }

        self.active.insert(
            key.to_string(),
            SoundInstance {
                sound,
                voice,
                looping,
                volume,
                frames: 0,
            },
        );
        self.played_this_frame += 1;
        debug!("Playing '{}' on voice {}", key, voice.raw());
        true
    }

    /// Soft-stop the instance under `key`, if any.
    pub fn stop(&mut self, key: &str) {
        if let Some(instance) = self.active.remove(key) {
            instance.soft_stop();
            debug!("Stopped '{}'", key);
        }
    }

    /// Soft-stop every live instance.
    pub fn stop_all(&mut self) {
        for (_, instance) in self.active.drain() {
            instance.soft_stop();
        }
    }

    /// Whether `key` names a live instance.
    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Number of live instances.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Instances started since the last [`update`](Self::update).
    #[must_use]
    pub fn played_this_frame(&self) -> u32 {
        self.played_this_frame
    }

    /// Age every instance by one frame and purge expired one-shots.
    pub fn update(&mut self) {
        let limit = self.time_limit_frames;
        self.active.retain(|key, instance| {
            instance.frames += 1;
            if !instance.looping && instance.frames > limit {
                instance.soft_stop();
                debug!("Expired '{}' after {} frames", key, instance.frames);
                return false;
            }
            true
        });
        self.played_this_frame = 0;
    }

    /// Re-push every live instance's volume, e.g. after a master or mute change.
    pub fn refresh_volumes(&self, volumes: &VolumeSettings) {
        for instance in self.active.values() {
            let volume = volumes.emit(instance.volume * volumes.master);
            instance.sound.set_volume(instance.voice, volume);
        }
    }

    /// Advisory replay cooldown in frames.
    #[must_use]
    pub fn cooldown_frames(&self) -> u32 {
        self.cooldown_frames
    }

    /// Set the advisory replay cooldown.
    pub fn set_cooldown_frames(&mut self, frames: u32) {
        self.cooldown_frames = frames;
    }

    /// Lifetime of a non-looping instance in frames.
    #[must_use]
    pub fn time_limit_frames(&self) -> u32 {
        self.time_limit_frames
    }

    /// Set the lifetime of non-looping instances.
    pub fn set_time_limit_frames(&mut self, frames: u32) {
        self.time_limit_frames = frames;
    }

    /// New instances allowed per frame.
    #[must_use]
    pub fn frame_limit(&self) -> u32 {
        self.frame_limit
    }

    /// Set the per-frame instance limit.
    pub fn set_frame_limit(&mut self, limit: u32) {
        self.frame_limit = limit;
    }
}
