//! In-memory backend with no output device.
//!
//! Every collaborator here records what the mixer asked of it, which makes
//! the backend usable both for servers that run the game loop without audio
//! and for tests that assert on exact volume envelopes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{AudioError, AudioResult};
use crate::service::{AssetStore, AudioBackend, SoundPlayback, StreamBuffer, TrackData, VoiceId};

/// Backend made of the headless collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessBackend;

impl AudioBackend for HeadlessBackend {
    type Sound = HeadlessSound;
    type Track = HeadlessTrack;
    type Stream = HeadlessStream;
    type Assets = HeadlessAssets;
}

/// A call received by a [`HeadlessSound`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceEvent {
    /// A voice was started.
    Play {
        /// Voice issued.
        voice: VoiceId,
        /// Starting volume.
        volume: f32,
    },
    /// Looping was changed.
    SetLooping {
        /// Target voice.
        voice: VoiceId,
        /// New looping flag.
        looping: bool,
    },
    /// Volume was changed.
    SetVolume {
        /// Target voice.
        voice: VoiceId,
        /// New volume.
        volume: f32,
    },
}

#[derive(Debug, Clone, Copy)]
struct VoiceState {
    volume: f32,
    looping: bool,
}

impl VoiceState {
    fn is_silenced(self) -> bool {
        !self.looping && self.volume <= 0.0
    }
}

#[derive(Debug, Default)]
struct SoundState {
    next_voice: u64,
    capacity: Option<usize>,
    voices: HashMap<VoiceId, VoiceState>,
    events: Vec<VoiceEvent>,
}

/// Sound effect resource that records voice calls.
#[derive(Debug, Clone)]
pub struct HeadlessSound {
    name: Arc<str>,
    state: Arc<Mutex<SoundState>>,
}

impl HeadlessSound {
    /// Create a sound with unlimited voices.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(SoundState::default())),
        }
    }

    /// Name given at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Limit how many audible voices may exist at once.
    pub fn set_capacity(&self, capacity: usize) {
        self.state.lock().capacity = Some(capacity);
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<VoiceEvent> {
        self.state.lock().events.clone()
    }

    /// Every voice ever issued, oldest first.
    #[must_use]
    pub fn voices(&self) -> Vec<VoiceId> {
        let mut voices: Vec<_> = self.state.lock().voices.keys().copied().collect();
        voices.sort();
        voices
    }

    /// Last volume set on `voice`.
    #[must_use]
    pub fn volume(&self, voice: VoiceId) -> f32 {
        self.state.lock().voices.get(&voice).map_or(0.0, |v| v.volume)
    }

    /// Whether `voice` is looping.
    #[must_use]
    pub fn is_looping(&self, voice: VoiceId) -> bool {
        self.state.lock().voices.get(&voice).is_some_and(|v| v.looping)
    }

    /// Whether `voice` was soft-stopped (not looping, volume 0).
    #[must_use]
    pub fn is_silenced(&self, voice: VoiceId) -> bool {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map_or(true, |v| v.is_silenced())
    }
}

impl SoundPlayback for HeadlessSound {
    fn play(&self, volume: f32) -> Option<VoiceId> {
        let mut state = self.state.lock();
        if let Some(capacity) = state.capacity {
            let audible = state.voices.values().filter(|v| !v.is_silenced()).count();
            if audible >= capacity {
                return None;
            }
        }

        let voice = VoiceId::new(state.next_voice);
        state.next_voice += 1;
        state.voices.insert(
            voice,
            VoiceState {
                volume,
                looping: false,
            },
        );
        state.events.push(VoiceEvent::Play { voice, volume });
        Some(voice)
    }

    fn set_looping(&self, voice: VoiceId, looping: bool) {
        let mut state = self.state.lock();
        if let Some(v) = state.voices.get_mut(&voice) {
            v.looping = looping;
        }
        state.events.push(VoiceEvent::SetLooping { voice, looping });
    }

    fn set_volume(&self, voice: VoiceId, volume: f32) {
        let mut state = self.state.lock();
        if let Some(v) = state.voices.get_mut(&voice) {
            v.volume = volume;
        }
        state.events.push(VoiceEvent::SetVolume { voice, volume });
    }
}

/// A named track of fixed length.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessTrack {
    name: Arc<str>,
    duration: f32,
}

impl HeadlessTrack {
    /// Create a track.
    #[must_use]
    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: Arc::from(name),
            duration,
        }
    }

    /// Track name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TrackData for HeadlessTrack {
    fn duration_secs(&self) -> f32 {
        self.duration
    }
}

/// Streaming buffer that keeps its queue and transport state in memory.
#[derive(Debug, Default)]
pub struct HeadlessStream {
    sources: Vec<HeadlessTrack>,
    current: Option<usize>,
    playing: bool,
    position: f32,
    volume: f32,
    looping: bool,
    continuous: bool,
    fail_seeks: bool,
    stops: u32,
}

impl HeadlessStream {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every [`set_position`](StreamBuffer::set_position) fail.
    pub fn set_fail_seeks(&mut self, fail: bool) {
        self.fail_seeks = fail;
    }

    /// Name of the current source.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.sources.get(i))
            .map(HeadlessTrack::name)
    }

    /// Whether the buffer loops.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the buffer plays through its queue.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// How many times playback was stopped.
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.stops
    }
}

impl StreamBuffer for HeadlessStream {
    type Track = HeadlessTrack;

    fn add_source(&mut self, track: HeadlessTrack) {
        self.sources.push(track);
    }

    fn clear_sources(&mut self) {
        self.sources.clear();
        self.current = None;
        self.playing = false;
        self.position = 0.0;
    }

    fn play(&mut self) {
        if self.current.is_none() && !self.sources.is_empty() {
            self.current = Some(0);
        }
        self.playing = self.current.is_some();
    }

    fn stop(&mut self) {
        if self.playing {
            self.stops += 1;
        }
        self.playing = false;
        self.position = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f32 {
        self.position
    }

    fn set_position(&mut self, seconds: f32) -> AudioResult<()> {
        if self.fail_seeks {
            return Err(AudioError::SeekFailed {
                position: seconds,
                message: "seeking disabled".to_string(),
            });
        }
        self.position = seconds.clamp(0.0, self.duration());
        Ok(())
    }

    fn jump_to_source(&mut self, index: usize) {
        if index < self.sources.len() {
            self.current = Some(index);
            self.position = 0.0;
        }
    }

    fn advance_source(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        let next = current + 1;
        if next < self.sources.len() {
            self.current = Some(next);
        } else if self.looping {
            self.current = Some(0);
        } else {
            self.playing = false;
        }
        self.position = 0.0;
    }

    fn current(&self) -> Option<usize> {
        self.current
    }

    fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn duration(&self) -> f32 {
        self.current
            .and_then(|i| self.sources.get(i))
            .map_or(0.0, TrackData::duration_secs)
    }

    fn source(&self, index: usize) -> Option<&HeadlessTrack> {
        self.sources.get(index)
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_loop_behavior(&mut self, continuous: bool) {
        self.continuous = continuous;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Pending,
    Loaded,
}

/// Asset store backed by a fixed library of tracks.
///
/// [`load`](AssetStore::load) only marks a path pending; it becomes
/// available on the next [`update`](AssetStore::update) or
/// [`finish_loading`](AssetStore::finish_loading). Paths missing from the
/// library fail to load.
#[derive(Debug, Default)]
pub struct HeadlessAssets {
    library: HashMap<String, HeadlessTrack>,
    state: HashMap<String, LoadState>,
}

impl HeadlessAssets {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track that can later be loaded from `path`.
    #[must_use]
    pub fn with_track(mut self, path: &str, duration: f32) -> Self {
        self.insert_track(path, duration);
        self
    }

    /// Add a track that can later be loaded from `path`.
    pub fn insert_track(&mut self, path: &str, duration: f32) {
        self.library
            .insert(path.to_string(), HeadlessTrack::new(path, duration));
    }

    /// Number of loads still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state
            .values()
            .filter(|s| **s == LoadState::Pending)
            .count()
    }
}

impl AssetStore for HeadlessAssets {
    type Track = HeadlessTrack;

    fn load(&mut self, path: &str) {
        self.state
            .entry(path.to_string())
            .or_insert(LoadState::Pending);
    }

    fn is_loaded(&self, path: &str) -> bool {
        self.state.get(path) == Some(&LoadState::Loaded)
    }

    fn finish_loading(&mut self, path: &str) -> AudioResult<()> {
        if self.library.contains_key(path) {
            self.state.insert(path.to_string(), LoadState::Loaded);
            Ok(())
        } else {
            self.state.remove(path);
            Err(AudioError::LoadFailed {
                path: path.into(),
                message: "not in library".to_string(),
            })
        }
    }

    fn get(&self, path: &str) -> Option<HeadlessTrack> {
        if self.is_loaded(path) {
            self.library.get(path).cloned()
        } else {
            None
        }
    }

    fn contains(&self, path: &str) -> bool {
        self.state.contains_key(path)
    }

    fn update(&mut self, _budget: Duration) -> bool {
        let library = &self.library;
        self.state.retain(|path, state| {
            if library.contains_key(path) {
                *state = LoadState::Loaded;
                true
            } else {
                false
            }
        });
        true
    }
}
