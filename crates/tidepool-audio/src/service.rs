//! Playback collaborators the mixer drives.
//!
//! The mixer never touches samples. It talks to three external services:
//!
//! ```text
//! ┌──────────────┐   play/volume/loop   ┌───────────────┐
//! │              │─────────────────────▶│ SoundPlayback │  one per loaded effect
//! │  AudioMixer  │   queue/seek/volume  ┌───────────────┐
//! │              │─────────────────────▶│ StreamBuffer  │  music, crossfade, foley
//! │              │   load/poll/get      ┌───────────────┐
//! │              │─────────────────────▶│  AssetStore   │  streamed tracks
//! └──────────────┘                      └───────────────┘
//! ```
//!
//! None of the services report "playback finished". Completion is inferred
//! from frame counts by the mixer.

use std::time::Duration;

use crate::error::AudioResult;

/// Identifier of one playing instance, issued by a [`SoundPlayback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl VoiceId {
    /// Create a voice ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A shared, pre-loaded sound effect resource.
///
/// Every call to [`play`](Self::play) starts an independent voice of the same
/// resource. Implementations are cheap handles; clones refer to the same
/// resource.
pub trait SoundPlayback: Clone {
    /// Start a new voice at `volume`. `None` means the service could not
    /// allocate one.
    fn play(&self, volume: f32) -> Option<VoiceId>;

    /// Enable or disable looping on a voice.
    fn set_looping(&self, voice: VoiceId, looping: bool);

    /// Change the volume of a voice.
    fn set_volume(&self, voice: VoiceId, volume: f32);
}

/// A loaded track that can sit in a [`StreamBuffer`] queue.
pub trait TrackData: Clone {
    /// Length of the track in seconds.
    fn duration_secs(&self) -> f32;
}

/// A single streaming output channel playing from an ordered source queue.
pub trait StreamBuffer {
    /// The track type this buffer queues.
    type Track: TrackData;

    /// Append a source to the end of the queue.
    fn add_source(&mut self, track: Self::Track);

    /// Remove every source. Stops playback.
    fn clear_sources(&mut self);

    /// Start or resume playback of the current source.
    fn play(&mut self);

    /// Stop playback and rewind the current source.
    fn stop(&mut self);

    /// Whether the buffer is producing audio.
    fn is_playing(&self) -> bool;

    /// Offset into the current source, in seconds.
    fn position(&self) -> f32;

    /// Seek within the current source.
    fn set_position(&mut self, seconds: f32) -> AudioResult<()>;

    /// Select the source at `index` and rewind it.
    fn jump_to_source(&mut self, index: usize);

    /// Move to the next source in the queue.
    fn advance_source(&mut self);

    /// Index of the current source.
    fn current(&self) -> Option<usize>;

    /// Number of queued sources.
    fn source_count(&self) -> usize;

    /// Duration of the current source in seconds (0 if none).
    fn duration(&self) -> f32;

    /// Source at `index`.
    fn source(&self, index: usize) -> Option<&Self::Track>;

    /// Set the output volume.
    fn set_volume(&mut self, volume: f32);

    /// Current output volume.
    fn volume(&self) -> f32;

    /// Loop when the end of the queue (or the current source) is reached.
    fn set_looping(&mut self, looping: bool);

    /// `true`: play through the queue; `false`: repeat the current source.
    fn set_loop_behavior(&mut self, continuous: bool);

    /// Per-frame housekeeping for backends that need to feed their queue.
    fn update(&mut self) {}
}

/// Loads streamed tracks (music and foley) by path.
pub trait AssetStore {
    /// The track type produced.
    type Track: TrackData;

    /// Queue an asynchronous load. Loading an already known path is a no-op.
    fn load(&mut self, path: &str);

    /// Whether `path` finished loading.
    fn is_loaded(&self, path: &str) -> bool;

    /// Block until `path` is loaded, queueing it first if necessary.
    fn finish_loading(&mut self, path: &str) -> AudioResult<()>;

    /// Fetch a loaded track.
    fn get(&self, path: &str) -> Option<Self::Track>;

    /// Whether `path` is known to the store (loaded or in flight).
    fn contains(&self, path: &str) -> bool;

    /// Make progress on queued loads for at most `budget`. Returns `true`
    /// when nothing is left in flight.
    fn update(&mut self, budget: Duration) -> bool;
}

/// Bundles the collaborator types of one backend.
pub trait AudioBackend {
    /// Sound effect resource type.
    type Sound: SoundPlayback;
    /// Streamed track type shared by buffers and asset store.
    type Track: TrackData;
    /// Streaming buffer type.
    type Stream: StreamBuffer<Track = Self::Track>;
    /// Asset store type.
    type Assets: AssetStore<Track = Self::Track>;
}
