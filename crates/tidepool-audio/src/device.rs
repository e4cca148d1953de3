//! Output-device collaborators built on rodio.
//!
//! ```text
//! ┌──────────────┐        ┌──────────────────────────────┐
//! │ RodioDevice  │──────▶ │ OutputStreamHandle           │
//! │ (stream)     │        └──────┬────────────┬──────────┘
//! └──────────────┘               │            │
//!                        Sink per voice   one Sink per buffer
//!                         RodioSound        RodioStream
//! ```
//!
//! Tracks are decoded fully into memory as interleaved `f32` samples, so
//! seeking and re-queueing never touch the file system again.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::error::{AudioError, AudioResult};
use crate::service::{SoundPlayback, StreamBuffer, TrackData, VoiceId};

/// Default number of simultaneous voices per sound effect.
pub const DEFAULT_VOICES_PER_SOUND: usize = 8;

/// The default output device.
pub struct RodioDevice {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl std::fmt::Debug for RodioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioDevice").finish_non_exhaustive()
    }
}

impl RodioDevice {
    /// Open the default output device.
    pub fn new() -> AudioResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Handle for creating sinks.
    #[must_use]
    pub fn handle(&self) -> &OutputStreamHandle {
        &self.handle
    }

    /// Create a streaming buffer on this device.
    pub fn stream(&self) -> AudioResult<RodioStream> {
        RodioStream::new(self.handle.clone())
    }

    /// Load a sound effect from `path`.
    pub fn load_sound(&self, path: impl AsRef<Path>) -> AudioResult<RodioSound> {
        let track = RodioTrack::decode(path)?;
        Ok(RodioSound::new(
            self.handle.clone(),
            track,
            DEFAULT_VOICES_PER_SOUND,
        ))
    }
}

fn new_sink(handle: &OutputStreamHandle) -> AudioResult<Sink> {
    Sink::try_new(handle).map_err(|e| AudioError::DeviceInitFailed(e.to_string()))
}

/// A decoded track.
#[derive(Clone)]
pub struct RodioTrack {
    samples: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
    duration: f32,
}

impl std::fmt::Debug for RodioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioTrack")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl RodioTrack {
    /// Decode a file.
    pub fn decode(path: impl AsRef<Path>) -> AudioResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let track = Self::from_reader(BufReader::new(file)).map_err(|e| AudioError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!("Decoded {:?} ({:.1}s)", path, track.duration);
        Ok(track)
    }

    /// Decode an in-memory file.
    pub fn from_bytes(data: Vec<u8>) -> AudioResult<Self> {
        Self::from_reader(Cursor::new(data))
    }

    fn from_reader<R>(reader: R) -> AudioResult<Self>
    where
        R: Read + Seek + Send + Sync + 'static,
    {
        let decoder = Decoder::new(reader).map_err(|e| AudioError::DecodeFailed(e.to_string()))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
        Ok(Self::from_samples(samples, channels, sample_rate))
    }

    /// Wrap interleaved samples.
    #[must_use]
    pub fn from_samples(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let frames = samples.len() as f32 / f32::from(channels.max(1));
        let duration = frames / sample_rate.max(1) as f32;
        Self {
            samples: Arc::new(samples),
            channels,
            sample_rate,
            duration,
        }
    }

    fn source(&self) -> SamplesBuffer<f32> {
        SamplesBuffer::new(self.channels, self.sample_rate, (*self.samples).clone())
    }
}

impl TrackData for RodioTrack {
    fn duration_secs(&self) -> f32 {
        self.duration
    }
}

struct Voice {
    sink: Sink,
    looping: bool,
}

struct Voices {
    next: u64,
    capacity: usize,
    active: HashMap<VoiceId, Voice>,
}

/// A sound effect; each voice gets its own sink.
#[derive(Clone)]
pub struct RodioSound {
    handle: OutputStreamHandle,
    track: RodioTrack,
    voices: Arc<Mutex<Voices>>,
}

impl std::fmt::Debug for RodioSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioSound")
            .field("track", &self.track)
            .field("voices", &self.voices.lock().active.len())
            .finish_non_exhaustive()
    }
}

impl RodioSound {
    /// Create a sound allowing `capacity` simultaneous voices.
    #[must_use]
    pub fn new(handle: OutputStreamHandle, track: RodioTrack, capacity: usize) -> Self {
        Self {
            handle,
            track,
            voices: Arc::new(Mutex::new(Voices {
                next: 0,
                capacity,
                active: HashMap::new(),
            })),
        }
    }

    /// Number of voices still producing audio.
    #[must_use]
    pub fn active_voices(&self) -> usize {
        let mut voices = self.voices.lock();
        voices.active.retain(|_, v| !v.sink.empty());
        voices.active.len()
    }
}

impl SoundPlayback for RodioSound {
    fn play(&self, volume: f32) -> Option<VoiceId> {
        let mut voices = self.voices.lock();
        voices.active.retain(|_, v| !v.sink.empty());
        if voices.active.len() >= voices.capacity {
            return None;
        }

        let sink = match new_sink(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("{}", e);
                return None;
            },
        };
        sink.set_volume(volume);
        sink.append(self.track.source());
        sink.play();

        let voice = VoiceId::new(voices.next);
        voices.next += 1;
        voices.active.insert(
            voice,
            Voice {
                sink,
                looping: false,
            },
        );
        Some(voice)
    }

    fn set_looping(&self, voice: VoiceId, looping: bool) {
        let mut voices = self.voices.lock();
        let Some(v) = voices.active.get_mut(&voice) else {
            return;
        };
        if looping && !v.looping {
            v.sink.append(self.track.source().repeat_infinite());
        } else if !looping && v.looping {
            // The queued repeat never ends on its own.
            v.sink.stop();
        }
        v.looping = looping;
    }

    fn set_volume(&self, voice: VoiceId, volume: f32) {
        if let Some(v) = self.voices.lock().active.get(&voice) {
            v.sink.set_volume(volume);
        }
    }
}

/// A streaming buffer on one sink.
///
/// The sink holds at most the current source; moving to another source
/// replaces the sink. End of a source is detected in
/// [`update`](StreamBuffer::update).
pub struct RodioStream {
    handle: OutputStreamHandle,
    sink: Sink,
    sources: Vec<RodioTrack>,
    current: Option<usize>,
    playing: bool,
    volume: f32,
    looping: bool,
    continuous: bool,
}

impl std::fmt::Debug for RodioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioStream")
            .field("sources", &self.sources.len())
            .field("current", &self.current)
            .field("playing", &self.playing)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

impl RodioStream {
    /// Create an empty buffer.
    pub fn new(handle: OutputStreamHandle) -> AudioResult<Self> {
        let sink = new_sink(&handle)?;
        sink.pause();
        Ok(Self {
            handle,
            sink,
            sources: Vec::new(),
            current: None,
            playing: false,
            volume: 1.0,
            looping: false,
            continuous: false,
        })
    }

    fn reset_sink(&mut self) {
        self.sink.stop();
        match new_sink(&self.handle) {
            Ok(sink) => {
                sink.pause();
                sink.set_volume(self.volume);
                self.sink = sink;
            },
            Err(e) => warn!("Could not replace stream sink: {}", e),
        }
    }

    /// Queue the current source on an empty sink.
    fn load_current(&mut self) {
        if !self.sink.empty() {
            return;
        }
        if let Some(track) = self.current.and_then(|i| self.sources.get(i)) {
            self.sink.append(track.source());
        }
    }

    fn restart(&mut self) {
        self.reset_sink();
        if self.playing {
            self.load_current();
            self.sink.play();
        }
    }
}

impl StreamBuffer for RodioStream {
    type Track = RodioTrack;

    fn add_source(&mut self, track: RodioTrack) {
        self.sources.push(track);
    }

    fn clear_sources(&mut self) {
        self.reset_sink();
        self.sources.clear();
        self.current = None;
        self.playing = false;
    }

    fn play(&mut self) {
        if self.current.is_none() && !self.sources.is_empty() {
            self.current = Some(0);
        }
        if self.current.is_none() {
            return;
        }
        self.load_current();
        self.sink.play();
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
        self.reset_sink();
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> f32 {
        self.sink.get_pos().as_secs_f32()
    }

    fn set_position(&mut self, seconds: f32) -> AudioResult<()> {
        self.load_current();
        let target = seconds.clamp(0.0, self.duration());
        self.sink
            .try_seek(Duration::from_secs_f32(target))
            .map_err(|e| AudioError::SeekFailed {
                position: seconds,
                message: e.to_string(),
            })
    }

    fn jump_to_source(&mut self, index: usize) {
        if index >= self.sources.len() {
            return;
        }
        self.current = Some(index);
        self.restart();
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
        self.restart();
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

    fn source(&self, index: usize) -> Option<&RodioTrack> {
        self.sources.get(index)
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.sink.set_volume(volume);
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

    fn update(&mut self) {
        if !self.playing || !self.sink.empty() {
            return;
        }
        if self.continuous {
            self.advance_source();
        } else if self.looping {
            self.restart();
        } else {
            self.playing = false;
        }
    }
}
