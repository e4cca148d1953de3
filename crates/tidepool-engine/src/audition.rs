//! Audition sessions.
//!
//! An audition replays a script of frame-stamped mixer calls, ticking the
//! mixer once per frame, so envelopes can be heard on a real device without
//! a game attached.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tidepool_audio::prelude::*;
use tracing::{debug, info, warn};

/// A sound effect the script refers to by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEntry {
    /// Name used by cues.
    pub name: String,
    /// File path relative to the asset root.
    pub path: String,
}

/// A mixer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CueAction {
    /// Play a registered sound effect.
    PlaySound {
        /// Instance key.
        key: String,
        /// Sound name from the script's sound list.
        sound: String,
        /// Loop until stopped.
        #[serde(default)]
        looping: bool,
        /// Sidechain the music.
        #[serde(default)]
        sidechain: bool,
        /// Explicit volume.
        #[serde(default)]
        volume: Option<f32>,
    },
    /// Stop a sound effect.
    StopSound {
        /// Instance key.
        key: String,
    },
    /// Play music from the start.
    PlayMusic {
        /// Track path.
        path: String,
    },
    /// Switch music keeping the playback spot.
    PlayMusicFromSpot {
        /// Track path.
        path: String,
    },
    /// Start loading a track in the background.
    PreloadMusic {
        /// Track path.
        path: String,
    },
    /// Play a preloaded track.
    PlayLoadedMusic {
        /// Track path.
        path: String,
    },
    /// Stop music.
    StopMusic,
    /// Sidechain the music.
    Sidechain,
    /// Crossfade to a track.
    Crossfade {
        /// Track path.
        path: String,
    },
    /// Duck or un-duck the music.
    Duck {
        /// Duck on.
        on: bool,
    },
    /// Replace the foley layer.
    PlayFoley {
        /// Track path.
        path: String,
    },
    /// Fade out foley.
    FadeOutFoley,
    /// Stop foley.
    StopFoley,
    /// Set master volume.
    MasterVolume {
        /// New volume.
        volume: f32,
    },
    /// Set music volume.
    MusicVolume {
        /// New volume.
        volume: f32,
    },
    /// Set sound volume.
    SoundVolume {
        /// New volume.
        volume: f32,
    },
    /// Turn all output on or off.
    SoundActive {
        /// Output on.
        active: bool,
    },
}

/// A mixer call stamped with the frame it runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Frame the cue fires on, before that frame's tick.
    pub frame: u64,
    /// What to do.
    pub action: CueAction,
}

impl Cue {
    /// Create a cue.
    #[must_use]
    pub fn new(frame: u64, action: CueAction) -> Self {
        Self { frame, action }
    }
}

/// Sound list, cues and length of an audition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditionScript {
    /// Frames to run.
    pub frames: u64,
    /// Sound effects to register.
    pub sounds: Vec<SoundEntry>,
    /// Cues in any order.
    pub cues: Vec<Cue>,
}

impl Default for AuditionScript {
    fn default() -> Self {
        let path = |p: &str| p.to_string();
        Self {
            frames: 900,
            sounds: vec![SoundEntry {
                name: "splash".to_string(),
                path: path("sfx/splash.ogg"),
            }],
            cues: vec![
                Cue::new(0, CueAction::PlayMusic { path: path("music/reef.ogg") }),
                Cue::new(0, CueAction::PlayFoley { path: path("foley/surf.ogg") }),
                Cue::new(0, CueAction::PreloadMusic { path: path("music/trench.ogg") }),
                Cue::new(
                    120,
                    CueAction::PlaySound {
                        key: "splash".to_string(),
                        sound: "splash".to_string(),
                        looping: false,
                        sidechain: true,
                        volume: None,
                    },
                ),
                Cue::new(300, CueAction::Crossfade { path: path("music/trench.ogg") }),
                Cue::new(480, CueAction::Duck { on: true }),
                Cue::new(600, CueAction::Duck { on: false }),
                Cue::new(660, CueAction::FadeOutFoley),
                Cue::new(840, CueAction::StopMusic),
            ],
        }
    }
}

/// Plays an [`AuditionScript`] against a mixer.
pub struct AuditionSession<B: AudioBackend> {
    mixer: AudioMixer<B>,
    sounds: HashMap<String, AssetId>,
    cues: Vec<Cue>,
    next_cue: usize,
    frames: u64,
}

impl<B: AudioBackend> AuditionSession<B> {
    /// Create a session. Cues are ordered by frame, keeping script order
    /// within a frame.
    pub fn new(mixer: AudioMixer<B>, script: &AuditionScript) -> Self {
        let mut cues = script.cues.clone();
        cues.sort_by_key(|cue| cue.frame);
        Self {
            mixer,
            sounds: HashMap::new(),
            cues,
            next_cue: 0,
            frames: script.frames,
        }
    }

    /// Register a sound effect under the name cues use.
    pub fn register_sound(&mut self, name: &str, sound: B::Sound) {
        let id = self.mixer.register_sound(sound);
        self.sounds.insert(name.to_string(), id);
    }

    /// The mixer.
    #[must_use]
    pub fn mixer(&self) -> &AudioMixer<B> {
        &self.mixer
    }

    /// Whether every frame has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.mixer.frame() >= self.frames
    }

    /// Fire the cues of the current frame, then tick the mixer.
    pub fn step(&mut self) {
        let frame = self.mixer.frame();
        while let Some(cue) = self.cues.get(self.next_cue) {
            if cue.frame > frame {
                break;
            }
            let action = cue.action.clone();
            self.next_cue += 1;
            debug!("Frame {}: {:?}", frame, action);
            self.apply(&action);
        }

        self.mixer.update();
    }

    fn apply(&mut self, action: &CueAction) {
        let mixer = &mut self.mixer;
        match action {
            CueAction::PlaySound {
                key,
                sound,
                looping,
                sidechain,
                volume,
            } => {
                let Some(&asset) = self.sounds.get(sound) else {
                    warn!("Cue names unknown sound '{}'", sound);
                    return;
                };
                let mut options = SoundOptions::default()
                    .looping(*looping)
                    .sidechain(*sidechain);
                if let Some(volume) = volume {
                    options = options.volume(*volume);
                }
                mixer.play_sound_with(key, asset, options);
            },
            CueAction::StopSound { key } => mixer.stop_sound(key),
            CueAction::PlayMusic { path } => mixer.play_music(path),
            CueAction::PlayMusicFromSpot { path } => mixer.play_music_from_spot(path),
            CueAction::PreloadMusic { path } => mixer.preload_music(path),
            CueAction::PlayLoadedMusic { path } => mixer.play_loaded_music(path),
            CueAction::StopMusic => mixer.stop_music(),
            CueAction::Sidechain => mixer.sidechain(),
            CueAction::Crossfade { path } => mixer.crossfade(path),
            CueAction::Duck { on } => mixer.set_duck_music(*on),
            CueAction::PlayFoley { path } => mixer.play_foley(path),
            CueAction::FadeOutFoley => mixer.fade_out_foley(),
            CueAction::StopFoley => mixer.stop_foley(),
            CueAction::MasterVolume { volume } => mixer.set_master_volume(*volume),
            CueAction::MusicVolume { volume } => mixer.set_music_volume(*volume),
            CueAction::SoundVolume { volume } => mixer.set_sound_volume(*volume),
            CueAction::SoundActive { active } => mixer.set_sound_active(*active),
        }
    }

    /// Run every remaining frame, calling `pace` after each tick.
    pub fn run(&mut self, mut pace: impl FnMut()) {
        info!("Audition started ({} frames, {} cues)", self.frames, self.cues.len());
        while !self.is_finished() {
            self.step();
            pace();
        }
        info!("Audition finished after {} frames", self.mixer.frame());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(script: &AuditionScript) -> (AuditionSession<HeadlessBackend>, HeadlessSound) {
        let assets = HeadlessAssets::new()
            .with_track("music/reef.ogg", 120.0)
            .with_track("music/trench.ogg", 120.0)
            .with_track("foley/surf.ogg", 30.0);
        let mixer = AudioMixer::new(
            MixerConfig::default(),
            assets,
            HeadlessStream::new(),
            HeadlessStream::new(),
            HeadlessStream::new(),
        );
        let mut session = AuditionSession::new(mixer, script);
        let splash = HeadlessSound::new("splash");
        session.register_sound("splash", splash.clone());
        (session, splash)
    }

    #[test]
    fn test_cues_fire_on_their_frame() {
        let script = AuditionScript {
            frames: 10,
            sounds: Vec::new(),
            cues: vec![
                Cue::new(5, CueAction::Sidechain),
                Cue::new(2, CueAction::PlayMusic {
                    path: "music/reef.ogg".to_string(),
                }),
            ],
        };
        let (mut session, _) = session(&script);

        session.step();
        session.step();
        assert!(!session.mixer().is_music_playing());
        session.step();
        assert!(session.mixer().is_music_playing());

        for _ in 3..5 {
            session.step();
        }
        assert!(!session.mixer().music_envelope().sidechained);
        session.step();
        assert!(session.mixer().music_envelope().sidechained);
    }

    #[test]
    fn test_unknown_sound_is_skipped() {
        let script = AuditionScript {
            frames: 1,
            sounds: Vec::new(),
            cues: vec![Cue::new(0, CueAction::PlaySound {
                key: "k".to_string(),
                sound: "nope".to_string(),
                looping: false,
                sidechain: false,
                volume: None,
            })],
        };
        let (mut session, splash) = session(&script);
        session.step();
        assert!(splash.events().is_empty());
        assert!(session.is_finished());
    }

    #[test]
    fn test_default_script_runs_to_completion() {
        let script = AuditionScript::default();
        let (mut session, splash) = session(&script);

        let mut ticks = 0;
        session.run(|| ticks += 1);

        assert_eq!(ticks, script.frames);
        assert_eq!(splash.voices().len(), 1);
        assert!(!session.mixer().is_music_playing());
        assert!(!session.mixer().is_foley_playing());
    }

    #[test]
    fn test_script_toml_round_trip() {
        let script = AuditionScript::default();
        let text = toml::to_string_pretty(&script).expect("serialize");
        assert!(text.contains("kind = \"crossfade\""));

        let parsed: AuditionScript = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, script);
    }
}
