//! Global volume settings shared by every mixer section.

use serde::{Deserialize, Serialize};

/// Master, music and sound volumes plus the global sound switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Master volume (0.0 - 1.0).
    pub master: f32,
    /// Music volume (0.0 - 1.0).
    pub music: f32,
    /// Sound effects and foley volume (0.0 - 1.0).
    pub sound: f32,
    /// Global sound switch. When off every output volume is 0.
    pub enabled: bool,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 1.0,
            sound: 1.0,
            enabled: true,
        }
    }
}

impl VolumeSettings {
    /// Set master volume.
    pub fn set_master(&mut self, volume: f32) {
        self.master = volume.clamp(0.0, 1.0);
    }

    /// Set music volume.
    pub fn set_music(&mut self, volume: f32) {
        self.music = volume.clamp(0.0, 1.0);
    }

    /// Set sound volume.
    pub fn set_sound(&mut self, volume: f32) {
        self.sound = volume.clamp(0.0, 1.0);
    }

    /// Music at full envelope: `music × master`.
    #[must_use]
    pub fn effective_music(&self) -> f32 {
        self.music * self.master
    }

    /// Sound at full envelope: `sound × master`.
    #[must_use]
    pub fn effective_sound(&self) -> f32 {
        self.sound * self.master
    }

    /// The value actually pushed to a playback service for an envelope
    /// volume `volume`.
    #[must_use]
    pub fn emit(&self, volume: f32) -> f32 {
        if self.enabled {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Clamp every scalar into range.
    pub fn validate(&mut self) {
        self.master = self.master.clamp(0.0, 1.0);
        self.music = self.music.clamp(0.0, 1.0);
        self.sound = self.sound.clamp(0.0, 1.0);
    }
}
