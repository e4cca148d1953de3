//! # Tidepool Audio
//!
//! Frame-ticked audio mixer for 2D games.
//!
//! This crate provides:
//! - Keyed sound effect instances with per-frame limits and frame-count expiry
//! - Background music with sidechain, crossfade and duck envelopes
//! - A looping ambient foley layer with a slow volume swing and fade-out
//! - Master/music/sound volumes and a global mute switch
//!
//! ## Architecture
//!
//! The mixer never touches samples. It drives external playback services
//! through the traits in [`service`]: a [`SoundPlayback`] per loaded effect,
//! [`StreamBuffer`]s for music, crossfade and foley, and an [`AssetStore`]
//! for streamed tracks. Two backends ship with the crate:
//! - [`headless`]: in-memory services, for servers and tests
//! - `device` (feature `device`): rodio output
//!
//! ## Frame Tick
//!
//! None of the services report that playback finished, so every lifetime
//! and envelope is counted in frames. [`AudioMixer::update`] must be called
//! exactly once per frame and advances sound effects, foley, then music.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
#[cfg(feature = "device")]
pub mod device;
pub mod envelope;
pub mod error;
pub mod foley;
pub mod headless;
pub mod mixer;
pub mod music;
pub mod service;
pub mod sfx;
pub mod volume;

mod e2e_tests;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    #[cfg(feature = "device")]
    pub use crate::device::*;
    pub use crate::envelope::*;
    pub use crate::error::*;
    pub use crate::foley::*;
    pub use crate::headless::*;
    pub use crate::mixer::*;
    pub use crate::music::*;
    pub use crate::service::*;
    pub use crate::sfx::*;
    pub use crate::volume::*;
}

pub use prelude::*;
