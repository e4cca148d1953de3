//! # Tidepool Engine
//!
//! Engine glue around the `tidepool-audio` mixer:
//! - [`config`]: TOML engine configuration with mixer and volume tables
//! - [`assets`]: background track decoding behind the `AssetStore` seam
//! - [`timing`]: fixed-tick frame pacing
//! - [`audition`]: scripted mixer sessions
//! - [`backend`]: the rodio device backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod assets;
pub mod audition;
pub mod backend;
pub mod config;
pub mod timing;

pub use assets::AssetLoader;
pub use audition::{AuditionScript, AuditionSession, Cue, CueAction, SoundEntry};
pub use backend::{open_mixer, DeviceBackend};
pub use config::EngineConfig;
pub use timing::FrameClock;
