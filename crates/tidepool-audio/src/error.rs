//! Error types for the audio collaborators.
//!
//! The mixer's public surface never returns these: playback is
//! fire-and-forget and failures degrade to a skipped sound. They only cross
//! the seams where a collaborator can genuinely fail (asset loading, seeking,
//! opening the output device).

use std::path::PathBuf;

use thiserror::Error;

/// Audio collaborator error types.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Track was requested before the asset store finished loading it.
    #[error("Audio asset not loaded: {0}")]
    NotLoaded(String),

    /// Failed to load an audio file.
    #[error("Failed to load audio file '{path}': {message}")]
    LoadFailed {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to decode audio data.
    #[error("Failed to decode audio: {0}")]
    DecodeFailed(String),

    /// Streaming buffer refused a position change.
    #[error("Failed to seek to {position:.3}s: {message}")]
    SeekFailed {
        /// Requested position in seconds.
        position: f32,
        /// Error message.
        message: String,
    },

    /// Failed to open the output device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),
}

/// Result type for audio collaborator operations.
pub type AudioResult<T> = Result<T, AudioError>;
