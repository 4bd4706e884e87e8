//! Error taxonomy for the voice pipeline.
//!
//! Hardware and transport failures are caught where they happen and surface
//! to the session as one normalized error event; only the session decides to
//! end. These variants are what callers of the library see.

use thiserror::Error;

use crate::audio::{CaptureError, PlaybackError};

#[derive(Debug, Error)]
pub enum VoiceError {
    /// Microphone denied or no usable input device. Fatal to session start.
    #[error("Microphone unavailable: {0}")]
    Permission(String),

    /// Speaker output could not be opened or driven.
    #[error("Audio output failed: {0}")]
    Playback(String),

    /// Handshake failure, transport drop, or remote error event. Fatal to
    /// the session; never retried in place.
    #[error("Agent connection error: {0}")]
    Connection(String),

    /// Unparseable inbound audio. Recovered locally; callers only see this
    /// if they parse chunks themselves.
    #[error("Malformed audio chunk: {0}")]
    MalformedChunk(String),

    /// Missing credential or configuration, checked before any resource is
    /// acquired.
    #[error("Session precondition failed: {0}")]
    Precondition(String),

    /// The final record could not be saved. The in-memory transcript is
    /// still intact and the save may be retried.
    #[error("Failed to persist interview record: {0}")]
    Persistence(String),
}

impl From<CaptureError> for VoiceError {
    fn from(e: CaptureError) -> Self {
        VoiceError::Permission(e.to_string())
    }
}

impl From<PlaybackError> for VoiceError {
    fn from(e: PlaybackError) -> Self {
        VoiceError::Playback(e.to_string())
    }
}
