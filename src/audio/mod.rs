//! Audio path: capture, sample conversion, and playback scheduling.
//!
//! This module provides:
//! - Pure PCM resampling and 16-bit wire encoding
//! - A capture pipeline gated on connection readiness
//! - Gapless playback scheduling against a monotonic output clock
//! - cpal implementations of the capture source and audio output

pub mod capture;
pub mod device;
pub mod pcm;
pub mod playback;

pub use capture::{CAPTURE_BLOCK_SAMPLES, CaptureError, CapturePipeline, CaptureSource, WIRE_SAMPLE_RATE};
pub use device::{CpalCaptureSource, CpalOutputFactory};
pub use playback::{
    AudioOutput, AudioOutputFactory, PLAYBACK_SAMPLE_RATE, PlaybackError, PlaybackScheduler,
    ScheduledChunk,
};

/// One block of linear PCM audio, tagged with its rate and channel count.
///
/// Frames are owned by the stage processing them and handed off by move.
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}
