//! Microphone capture pipeline.
//!
//! A `CaptureSource` delivers raw blocks from the input hardware; the
//! pipeline resamples each block to the wire rate, encodes it, and forwards
//! it toward the agent connection. Blocks captured before the connection is
//! ready are dropped, never buffered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::mpsc;

use super::AudioFrame;
use super::pcm;
use crate::agent::ConnectionReadiness;

/// Samples per capture block delivered by a source.
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

/// Sample rate the remote agent expects on the wire.
pub const WIRE_SAMPLE_RATE: u32 = 16000;

/// Only this many not-ready drops are logged; after that they are silent.
const MAX_DROP_WARNINGS: u32 = 3;

/// Callback invoked once per captured block, on the capture thread.
pub type BlockHandler = Box<dyn FnMut(AudioFrame) + Send>;

/// A source of raw microphone blocks.
///
/// Implementations deliver fixed-size mono blocks to the handler for the
/// life of the capture. `stop` is idempotent and safe to call before
/// `start`.
pub trait CaptureSource: Send {
    fn start(&mut self, handler: BlockHandler) -> Result<(), CaptureError>;
    fn stop(&mut self);
}

/// Bridges a capture source to the wire format.
pub struct CapturePipeline {
    source: Box<dyn CaptureSource>,
    readiness: ConnectionReadiness,
    outbound: mpsc::UnboundedSender<Bytes>,
    level: Arc<AtomicU32>,
    started: bool,
}

impl CapturePipeline {
    pub fn new(
        source: Box<dyn CaptureSource>,
        readiness: ConnectionReadiness,
        outbound: mpsc::UnboundedSender<Bytes>,
    ) -> Self {
        Self {
            source,
            readiness,
            outbound,
            level: Arc::new(AtomicU32::new(0)),
            started: false,
        }
    }

    /// Begin capture. Each delivered block is resampled to the wire rate,
    /// encoded as PCM16, and forwarded only while the connection reports
    /// ready; otherwise the block is dropped on the capture thread.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.started {
            return Ok(());
        }

        let readiness = self.readiness.clone();
        let outbound = self.outbound.clone();
        let level = self.level.clone();
        let mut dropped: u32 = 0;
        let mut blocks: u64 = 0;

        self.source.start(Box::new(move |frame: AudioFrame| {
            let peak = frame
                .samples
                .iter()
                .fold(0.0f32, |max, s| max.max(s.abs()));
            level.store(peak.to_bits(), Ordering::Relaxed);

            blocks += 1;
            if blocks % 50 == 0 {
                debug!(target: "Capture", "Audio level: {:.3} ({} blocks)", peak, blocks);
            }

            if !readiness.is_ready() {
                dropped += 1;
                if dropped <= MAX_DROP_WARNINGS {
                    warn!(target: "Capture", "Connection not ready, dropping audio block");
                }
                return;
            }

            let wire = pcm::resample(&frame.samples, frame.sample_rate, WIRE_SAMPLE_RATE);
            let encoded = pcm::pcm16_to_bytes(&pcm::encode_pcm16(&wire));
            // A closed receiver means the session is tearing down; the block
            // is dropped like any other not-ready block.
            let _ = outbound.send(Bytes::from(encoded));
        }))?;

        self.started = true;
        Ok(())
    }

    /// Release the source and its hardware handles. Idempotent.
    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// Peak absolute sample value of the most recent block.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub enum CaptureError {
    MicrophoneUnavailable,
    NoSupportedConfig,
    DeviceError(String),
    StreamError(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MicrophoneUnavailable => write!(f, "No usable audio input device"),
            Self::NoSupportedConfig => write!(f, "No supported audio configuration"),
            Self::DeviceError(e) => write!(f, "Audio device error: {}", e),
            Self::StreamError(e) => write!(f, "Audio stream error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}
