//! Gapless playback scheduling for synthesized agent speech.
//!
//! Chunks arrive at irregular sizes and intervals. Each drain pass converts
//! every queued chunk, assigns it a start time on the output clock, then
//! issues all begin instructions in one batch so conversion cost never leaks
//! into playback timing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use super::pcm;

/// Output sample rate for agent speech (matches the wire format).
pub const PLAYBACK_SAMPLE_RATE: u32 = 16000;

/// A converted audio chunk pinned to a position on the output clock.
pub struct ScheduledChunk {
    pub samples: Vec<f32>,
    /// Seconds on the output clock at which rendering begins.
    pub start_time: f64,
    /// Seconds of audio in `samples`.
    pub duration: f64,
}

/// Platform audio output primitive.
///
/// `begin` is fire-and-forget: once issued, the platform renders the chunk on
/// its own clock and this crate never touches it again.
pub trait AudioOutput: Send + Sync {
    /// Monotonic output clock, in seconds.
    fn current_time(&self) -> f64;

    /// Resume a suspended output. Safe to call when already running.
    fn resume(&self);

    /// Schedule `chunk` to render starting at `chunk.start_time`.
    fn begin(&self, chunk: ScheduledChunk);

    /// Release the underlying device.
    fn close(&self);
}

/// Creates the audio output on first use.
pub trait AudioOutputFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError>;
}

struct SchedulerState {
    queue: VecDeque<Vec<u8>>,
    next_play_time: f64,
    draining: bool,
    output: Option<Arc<dyn AudioOutput>>,
}

/// Orders inbound PCM chunks into seamless back-to-back playback.
///
/// Owns the playback queue and the `next_play_time` cursor; nothing else
/// mutates either.
pub struct PlaybackScheduler {
    factory: Arc<dyn AudioOutputFactory>,
    state: Mutex<SchedulerState>,
}

impl PlaybackScheduler {
    pub fn new(factory: Arc<dyn AudioOutputFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(SchedulerState {
                queue: VecDeque::new(),
                next_play_time: 0.0,
                draining: false,
                output: None,
            }),
        }
    }

    /// Create the audio output if it does not exist yet and make sure it is
    /// running. Called eagerly at session start and again on every enqueue.
    pub fn initialize(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().unwrap();
        if state.output.is_none() {
            state.output = Some(self.factory.create()?);
            debug!(target: "Playback", "Audio output created at {} Hz", PLAYBACK_SAMPLE_RATE);
        }
        if let Some(ref output) = state.output {
            output.resume();
        }
        Ok(())
    }

    /// Queue a raw PCM16 chunk for playback and drain if no drain is running.
    ///
    /// Malformed chunks (empty, or too short to hold one sample) are skipped
    /// with a diagnostic and never fail the session.
    pub fn enqueue(&self, chunk: &[u8]) -> Result<(), PlaybackError> {
        if chunk.len() < 2 {
            warn!(target: "Playback", "Skipping audio chunk of {} bytes", chunk.len());
            return Ok(());
        }

        self.initialize()?;

        let start_drain = {
            let mut state = self.state.lock().unwrap();
            state.queue.push_back(chunk.to_vec());
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            self.drain();
        }
        Ok(())
    }

    /// Drain every queued chunk, including ones that arrive mid-pass.
    ///
    /// Exactly one caller runs this at a time (guarded by `draining`), so
    /// `next_play_time` is never raced.
    fn drain(&self) {
        loop {
            let (output, units) = {
                let mut state = self.state.lock().unwrap();
                if state.queue.is_empty() {
                    state.draining = false;
                    return;
                }
                let output = match state.output {
                    Some(ref output) => output.clone(),
                    None => {
                        // Cleared by stop() while chunks were still queued.
                        state.queue.clear();
                        state.draining = false;
                        return;
                    }
                };

                let now = output.current_time();
                if state.next_play_time < now {
                    state.next_play_time = now;
                }

                let mut units = Vec::with_capacity(state.queue.len());
                while let Some(raw) = state.queue.pop_front() {
                    let samples = pcm::pcm16_to_f32(&pcm::bytes_to_pcm16(&raw));
                    if samples.is_empty() {
                        warn!(target: "Playback", "Skipping undecodable audio chunk");
                        continue;
                    }
                    let duration = samples.len() as f64 / PLAYBACK_SAMPLE_RATE as f64;
                    units.push(ScheduledChunk {
                        samples,
                        start_time: state.next_play_time,
                        duration,
                    });
                    state.next_play_time += duration;
                }
                (output, units)
            };

            // All conversion done; begin the whole batch outside the lock.
            for unit in units {
                output.begin(unit);
            }
        }
    }

    /// Barge-in: throw away everything not yet begun and let the next enqueue
    /// re-anchor on the live clock. Chunks already begun keep playing.
    pub fn clear_buffer(&self) {
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.next_play_time = 0.0;
    }

    /// Clear the queue and release the output. Idempotent.
    pub fn stop(&self) {
        let output = {
            let mut state = self.state.lock().unwrap();
            state.queue.clear();
            state.next_play_time = 0.0;
            state.output.take()
        };
        if let Some(output) = output {
            output.close();
        }
    }

    pub fn queued_chunks(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn next_play_time(&self) -> f64 {
        self.state.lock().unwrap().next_play_time
    }
}

#[derive(Debug)]
pub enum PlaybackError {
    NoOutputDevice,
    NoSupportedConfig,
    DeviceError(String),
    StreamError(String),
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOutputDevice => write!(f, "No audio output device found"),
            Self::NoSupportedConfig => write!(f, "No supported audio configuration"),
            Self::DeviceError(e) => write!(f, "Audio device error: {}", e),
            Self::StreamError(e) => write!(f, "Audio stream error: {}", e),
        }
    }
}

impl std::error::Error for PlaybackError {}
