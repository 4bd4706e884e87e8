//! cpal-backed capture source and audio output.
//!
//! All hardware access lives here. Streams run on dedicated threads since
//! cpal::Stream is !Send; control happens through atomic flags.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use log::{error, info, warn};

use super::AudioFrame;
use super::capture::{BlockHandler, CAPTURE_BLOCK_SAMPLES, CaptureError, CaptureSource, WIRE_SAMPLE_RATE};
use super::playback::{AudioOutput, AudioOutputFactory, PLAYBACK_SAMPLE_RATE, PlaybackError, ScheduledChunk};

/// Input device labels tried before falling back to the platform default.
const PREFERRED_INPUT_LABELS: &[&str] = &["built-in", "internal", "macbook"];

fn is_preferred_input(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_INPUT_LABELS.iter().any(|label| lower.contains(label))
}

/// Pick the capture device, preferring a built-in microphone over headsets
/// and virtual devices when several inputs exist.
fn select_input_device(host: &cpal::Host) -> Option<cpal::Device> {
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name()
                && is_preferred_input(&name)
            {
                info!(target: "Capture", "Using preferred input device: {}", name);
                return Some(device);
            }
        }
    }
    host.default_input_device()
}

/// Microphone source delivering fixed-size mono blocks from a dedicated
/// capture thread.
pub struct CpalCaptureSource {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCaptureSource {
    pub fn new() -> Self {
        Self {
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl Default for CpalCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CpalCaptureSource {
    fn start(&mut self, handler: BlockHandler) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Ok(());
        }
        self.stop_signal.store(false, Ordering::Relaxed);

        let stop_signal = self.stop_signal.clone();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let thread = std::thread::spawn(move || {
            run_capture(handler, stop_signal, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::StreamError(
                    "capture thread exited during setup".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    mut handler: BlockHandler,
    stop_signal: Arc<AtomicBool>,
    ready: std_mpsc::Sender<Result<(), CaptureError>>,
) {
    let (stream, buffer, sample_rate) = match open_input() {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::StreamError(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));
    info!(target: "Capture", "Audio capture started at {} Hz", sample_rate);

    while !stop_signal.load(Ordering::Relaxed) {
        let block: Option<Vec<f32>> = {
            let mut buf = buffer.lock().unwrap();
            if buf.len() >= CAPTURE_BLOCK_SAMPLES {
                Some(buf.drain(..CAPTURE_BLOCK_SAMPLES).collect())
            } else {
                None
            }
        };

        match block {
            Some(samples) => handler(AudioFrame {
                samples,
                sample_rate,
                channels: 1,
            }),
            None => std::thread::sleep(std::time::Duration::from_millis(1)),
        }
    }

    drop(stream);
    info!(target: "Capture", "Audio capture stopped");
}

type InputParts = (cpal::Stream, Arc<Mutex<Vec<f32>>>, u32);

fn open_input() -> Result<InputParts, CaptureError> {
    let host = cpal::default_host();
    let device = select_input_device(&host).ok_or(CaptureError::MicrophoneUnavailable)?;

    info!(
        target: "Capture",
        "Capture input device: {}",
        device.name().unwrap_or_default()
    );

    // Ask for the wire rate directly when the device supports it so the
    // resampler becomes a pass-through; otherwise take the device default
    // and downsample per block.
    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| CaptureError::DeviceError(e.to_string()))?
        .collect();

    let mut best_config = None;
    for cfg in &supported {
        let rate_ok = cfg.min_sample_rate().0 <= WIRE_SAMPLE_RATE
            && cfg.max_sample_rate().0 >= WIRE_SAMPLE_RATE;
        if rate_ok && cfg.channels() <= 2 {
            if cfg.channels() == 1 || best_config.is_none() {
                best_config = Some(cfg.with_sample_rate(SampleRate(WIRE_SAMPLE_RATE)));
                if cfg.channels() == 1 {
                    break;
                }
            }
        }
    }

    let config: StreamConfig = match best_config {
        Some(cfg) => cfg.into(),
        None => device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceError(e.to_string()))?
            .into(),
    };

    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;
    info!(
        target: "Capture",
        "Capture config: {} Hz, {} channel(s)", sample_rate, channels
    );

    let buffer = Arc::new(Mutex::new(Vec::with_capacity(CAPTURE_BLOCK_SAMPLES * 2)));
    let buffer_clone = buffer.clone();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut buf = buffer_clone.lock().unwrap();
                if channels == 1 {
                    buf.extend_from_slice(data);
                } else {
                    for chunk in data.chunks(channels) {
                        let mono: f32 = chunk.iter().sum::<f32>() / channels as f32;
                        buf.push(mono);
                    }
                }
            },
            move |err| {
                error!(target: "Capture", "Audio input error: {}", err);
            },
            None,
        )
        .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    Ok((stream, buffer, sample_rate))
}

struct PendingUnit {
    start: u64,
    samples: Vec<f32>,
}

struct OutputShared {
    schedule: Mutex<Vec<PendingUnit>>,
    position: AtomicU64,
}

/// Speaker output rendering scheduled chunks against a sample-counter clock.
///
/// The clock advances with every rendered buffer, so `current_time` tracks
/// real playback progress rather than wall time.
pub struct CpalOutput {
    shared: Arc<OutputShared>,
    stop_signal: Arc<AtomicBool>,
    resume_requested: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalOutput {
    pub fn open() -> Result<Self, PlaybackError> {
        let shared = Arc::new(OutputShared {
            schedule: Mutex::new(Vec::new()),
            position: AtomicU64::new(0),
        });
        let stop_signal = Arc::new(AtomicBool::new(false));
        let resume_requested = Arc::new(AtomicBool::new(false));

        let shared_clone = shared.clone();
        let stop_clone = stop_signal.clone();
        let resume_clone = resume_requested.clone();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let thread = std::thread::spawn(move || {
            run_output(shared_clone, stop_clone, resume_clone, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shared,
                stop_signal,
                resume_requested,
                thread: Mutex::new(Some(thread)),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlaybackError::StreamError(
                    "output thread exited during setup".to_string(),
                ))
            }
        }
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.shared.position.load(Ordering::Relaxed) as f64 / PLAYBACK_SAMPLE_RATE as f64
    }

    fn resume(&self) {
        self.resume_requested.store(true, Ordering::Relaxed);
    }

    fn begin(&self, chunk: ScheduledChunk) {
        let start = (chunk.start_time * PLAYBACK_SAMPLE_RATE as f64).round() as u64;
        let mut schedule = self.shared.schedule.lock().unwrap();
        schedule.push(PendingUnit {
            start,
            samples: chunk.samples,
        });
    }

    fn close(&self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_output(
    shared: Arc<OutputShared>,
    stop_signal: Arc<AtomicBool>,
    resume_requested: Arc<AtomicBool>,
    ready: std_mpsc::Sender<Result<(), PlaybackError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(PlaybackError::NoOutputDevice));
            return;
        }
    };

    info!(
        target: "Playback",
        "Playback output device: {}",
        device.name().unwrap_or_default()
    );

    let supported = match device.supported_output_configs() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::DeviceError(e.to_string())));
            return;
        }
    };

    let mut best_config = None;
    for cfg in supported {
        if cfg.min_sample_rate().0 <= PLAYBACK_SAMPLE_RATE
            && cfg.max_sample_rate().0 >= PLAYBACK_SAMPLE_RATE
        {
            best_config = Some(cfg.with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE)));
            break;
        }
    }

    let config: StreamConfig = match best_config {
        Some(cfg) => cfg.into(),
        None => {
            let _ = ready.send(Err(PlaybackError::NoSupportedConfig));
            return;
        }
    };
    let channels = config.channels as usize;

    info!(
        target: "Playback",
        "Playback config: {} Hz, {} channel(s)", config.sample_rate.0, channels
    );

    let render_shared = shared.clone();
    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let pos = render_shared.position.load(Ordering::Relaxed);
            let frames = data.len() / channels;
            let mut schedule = render_shared.schedule.lock().unwrap();

            for frame_idx in 0..frames {
                let t = pos + frame_idx as u64;
                let mut value = 0.0f32;
                for unit in schedule.iter() {
                    if t >= unit.start {
                        let offset = (t - unit.start) as usize;
                        if offset < unit.samples.len() {
                            value += unit.samples[offset];
                        }
                    }
                }
                for ch in 0..channels {
                    data[frame_idx * channels + ch] = value;
                }
            }

            let new_pos = pos + frames as u64;
            schedule.retain(|unit| unit.start + unit.samples.len() as u64 > new_pos);
            render_shared.position.store(new_pos, Ordering::Relaxed);
        },
        move |err| {
            error!(target: "Playback", "Audio output error: {}", err);
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::StreamError(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(PlaybackError::StreamError(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));
    info!(target: "Playback", "Audio output started");

    while !stop_signal.load(Ordering::Relaxed) {
        if resume_requested.swap(false, Ordering::Relaxed)
            && let Err(e) = stream.play()
        {
            warn!(target: "Playback", "Audio output resume failed: {}", e);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    drop(stream);
    info!(target: "Playback", "Audio output stopped");
}

/// Opens the default speaker as the scheduler's output.
#[derive(Default)]
pub struct CpalOutputFactory;

impl CpalOutputFactory {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutputFactory for CpalOutputFactory {
    fn create(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        Ok(Arc::new(CpalOutput::open()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_input_label_matching() {
        assert!(is_preferred_input("MacBook Pro Microphone"));
        assert!(is_preferred_input("Built-in Audio Analog Stereo"));
        assert!(is_preferred_input("Internal Microphone"));
        assert!(!is_preferred_input("USB Headset"));
    }
}
