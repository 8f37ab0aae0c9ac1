//! Capture resources.
//!
//! A [`CaptureProvider`] hands out at most one [`CaptureHandle`] per session.
//! The handle is the capture resource: it is read once per cycle and released
//! by dropping it.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on macOS).
//! Handles are therefore not required to be `Send`: the sampling worker acquires,
//! reads and drops its handle on the same OS thread. Providers only need to be
//! `Send` so they can be lent to that thread.

pub mod device;
pub mod wav;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
};

use std::sync::Arc;

#[cfg(feature = "audio-cpal")]
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::warn;

#[cfg(feature = "audio-cpal")]
use tracing::{error, info};

use crate::{
    buffering::{AudioBlock, RING_CAPACITY},
    error::{OvationError, Result},
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::{
    create_audio_ring, AudioConsumer, AudioProducer, Producer, RecentWindow,
};

pub use wav::WavFileCapture;

/// Block length of the browser analyser the thresholds were tuned against.
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

/// Source of capture resources (microphone, file, test script).
pub trait CaptureProvider: Send + 'static {
    /// Open a capture resource.
    ///
    /// # Errors
    /// Any error here is an acquisition failure: permission denied, device
    /// missing, unreadable file.
    fn acquire(&mut self) -> Result<Box<dyn CaptureHandle>>;

    /// Short human-readable label for logs.
    fn describe(&self) -> String {
        "capture".into()
    }
}

/// An acquired capture resource. Dropping it releases the underlying device.
pub trait CaptureHandle {
    /// Return the next block. Must not wait for the cycle cadence.
    ///
    /// # Errors
    /// A failure here ends the session.
    fn read_block(&mut self) -> Result<AudioBlock>;
}

/// Shared handle to any [`CaptureProvider`].
///
/// Uses `parking_lot::Mutex` so a panicking worker does not poison the provider
/// for the next `start()`.
#[derive(Clone)]
pub struct CaptureSource(pub Arc<Mutex<dyn CaptureProvider>>);

impl CaptureSource {
    pub fn new<P: CaptureProvider>(provider: P) -> Self {
        Self(Arc::new(Mutex::new(provider)))
    }

    pub fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        self.0.lock().acquire()
    }

    pub fn describe(&self) -> String {
        self.0.lock().describe()
    }
}

impl std::fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSource").finish_non_exhaustive()
    }
}

/// Live microphone capture settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Samples per block returned by `read_block`. Default: 2048.
    pub block_size: usize,
    /// Ring buffer capacity between the audio callback and the worker.
    pub ring_capacity: usize,
    /// Input device name to prefer over the system default.
    pub preferred_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            ring_capacity: RING_CAPACITY,
            preferred_device: None,
        }
    }
}

/// Microphone capture through cpal.
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    config: CaptureConfig,
}

impl CpalCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

/// Acquired microphone stream.
///
/// **Not `Send`**: holds the cpal stream. Each read drains the ring and returns
/// the latest `block_size` mono samples.
#[cfg(feature = "audio-cpal")]
pub struct CpalHandle {
    /// Kept alive so the stream is not dropped prematurely.
    _stream: Stream,
    consumer: AudioConsumer,
    window: RecentWindow,
    scratch: Vec<f32>,
    /// Set by the stream error callback.
    faulted: Arc<AtomicBool>,
    /// Shared with the data callback; cleared on release so it no-ops.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl CaptureHandle for CpalHandle {
    fn read_block(&mut self) -> Result<AudioBlock> {
        if self.faulted.load(Ordering::Acquire) {
            return Err(OvationError::CaptureRead(
                "input stream reported an error".into(),
            ));
        }
        self.window.drain_from(&mut self.consumer, &mut self.scratch);
        Ok(AudioBlock::from_f32(
            self.window.as_slice().to_vec(),
            self.sample_rate,
        ))
    }
}

#[cfg(feature = "audio-cpal")]
impl Drop for CpalHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(feature = "audio-cpal")]
impl CaptureProvider for CpalCapture {
    fn acquire(&mut self) -> Result<Box<dyn CaptureHandle>> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred_name) = self.config.preferred_device.as_deref() {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == preferred_name)
                            .unwrap_or(false)
                    });

                    if selected_device.is_none() {
                        warn!(
                            "preferred input device '{}' not found, falling back",
                            preferred_name
                        );
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected_device {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| OvationError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(OvationError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| OvationError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = create_audio_ring(self.config.ring_capacity);
        let running = Arc::new(AtomicBool::new(true));
        let faulted = Arc::new(AtomicBool::new(false));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_stream::<f32, _>(
                &device,
                &config,
                producer,
                Arc::clone(&running),
                Arc::clone(&faulted),
                |s| s,
            ),
            SampleFormat::I16 => build_mono_stream::<i16, _>(
                &device,
                &config,
                producer,
                Arc::clone(&running),
                Arc::clone(&faulted),
                |s| s as f32 / 32768.0,
            ),
            SampleFormat::U8 => build_mono_stream::<u8, _>(
                &device,
                &config,
                producer,
                Arc::clone(&running),
                Arc::clone(&faulted),
                |s| (s as f32 - 128.0) / 128.0,
            ),
            fmt => {
                return Err(OvationError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| OvationError::AudioStream(e.to_string()))?;

        let block_size = self.config.block_size.max(1);
        Ok(Box::new(CpalHandle {
            _stream: stream,
            consumer,
            window: RecentWindow::new(block_size),
            scratch: vec![0.0; block_size],
            faulted,
            running,
            sample_rate,
        }))
    }

    fn describe(&self) -> String {
        match self.config.preferred_device.as_deref() {
            Some(name) => format!("microphone '{name}'"),
            None => "default microphone".into(),
        }
    }
}

/// Build an input stream that mixes every frame down to mono f32 and pushes it
/// into `producer`. The data callback never allocates after its first call.
#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T, F>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    to_f32: F,
) -> Result<Stream>
where
    T: SizedSample,
    F: Fn(T) -> f32 + Send + 'static,
{
    let ch = usize::from(config.channels.max(1));
    let mut mix_buf: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (f, slot) in mix_buf.iter_mut().enumerate() {
                    let base = f * ch;
                    let sum: f32 = data[base..base + ch].iter().map(|&s| to_f32(s)).sum();
                    *slot = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    warn!("ring buffer full: dropped {} frames", mix_buf.len() - written);
                }
            },
            move |err| {
                error!("audio stream error: {err}");
                faulted.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| OvationError::AudioStream(e.to_string()))
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl CaptureProvider for CpalCapture {
    fn acquire(&mut self) -> Result<Box<dyn CaptureHandle>> {
        warn!(
            block_size = self.config.block_size,
            "microphone capture requested without audio-cpal"
        );
        Err(OvationError::CaptureUnavailable(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_describes_its_provider() {
        let source = CaptureSource::new(CpalCapture::new(CaptureConfig {
            preferred_device: Some("USB Mic".into()),
            ..CaptureConfig::default()
        }));
        let label = source.describe();
        #[cfg(feature = "audio-cpal")]
        assert_eq!(label, "microphone 'USB Mic'");
        #[cfg(not(feature = "audio-cpal"))]
        assert_eq!(label, "capture");
    }

    #[cfg(not(feature = "audio-cpal"))]
    #[test]
    fn microphone_is_unavailable_without_audio_cpal() {
        let err = CpalCapture::default()
            .acquire()
            .err()
            .expect("stub must refuse");
        assert!(matches!(err, OvationError::CaptureUnavailable(_)));
        assert!(err.is_acquisition());
    }
}
