// Live microphone capture via cpal
//
// The device callback only copies the first channel into pooled buffers (see
// buffer_pool). LiveSource runs on the worker thread: each poll drains the
// queue into the spectrum analyser and captures one frame if anything new
// arrived since the previous tick.
//
// cpal::Stream is not Send, so the stream is opened on the thread that will
// own it for the whole session and dropped there on shutdown.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::analyser::SpectrumAnalyser;
use super::buffer_pool::{BufferPool, CaptureChannels, WorkerChannels};
use super::source::{FrameSource, SourcePoll};
use crate::config::AppConfig;
use crate::error::AudioError;

/// Frame source fed by the capture callback
pub struct LiveSource {
    channels: WorkerChannels,
    analyser: SpectrumAnalyser,
    sample_rate: u32,
    started: Instant,
    stream_failed: Arc<AtomicBool>,
}

impl LiveSource {
    fn new(
        channels: WorkerChannels,
        config: &AppConfig,
        sample_rate: u32,
        stream_failed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            channels,
            analyser: SpectrumAnalyser::new(&config.analyser),
            sample_rate,
            started: Instant::now(),
            stream_failed,
        }
    }
}

impl FrameSource for LiveSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn poll_frame(&mut self) -> SourcePoll {
        if self.stream_failed.load(Ordering::Relaxed) {
            return SourcePoll::Closed;
        }

        let analyser = &mut self.analyser;
        let drained = self
            .channels
            .drain(|samples| analyser.push_samples(samples));

        if drained == 0 {
            SourcePoll::Pending
        } else {
            SourcePoll::Ready(self.analyser.capture(self.sample_rate))
        }
    }

    fn position_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn dropped_blocks(&self) -> u64 {
        self.channels.dropped_blocks()
    }
}

/// A running input stream and the source reading from it
///
/// Dropping this releases the device.
pub struct LiveCapture {
    stream: cpal::Stream,
    source: LiveSource,
    device_name: String,
}

impl LiveCapture {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl FrameSource for LiveCapture {
    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn poll_frame(&mut self) -> SourcePoll {
        self.source.poll_frame()
    }

    fn position_ms(&self) -> u64 {
        self.source.position_ms()
    }

    fn dropped_blocks(&self) -> u64 {
        self.source.dropped_blocks()
    }
}

impl Drop for LiveCapture {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            tracing::warn!("[LiveCapture] Failed to pause input stream: {}", err);
        }
        tracing::info!(device = %self.device_name, "[LiveCapture] Input stream released");
    }
}

/// Open the default input device and start capturing
///
/// Must be called on the thread that will poll the returned source and
/// eventually drop the stream.
pub fn open_default_input(config: &AppConfig) -> Result<LiveCapture, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::NoInputDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .default_input_config()
        .map_err(map_default_config_error)?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();
    let channel_count = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;

    let (capture, worker) = BufferPool::new(
        config.audio.buffer_pool_size.max(1),
        config.audio.buffer_size.max(1),
    );
    let stream_failed = Arc::new(AtomicBool::new(false));

    let stream = build_stream(
        &device,
        &stream_config,
        sample_format,
        capture,
        channel_count,
        Arc::clone(&stream_failed),
    )?;

    stream.play().map_err(|e| AudioError::HardwareError {
        details: format!("Input start failed: {}", e),
    })?;

    tracing::info!(
        device = %device_name,
        sample_rate,
        channels = channel_count,
        format = ?sample_format,
        "[LiveCapture] Input stream started"
    );

    Ok(LiveCapture {
        stream,
        source: LiveSource::new(worker, config, sample_rate, stream_failed),
        device_name,
    })
}

fn build_stream(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mut capture: CaptureChannels,
    channel_count: usize,
    stream_failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError> {
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("[LiveCapture] Input stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            stream_failed.store(true, Ordering::Relaxed);
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                capture.push_interleaved(data, channel_count);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                capture.push_converted(data, channel_count, |s| s as f32 / i16::MAX as f32);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                capture.push_converted(data, channel_count, |s| {
                    (s as f32 - 32_768.0) / 32_768.0
                });
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::UnsupportedFormat {
                format: format!("{:?}", other),
            })
        }
    };

    stream.map_err(map_build_error)
}

fn is_permission_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
}

fn map_default_config_error(err: cpal::DefaultStreamConfigError) -> AudioError {
    match err {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::NoInputDevice,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => AudioError::UnsupportedFormat {
            format: "input stream".to_string(),
        },
        cpal::DefaultStreamConfigError::BackendSpecific { err } => {
            if is_permission_message(&err.description) {
                AudioError::PermissionDenied
            } else {
                AudioError::StreamOpenFailed {
                    reason: err.description,
                }
            }
        }
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
        cpal::BuildStreamError::StreamConfigNotSupported => AudioError::UnsupportedFormat {
            format: "default input config".to_string(),
        },
        cpal::BuildStreamError::BackendSpecific { err } if is_permission_message(&err.description) => {
            AudioError::PermissionDenied
        }
        other => AudioError::StreamOpenFailed {
            reason: other.to_string(),
        },
    }
}
