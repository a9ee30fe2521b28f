//! Frame sources feeding the detector worker.
//!
//! A source is polled once per tick. It answers with a frame, with
//! `Pending` when no new audio has arrived since the last tick, or with
//! `Closed` once it will never produce another frame. The live microphone
//! source lives in `engine_cpal`; the offline sources here replay PCM
//! (decoded WAV or synthetic) or pre-built frames deterministically.

use std::collections::VecDeque;
use std::path::Path;

use crate::audio::analyser::SpectrumAnalyser;
use crate::audio::frame::CapturedFrame;
use crate::config::AppConfig;
use crate::error::AudioError;

/// Result of polling a source for the next tick
#[derive(Debug)]
pub enum SourcePoll {
    Ready(CapturedFrame),
    Pending,
    Closed,
}

/// Anything that can deliver aligned frame/spectrum pairs tick by tick
pub trait FrameSource {
    fn sample_rate(&self) -> u32;
    fn poll_frame(&mut self) -> SourcePoll;
    /// Stream position of the most recent frame
    fn position_ms(&self) -> u64;
    /// Capture blocks lost before reaching the worker
    fn dropped_blocks(&self) -> u64 {
        0
    }
}

/// Tick length used by scripted frames (one display refresh at 60 Hz)
pub const SCRIPTED_TICK_MS: u64 = 16;

/// Replays a fixed list of frames, then closes
pub struct ScriptedSource {
    sample_rate: u32,
    frames: VecDeque<CapturedFrame>,
    delivered: u64,
    tick_ms: u64,
    hold_open: bool,
}

impl ScriptedSource {
    pub fn new(sample_rate: u32, frames: impl IntoIterator<Item = CapturedFrame>) -> Self {
        Self {
            sample_rate,
            frames: frames.into_iter().collect(),
            delivered: 0,
            tick_ms: SCRIPTED_TICK_MS,
            hold_open: false,
        }
    }

    /// Report `Pending` instead of `Closed` once the frames run out
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn poll_frame(&mut self) -> SourcePoll {
        match self.frames.pop_front() {
            Some(frame) => {
                self.delivered += 1;
                SourcePoll::Ready(frame)
            }
            None if self.hold_open => SourcePoll::Pending,
            None => SourcePoll::Closed,
        }
    }

    fn position_ms(&self) -> u64 {
        self.delivered.saturating_sub(1) * self.tick_ms
    }
}

/// Replays mono PCM through the spectrum analyser, `hop` samples per tick
pub struct PcmSource {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
    hop: usize,
    analyser: SpectrumAnalyser,
}

impl PcmSource {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, config: &AppConfig) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
            hop: config.audio.hop_size.max(1),
            analyser: SpectrumAnalyser::new(&config.analyser),
        }
    }

    /// Decode a WAV file (downmixed to mono) into a source
    pub fn from_wav<P: AsRef<Path>>(path: P, config: &AppConfig) -> Result<Self, AudioError> {
        let (samples, sample_rate) = read_wav(path.as_ref())?;
        Ok(Self::from_samples(samples, sample_rate, config))
    }

    pub fn total_ticks(&self) -> usize {
        self.samples.len().div_ceil(self.hop)
    }
}

impl FrameSource for PcmSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn poll_frame(&mut self) -> SourcePoll {
        if self.cursor >= self.samples.len() {
            return SourcePoll::Closed;
        }
        let end = (self.cursor + self.hop).min(self.samples.len());
        self.analyser.push_samples(&self.samples[self.cursor..end]);
        self.cursor = end;
        SourcePoll::Ready(self.analyser.capture(self.sample_rate))
    }

    /// Milliseconds of audio consumed so far
    fn position_ms(&self) -> u64 {
        (self.cursor as u64 * 1000) / self.sample_rate.max(1) as u64
    }
}

fn load_error(path: &Path, detail: impl std::fmt::Display) -> AudioError {
    AudioError::FixtureLoadFailed {
        reason: format!("{}: {detail}", path.display()),
    }
}

/// Read a WAV file as mono f32 samples plus its sample rate
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| load_error(path, err))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(load_error(path, "zero channels"));
    }
    if spec.sample_rate == 0 {
        return Err(load_error(path, "zero sample rate"));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| load_error(path, err)))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / i8::MAX as f32)
                        .map_err(|err| load_error(path, err))
                })
                .collect::<Result<Vec<f32>, _>>()?,
            16 => reader
                .samples::<i16>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / i16::MAX as f32)
                        .map_err(|err| load_error(path, err))
                })
                .collect::<Result<Vec<f32>, _>>()?,
            24 => reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / 8_388_607.0)
                        .map_err(|err| load_error(path, err))
                })
                .collect::<Result<Vec<f32>, _>>()?,
            32 => reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|v| v as f32 / i32::MAX as f32)
                        .map_err(|err| load_error(path, err))
                })
                .collect::<Result<Vec<f32>, _>>()?,
            bits => {
                return Err(load_error(
                    path,
                    format!("unsupported bits_per_sample={}", bits),
                ))
            }
        },
    };

    if spec.channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let channels = spec.channels as usize;
    let mono = samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

/// Write mono f32 samples as a 16-bit PCM WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|err| load_error(path, err))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|err| load_error(path, err))?;
    }
    writer.finalize().map_err(|err| load_error(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{AudioFrame, SpectrumFrame};

    fn temp_wav(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("cry_detector_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_scripted_source_replays_then_closes() {
        let frame = CapturedFrame::new(
            AudioFrame::new(vec![0.0; 4], 8_000),
            SpectrumFrame::Byte(vec![0; 2]),
        );
        let mut source = ScriptedSource::new(8_000, vec![frame.clone(), frame]);
        assert_eq!(source.remaining(), 2);
        assert!(matches!(source.poll_frame(), SourcePoll::Ready(_)));
        assert_eq!(source.position_ms(), 0);
        assert!(matches!(source.poll_frame(), SourcePoll::Ready(_)));
        assert_eq!(source.position_ms(), SCRIPTED_TICK_MS);
        assert!(matches!(source.poll_frame(), SourcePoll::Closed));
    }

    #[test]
    fn test_custom_tick_sets_position() {
        let frame = CapturedFrame::new(
            AudioFrame::new(vec![0.0; 4], 8_000),
            SpectrumFrame::Byte(vec![0; 2]),
        );
        let mut source = ScriptedSource::new(8_000, vec![frame; 3]).with_tick_ms(10);
        while let SourcePoll::Ready(_) = source.poll_frame() {}
        assert_eq!(source.position_ms(), 20);
    }

    #[test]
    fn test_held_open_source_stays_pending() {
        let mut source = ScriptedSource::new(8_000, Vec::new()).hold_open();
        assert!(matches!(source.poll_frame(), SourcePoll::Pending));
        assert!(matches!(source.poll_frame(), SourcePoll::Pending));
    }

    #[test]
    fn test_pcm_source_tick_count() {
        let config = AppConfig::default();
        let mut source = PcmSource::from_samples(vec![0.0; 2000], 44_100, &config);
        assert_eq!(source.total_ticks(), 3);

        let mut ticks = 0;
        while let SourcePoll::Ready(frame) = source.poll_frame() {
            assert!(frame.validate().is_ok());
            ticks += 1;
        }
        assert_eq!(ticks, 3);
        assert_eq!(source.position_ms(), 45);
    }

    #[test]
    fn test_wav_roundtrip_preserves_rate_and_length() {
        let path = temp_wav("roundtrip");
        let samples: Vec<f32> = (0..1000).map(|i| ((i % 50) as f32 / 50.0) - 0.5).collect();
        write_wav(&path, &samples, 16_000).unwrap();

        let (decoded, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(decoded.len(), samples.len());
        assert!((decoded[10] - samples[10]).abs() < 1e-3);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_wav_is_load_error() {
        let result = PcmSource::from_wav("/nonexistent/cry.wav", &AppConfig::default());
        assert!(matches!(result, Err(AudioError::FixtureLoadFailed { .. })));
    }
}
