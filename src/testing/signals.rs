//! Deterministic synthetic audio for offline runs and tests.
//!
//! Every generator is a pure function of its [`SignalSpec`]; noise uses a
//! seeded `StdRng` so repeated runs produce identical PCM.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use crate::error::AudioError;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const DEFAULT_SEED: u64 = 0x5A5A_FFF0;

/// Supported waveform patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SignalPattern {
    Silence,
    Sine,
    WhiteNoise,
    /// Harmonic tone at a cry-like pitch, held for the whole duration
    CryTone,
    /// Cry tone for one second, then one second of silence, repeated
    CryBursts,
}

/// Declarative description of a synthetic signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalSpec {
    pub pattern: SignalPattern,
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_frequency_hz() -> f32 {
    420.0
}

fn default_amplitude() -> f32 {
    0.3
}

fn default_duration_ms() -> u32 {
    2_000
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl SignalSpec {
    pub fn new(pattern: SignalPattern) -> Self {
        Self {
            pattern,
            frequency_hz: default_frequency_hz(),
            amplitude: default_amplitude(),
            duration_ms: default_duration_ms(),
            sample_rate: default_sample_rate(),
            seed: default_seed(),
        }
    }

    pub fn with_frequency(mut self, frequency_hz: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn sample_count(&self) -> usize {
        (self.duration_ms as u64 * self.sample_rate as u64 / 1000) as usize
    }

    /// Render the signal as mono PCM
    pub fn generate(&self) -> Vec<f32> {
        let len = self.sample_count();
        match self.pattern {
            SignalPattern::Silence => silence(len),
            SignalPattern::Sine => sine(self.frequency_hz, self.amplitude, self.sample_rate, len),
            SignalPattern::WhiteNoise => white_noise(self.amplitude, len, self.seed),
            SignalPattern::CryTone => {
                cry_tone(self.frequency_hz, self.amplitude, self.sample_rate, len)
            }
            SignalPattern::CryBursts => {
                let mut samples = cry_tone(self.frequency_hz, self.amplitude, self.sample_rate, len);
                let period = self.sample_rate as usize;
                for (i, sample) in samples.iter_mut().enumerate() {
                    if (i / period) % 2 == 1 {
                        *sample = 0.0;
                    }
                }
                samples
            }
        }
    }

    /// Render and write as a 16-bit mono WAV file
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        crate::audio::source::write_wav(path, &self.generate(), self.sample_rate)
    }
}

pub fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

pub fn sine(frequency_hz: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    let step = frequency_hz / sample_rate.max(1) as f32;
    (0..len)
        .map(|i| amplitude * (2.0 * PI * step * i as f32).sin())
        .collect()
}

pub fn white_noise(amplitude: f32, len: usize, seed: u64) -> Vec<f32> {
    let amplitude = amplitude.abs();
    if amplitude == 0.0 {
        return silence(len);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

/// Fundamental plus decaying harmonics below 3 kHz, with a slow tremolo
///
/// Peak amplitude stays at or below `amplitude`.
pub fn cry_tone(fundamental_hz: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    let sample_rate = sample_rate.max(1) as f32;
    let harmonics: Vec<(f32, f32)> = (1..=8)
        .map(|n| (fundamental_hz * n as f32, 1.0 / n as f32))
        .filter(|(freq, _)| *freq < 3_000.0)
        .collect();
    let norm: f32 = harmonics.iter().map(|(_, weight)| weight).sum::<f32>().max(1.0);

    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate;
            let tremolo = 0.85 + 0.15 * (2.0 * PI * 5.0 * t).sin();
            let tone: f32 = harmonics
                .iter()
                .map(|(freq, weight)| weight * (2.0 * PI * freq * t).sin())
                .sum();
            amplitude * tremolo * tone / norm
        })
        .collect()
}
