// SpectrumAnalyser - rolling window + byte magnitude spectrum
//
// Mirrors the behaviour of a browser analyser node, which is what the
// detector thresholds were tuned against:
// - Blackman window over the most recent `fft_size` samples
// - magnitude |X[k]| / N for the first N/2 bins
// - exponential smoothing against the previous spectrum
// - dB conversion mapped linearly from [min_db, max_db] onto 0..=255
//
// The time-domain frame handed out alongside the spectrum is the same
// window, unweighted.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::audio::frame::{AudioFrame, CapturedFrame, SpectrumFrame};
use crate::config::AnalyserConfig;

/// Analysis window size in samples (1024 spectrum bins)
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Weight of the previous spectrum when smoothing
pub const DEFAULT_SMOOTHING: f32 = 0.3;

/// Level mapped to byte 0
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;

/// Level mapped to byte 255
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// Rolling-window spectrum analyser
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    /// Blackman window (pre-computed)
    window: Vec<f32>,
    /// Most recent `fft_size` samples, oldest first
    history: Vec<f32>,
    /// Smoothed linear magnitudes from the previous frame
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyser {
    /// Create an analyser from configuration
    ///
    /// A non power-of-two or tiny `fft_size` is rounded up to the next power
    /// of two, minimum 32, as analyser nodes only accept those sizes.
    pub fn new(config: &AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(32).next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        let window = (0..fft_size)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / fft_size as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            fft,
            fft_size,
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels.max(config.min_decibels + 1.0),
            window,
            history: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append captured samples to the rolling window
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.len() >= self.fft_size {
            self.history
                .copy_from_slice(&samples[samples.len() - self.fft_size..]);
            return;
        }
        self.history.rotate_left(samples.len());
        let start = self.fft_size - samples.len();
        self.history[start..].copy_from_slice(samples);
    }

    /// Snapshot the current window and its byte spectrum
    ///
    /// Each call advances the smoothing state, so call it once per tick.
    pub fn capture(&mut self, sample_rate: u32) -> CapturedFrame {
        let spectrum = self.byte_spectrum();
        CapturedFrame::new(
            AudioFrame::new(self.history.clone(), sample_rate),
            SpectrumFrame::Byte(spectrum),
        )
    }

    /// Clear window and smoothing state
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
    }

    fn byte_spectrum(&mut self) -> Vec<u8> {
        for (slot, (&sample, &w)) in self
            .scratch
            .iter_mut()
            .zip(self.history.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let range = self.max_decibels - self.min_decibels;
        let smoothing = self.smoothing;
        let min_db = self.min_decibels;

        self.smoothed
            .iter_mut()
            .zip(self.scratch.iter())
            .map(|(previous, bin)| {
                let magnitude = bin.norm() * scale;
                *previous = smoothing * *previous + (1.0 - smoothing) * magnitude;

                if *previous <= 0.0 {
                    return 0;
                }
                let db = 20.0 * previous.log10();
                let scaled = (255.0 / range) * (db - min_db);
                scaled.floor().clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}
