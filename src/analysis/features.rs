// FeatureExtractor - per-frame loudness and band energy ratios
//
// Features extracted:
// 1. Loudness: RMS of the time-domain window scaled by 1000 so thresholds
//    sit on a convenient integer scale
// 2. Fundamental ratio: mean normalized energy over 300-500 Hz (cry pitch)
// 3. Harmonic ratio: mean normalized energy over 500-3000 Hz (overtones)
// 4. High-frequency ratio: mean normalized energy above 3000 Hz
// 5. Good distribution: fundamental ratio exceeds high-frequency ratio
//
// Band edges map to bins with bin_width = (sample_rate / 2) / (bins - 1),
// floored. The edge bin between fundamental and harmonic bands is counted in
// both, and each ratio divides by its inclusive bin count, so no divisor can
// reach zero.

use crate::audio::frame::{AudioFrame, SpectrumFrame};
use crate::config::{BandConfig, DetectionConfig};

/// Loudness = RMS × this
pub const LOUDNESS_SCALE: f32 = 1000.0;

/// Lower edge of the fundamental band
pub const FUNDAMENTAL_LOW_HZ: f32 = 300.0;

/// Upper edge of the fundamental band, lower edge of the harmonic band
pub const FUNDAMENTAL_HIGH_HZ: f32 = 500.0;

/// Upper edge of the harmonic band; everything above is "high"
pub const HARMONIC_HIGH_HZ: f32 = 3000.0;

/// Scalar features of one frame
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureSample {
    pub loudness: f32,
    pub fundamental_ratio: f32,
    pub harmonic_ratio: f32,
    pub high_freq_ratio: f32,
    pub good_distribution: bool,
    /// Mean energy across all bins (diagnostic only)
    pub average_energy: f32,
}

impl FeatureSample {
    /// Build a sample from ratios directly, deriving `good_distribution`
    pub fn from_parts(
        loudness: f32,
        fundamental_ratio: f32,
        harmonic_ratio: f32,
        high_freq_ratio: f32,
    ) -> Self {
        Self {
            loudness,
            fundamental_ratio,
            harmonic_ratio,
            high_freq_ratio,
            good_distribution: fundamental_ratio > high_freq_ratio,
            average_energy: 0.0,
        }
    }
}

/// Inclusive bin indices of the three bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    pub fundamental_start: usize,
    pub fundamental_end: usize,
    pub harmonic_end: usize,
    pub bin_count: usize,
}

impl BandLayout {
    /// Derive bin indices for a spectrum of `bin_count` bins (≥ 2)
    ///
    /// Indices are clamped to the last bin so a low sample rate cannot push
    /// an edge past the spectrum.
    pub fn new(bands: &BandConfig, sample_rate: u32, bin_count: usize) -> Self {
        debug_assert!(bin_count >= 2);
        let last = bin_count - 1;
        let bin_width = (sample_rate as f32 / 2.0) / last as f32;
        let to_bin = |hz: f32| ((hz / bin_width).floor().max(0.0) as usize).min(last);

        let fundamental_start = to_bin(bands.fundamental_low_hz);
        let fundamental_end = to_bin(bands.fundamental_high_hz).max(fundamental_start);
        let harmonic_end = to_bin(bands.harmonic_high_hz).max(fundamental_end);

        Self {
            fundamental_start,
            fundamental_end,
            harmonic_end,
            bin_count,
        }
    }

    pub fn fundamental_width(&self) -> usize {
        self.fundamental_end - self.fundamental_start + 1
    }

    pub fn harmonic_width(&self) -> usize {
        self.harmonic_end - self.fundamental_end + 1
    }

    /// Bins above the harmonic band, counted from the harmonic edge
    pub fn high_width(&self) -> usize {
        self.bin_count - self.harmonic_end
    }
}

/// Computes a [`FeatureSample`] from a validated frame
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    bands: BandConfig,
    loudness_scale: f32,
    /// Cached layout keyed by (sample_rate, bin_count)
    layout: Option<(u32, BandLayout)>,
}

impl FeatureExtractor {
    pub fn new(bands: BandConfig, detection: &DetectionConfig) -> Self {
        Self {
            bands,
            loudness_scale: detection.loudness_scale,
            layout: None,
        }
    }

    /// Extract features from an aligned frame/spectrum pair
    ///
    /// Callers validate the frame first: non-empty samples and at least
    /// two spectrum bins.
    pub fn extract(&mut self, audio: &AudioFrame, spectrum: &SpectrumFrame) -> FeatureSample {
        let loudness = compute_loudness(audio.samples(), self.loudness_scale);
        let layout = self.layout_for(audio.sample_rate(), spectrum.len());

        let mut fundamental = 0.0_f32;
        let mut harmonic = 0.0_f32;
        let mut high = 0.0_f32;
        let mut total = 0.0_f32;

        for (bin, energy) in spectrum.energies().enumerate() {
            total += energy;
            if bin >= layout.fundamental_start && bin <= layout.fundamental_end {
                fundamental += energy;
            }
            if bin >= layout.fundamental_end && bin <= layout.harmonic_end {
                harmonic += energy;
            }
            if bin > layout.harmonic_end {
                high += energy;
            }
        }

        let fundamental_ratio = fundamental / layout.fundamental_width() as f32;
        let harmonic_ratio = harmonic / layout.harmonic_width() as f32;
        let high_freq_ratio = high / layout.high_width() as f32;

        FeatureSample {
            loudness,
            fundamental_ratio,
            harmonic_ratio,
            high_freq_ratio,
            good_distribution: fundamental_ratio > high_freq_ratio,
            average_energy: total / layout.bin_count as f32,
        }
    }

    fn layout_for(&mut self, sample_rate: u32, bin_count: usize) -> BandLayout {
        match self.layout {
            Some((rate, layout)) if rate == sample_rate && layout.bin_count == bin_count => layout,
            _ => {
                let layout = BandLayout::new(&self.bands, sample_rate, bin_count);
                self.layout = Some((sample_rate, layout));
                layout
            }
        }
    }
}

/// RMS of the window times `scale`
pub fn compute_loudness(samples: &[f32], scale: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt() * scale
}
