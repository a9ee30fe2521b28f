// Classifier - rule-based cry verdict
//
// Combines the current frame's features with the consistency counts from the
// temporal smoother. A frame is crying only when all three hold:
//
// 1. Volume and pattern: loudness > 12 and at least 4 of the last 8 frames
//    were loud (> 10)
// 2. Frequency profile: (fundamental > 0.1 or harmonics > 0.05) and at least
//    3 of the last 8 frames carried fundamental energy (> 0.08)
// 3. Good distribution: fundamental band outweighs the high band
//
// Pure function of its inputs; thresholds come from DetectionConfig.

use crate::analysis::features::FeatureSample;
use crate::analysis::smoother::ConsistencyCounts;
use crate::config::DetectionConfig;

/// Loudness the current frame must exceed
pub const SUFFICIENT_VOLUME_THRESHOLD: f32 = 12.0;

/// Fundamental ratio for a strong cry pitch
pub const STRONG_FUNDAMENTAL_THRESHOLD: f32 = 0.1;

/// Harmonic ratio for audible overtones
pub const HARMONICS_THRESHOLD: f32 = 0.05;

/// Loud frames required among the recent window
pub const CONSISTENT_HIGH_ENERGY_MIN: usize = 4;

/// Fundamental-pattern frames required among the recent window
pub const CONSISTENT_FREQ_MIN: usize = 3;

/// Individual gate results behind a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerdictBreakdown {
    pub sufficient_volume: bool,
    pub consistent_pattern: bool,
    pub freq_consistency: bool,
    pub strong_fundamental: bool,
    pub harmonics: bool,
    pub good_distribution: bool,
}

impl VerdictBreakdown {
    pub fn volume_and_pattern(&self) -> bool {
        self.sufficient_volume && self.consistent_pattern
    }

    pub fn frequency_profile(&self) -> bool {
        (self.strong_fundamental || self.harmonics) && self.freq_consistency
    }

    /// Final verdict
    pub fn is_crying(&self) -> bool {
        self.volume_and_pattern() && self.frequency_profile() && self.good_distribution
    }
}

/// Applies the cry rules with configured thresholds
#[derive(Debug, Clone)]
pub struct Classifier {
    sufficient_volume: f32,
    strong_fundamental: f32,
    harmonics: f32,
    consistent_high_energy_min: usize,
    consistent_freq_min: usize,
}

impl Classifier {
    /// Create a classifier from detection thresholds
    ///
    /// # Arguments
    /// * `config` - Thresholds; defaults match the calibrated constants above
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            sufficient_volume: config.sufficient_volume,
            strong_fundamental: config.strong_fundamental,
            harmonics: config.harmonics,
            consistent_high_energy_min: config.consistent_high_energy_min,
            consistent_freq_min: config.consistent_freq_min,
        }
    }

    /// Evaluate every gate for one frame
    ///
    /// # Arguments
    /// * `features` - Current frame features
    /// * `counts` - Consistency counts including the current frame
    ///
    /// # Returns
    /// The gate results; `is_crying()` gives the verdict
    pub fn breakdown(
        &self,
        features: &FeatureSample,
        counts: &ConsistencyCounts,
    ) -> VerdictBreakdown {
        VerdictBreakdown {
            sufficient_volume: features.loudness > self.sufficient_volume,
            consistent_pattern: counts.high_energy >= self.consistent_high_energy_min,
            freq_consistency: counts.freq_pattern >= self.consistent_freq_min,
            strong_fundamental: features.fundamental_ratio > self.strong_fundamental,
            harmonics: features.harmonic_ratio > self.harmonics,
            good_distribution: features.good_distribution,
        }
    }

    /// Boolean verdict for one frame
    pub fn classify(&self, features: &FeatureSample, counts: &ConsistencyCounts) -> bool {
        self.breakdown(features, counts).is_crying()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
