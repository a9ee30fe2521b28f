//! Hand-built frame/spectrum pairs with known feature values.
//!
//! These bypass the spectrum analyser so the classifier and state tracker can
//! be driven with exact band ratios.

use crate::analysis::features::BandLayout;
use crate::audio::frame::{AudioFrame, CapturedFrame, SpectrumFrame};
use crate::config::BandConfig;

pub const FRAME_SAMPLE_RATE: u32 = 44_100;
pub const FRAME_BINS: usize = 1024;

/// Per-band spectrum levels plus the constant sample value of the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameProfile {
    /// Constant sample value; loudness is `amplitude × 1000`
    pub amplitude: f32,
    pub fundamental: f32,
    pub harmonic: f32,
    pub high: f32,
}

impl FrameProfile {
    /// Loudness 50, fundamental 0.5, harmonic 0.5, high ≈ 0.1
    pub fn cry() -> Self {
        Self {
            amplitude: 0.05,
            fundamental: 0.5,
            harmonic: 0.5,
            high: 0.1,
        }
    }

    pub fn silence() -> Self {
        Self {
            amplitude: 0.0,
            fundamental: 0.0,
            harmonic: 0.0,
            high: 0.0,
        }
    }

    /// Loud broadband hiss dominated by the high band
    pub fn hiss() -> Self {
        Self {
            amplitude: 0.08,
            fundamental: 0.05,
            harmonic: 0.2,
            high: 0.6,
        }
    }

    /// Build the frame at 44.1 kHz with 1024 normalized bins
    pub fn frame(&self) -> CapturedFrame {
        let layout = BandLayout::new(&BandConfig::default(), FRAME_SAMPLE_RATE, FRAME_BINS);
        let bins = (0..FRAME_BINS)
            .map(|bin| {
                if bin >= layout.fundamental_start && bin < layout.fundamental_end {
                    self.fundamental
                } else if bin == layout.fundamental_end {
                    // Shared edge bin; keep both band means exact when levels match
                    self.fundamental.min(self.harmonic)
                } else if bin > layout.fundamental_end && bin <= layout.harmonic_end {
                    self.harmonic
                } else if bin > layout.harmonic_end {
                    self.high
                } else {
                    0.0
                }
            })
            .collect();

        CapturedFrame::new(
            AudioFrame::new(vec![self.amplitude; FRAME_BINS * 2], FRAME_SAMPLE_RATE),
            SpectrumFrame::Normalized(bins),
        )
    }
}

/// `count` copies of the profile's frame
pub fn repeat(profile: FrameProfile, count: usize) -> Vec<CapturedFrame> {
    let frame = profile.frame();
    vec![frame; count]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::FeatureExtractor;
    use crate::config::DetectionConfig;

    #[test]
    fn test_cry_profile_features() {
        let frame = FrameProfile::cry().frame();
        assert!(frame.validate().is_ok());

        let mut extractor = FeatureExtractor::new(BandConfig::default(), &DetectionConfig::default());
        let features = extractor.extract(&frame.audio, &frame.spectrum);
        assert!((features.loudness - 50.0).abs() < 1e-2);
        assert!((features.fundamental_ratio - 0.5).abs() < 1e-6);
        assert!((features.harmonic_ratio - 0.5).abs() < 1e-6);
        assert!((features.high_freq_ratio - 0.1).abs() < 1e-3);
        assert!(features.good_distribution);
    }

    #[test]
    fn test_hiss_profile_is_bad_distribution() {
        let frame = FrameProfile::hiss().frame();
        let mut extractor = FeatureExtractor::new(BandConfig::default(), &DetectionConfig::default());
        let features = extractor.extract(&frame.audio, &frame.spectrum);
        assert!(!features.good_distribution);
    }
}
