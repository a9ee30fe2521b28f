// Frame types - one capture tick worth of audio
//
// A tick delivers a time-domain window and the magnitude spectrum computed
// from that same window. Both are consumed synchronously by the detector and
// then dropped; nothing here is retained across ticks.

use crate::error::FrameError;

/// Fixed-length window of normalized time-domain samples (approx. [-1, 1])
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Magnitude spectrum spanning 0 Hz to Nyquist
///
/// Bins are either on the 8-bit scale a byte analyser produces or already
/// normalized to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumFrame {
    Byte(Vec<u8>),
    Normalized(Vec<f32>),
}

impl SpectrumFrame {
    pub fn len(&self) -> usize {
        match self {
            SpectrumFrame::Byte(bins) => bins.len(),
            SpectrumFrame::Normalized(bins) => bins.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalized energy of a single bin
    #[inline]
    pub fn energy(&self, bin: usize) -> f32 {
        match self {
            SpectrumFrame::Byte(bins) => bins[bin] as f32 / 255.0,
            SpectrumFrame::Normalized(bins) => bins[bin],
        }
    }

    /// Iterate normalized energies in bin order
    pub fn energies(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len()).map(move |bin| self.energy(bin))
    }
}

/// Time-domain frame plus its aligned spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub audio: AudioFrame,
    pub spectrum: SpectrumFrame,
}

impl CapturedFrame {
    pub fn new(audio: AudioFrame, spectrum: SpectrumFrame) -> Self {
        Self { audio, spectrum }
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate()
    }

    /// Check the acquirer/extractor contract
    ///
    /// The spectrum must carry exactly half as many bins as the window has
    /// samples, and at least two so a bin width can be derived.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.audio.sample_rate() == 0 {
            return Err(FrameError::InvalidSampleRate {
                sample_rate: self.audio.sample_rate(),
            });
        }
        if self.audio.is_empty() {
            return Err(FrameError::EmptyFrame);
        }
        if self.spectrum.is_empty() {
            return Err(FrameError::EmptySpectrum);
        }
        if self.spectrum.len() < 2 {
            return Err(FrameError::SpectrumTooSmall {
                bins: self.spectrum.len(),
            });
        }
        if self.spectrum.len() * 2 != self.audio.len() {
            return Err(FrameError::LengthMismatch {
                samples: self.audio.len(),
                bins: self.spectrum.len(),
            });
        }
        Ok(())
    }
}
