// Frame validation error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Frame error code constants
///
/// Error code range: 2001-2005
pub struct FrameErrorCodes;

impl FrameErrorCodes {
    /// Time-domain frame carried no samples
    pub const EMPTY_FRAME: i32 = 2001;

    /// Spectrum carried no bins
    pub const EMPTY_SPECTRUM: i32 = 2002;

    /// Spectrum has fewer than two bins, so no bin width can be derived
    pub const SPECTRUM_TOO_SMALL: i32 = 2003;

    /// Frame and spectrum were not derived from the same window
    pub const LENGTH_MISMATCH: i32 = 2004;

    /// Sample rate of zero
    pub const INVALID_SAMPLE_RATE: i32 = 2005;
}

/// Log a rejected frame
///
/// Malformed frames are skipped rather than fatal, so this logs at warn.
pub fn log_frame_error(err: &FrameError, frame_index: u64) {
    warn!(
        "Frame {} rejected: code={}, component=CryDetector, message={}",
        frame_index,
        err.code(),
        err.message()
    );
}

/// Malformed frame errors
///
/// A frame failing validation is rejected before it reaches the feature
/// extractor; history and state stay untouched and the next tick proceeds.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    EmptyFrame,
    EmptySpectrum,
    SpectrumTooSmall { bins: usize },
    LengthMismatch { samples: usize, bins: usize },
    InvalidSampleRate { sample_rate: u32 },
}

impl ErrorCode for FrameError {
    fn code(&self) -> i32 {
        match self {
            FrameError::EmptyFrame => FrameErrorCodes::EMPTY_FRAME,
            FrameError::EmptySpectrum => FrameErrorCodes::EMPTY_SPECTRUM,
            FrameError::SpectrumTooSmall { .. } => FrameErrorCodes::SPECTRUM_TOO_SMALL,
            FrameError::LengthMismatch { .. } => FrameErrorCodes::LENGTH_MISMATCH,
            FrameError::InvalidSampleRate { .. } => FrameErrorCodes::INVALID_SAMPLE_RATE,
        }
    }

    fn message(&self) -> String {
        match self {
            FrameError::EmptyFrame => "Audio frame contains no samples".to_string(),
            FrameError::EmptySpectrum => "Spectrum frame contains no bins".to_string(),
            FrameError::SpectrumTooSmall { bins } => {
                format!("Spectrum needs at least 2 bins (got {})", bins)
            }
            FrameError::LengthMismatch { samples, bins } => format!(
                "Spectrum of {} bins does not match a frame of {} samples (expected {} bins)",
                bins,
                samples,
                samples / 2
            ),
            FrameError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate must be greater than 0 (got {})", sample_rate)
            }
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrameError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_codes() {
        assert_eq!(FrameError::EmptyFrame.code(), 2001);
        assert_eq!(FrameError::EmptySpectrum.code(), 2002);
        assert_eq!(FrameError::SpectrumTooSmall { bins: 1 }.code(), 2003);
        assert_eq!(
            FrameError::LengthMismatch {
                samples: 8,
                bins: 3
            }
            .code(),
            2004
        );
        assert_eq!(FrameError::InvalidSampleRate { sample_rate: 0 }.code(), 2005);
    }

    #[test]
    fn test_length_mismatch_message() {
        let err = FrameError::LengthMismatch {
            samples: 2048,
            bins: 512,
        };
        let message = err.message();
        assert!(message.contains("512 bins"));
        assert!(message.contains("2048 samples"));
        assert!(message.contains("expected 1024"));
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::SpectrumTooSmall { bins: 1 };
        let display = format!("{}", err);
        assert!(display.contains("FrameError"));
        assert!(display.contains("2003"));
    }
}
