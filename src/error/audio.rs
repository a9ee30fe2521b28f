// Capture initialization error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    /// No capture device is available
    pub const NO_INPUT_DEVICE: i32 = 1001;

    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1002;

    /// Failed to open or start the capture stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Device offers no sample format the acquirer can read
    pub const UNSUPPORTED_FORMAT: i32 = 1004;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Offline source (WAV file, fixture) could not be loaded
    pub const FIXTURE_LOAD_FAILED: i32 = 1007;

    /// Capture worker exited before reporting its initialization result
    pub const WORKER_FAILED: i32 = 1008;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=FrameAcquirer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Capture initialization errors
///
/// Surfaced once from `start_monitoring`; the pipeline never starts and no
/// partial state is retained.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No default input device found
    NoInputDevice,

    /// Microphone permission denied
    PermissionDenied,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Sample format not supported by the acquirer
    UnsupportedFormat { format: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// WAV or fixture source could not be read
    FixtureLoadFailed { reason: String },

    /// Worker thread died before initialization finished
    WorkerFailed { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::NoInputDevice => AudioErrorCodes::NO_INPUT_DEVICE,
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::FixtureLoadFailed { .. } => AudioErrorCodes::FIXTURE_LOAD_FAILED,
            AudioError::WorkerFailed { .. } => AudioErrorCodes::WORKER_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::NoInputDevice => "No default input device found".to_string(),
            AudioError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("Unsupported input sample format: {}", format)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::FixtureLoadFailed { reason } => {
                format!("Failed to load audio source: {}", reason)
            }
            AudioError::WorkerFailed { reason } => {
                format!("Capture worker failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => AudioError::PermissionDenied,
            _ => AudioError::HardwareError {
                details: err.to_string(),
            },
        }
    }
}
