// Error types for the cry detector
//
// This module defines custom error types for capture initialization and frame
// validation, with stable numeric codes for callers that need to branch on
// failures (CLI exit paths, embedding applications).

mod audio;
mod frame;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use frame::{log_frame_error, FrameError, FrameErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
