// Audio module - frame acquisition from microphone, files and scripts

pub mod analyser;
pub mod buffer_pool;
pub mod engine_cpal;
pub mod frame;
pub mod source;

// Re-export commonly used types for convenience
pub use analyser::SpectrumAnalyser;
pub use buffer_pool::{BufferPool, CaptureChannels, WorkerChannels};
pub use engine_cpal::{open_default_input, LiveCapture, LiveSource};
pub use frame::{AudioFrame, CapturedFrame, SpectrumFrame};
pub use source::{FrameSource, PcmSource, ScriptedSource, SourcePoll};
