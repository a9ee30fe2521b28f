// Cry Detector Core - real-time infant cry detection
// Rule-based spectral classifier over a lock-free capture pipeline

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod testing;

// Re-exports for convenience
pub use analysis::state::{CryObserver, CryState, Transition};
pub use analysis::{CryDetector, FrameReport, MonitorEvent, WorkerSummary};
pub use config::AppConfig;
pub use engine::MonitorHandle;
pub use error::{AudioError, ErrorCode, FrameError};
