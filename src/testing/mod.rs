//! Testability harness utilities.
//!
//! Deterministic signal generators and hand-built frames used by the CLI's
//! `synth` command, the offline fixtures and the test suites. Nothing here
//! touches audio hardware.

pub mod frames;
pub mod signals;

pub use frames::FrameProfile;
pub use signals::{SignalPattern, SignalSpec};
