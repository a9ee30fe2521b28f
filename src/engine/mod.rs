//! Engine module housing the monitoring control surface.
//!
//! This module exposes trait-based capture backends (`backend`) and the
//! `MonitorHandle` orchestration layer (`core`) used by the CLI and by
//! embedding applications.

pub mod backend;
pub mod core;

pub use crate::analysis::MonitorEvent;
pub use backend::{CaptureBackend, CpalBackend, ScriptedBackend, SessionContext, SessionThread};
pub use core::MonitorHandle;
