//! CPAL-based capture backend for desktop platforms (Linux, macOS, Windows)
//!
//! Opens the default input device on the worker thread and feeds the
//! detector from the live stream.

use crate::audio::engine_cpal::open_default_input;
use crate::audio::source::FrameSource;
use crate::error::AudioError;

use super::{spawn_session, CaptureBackend, SessionContext, SessionThread};

/// Default microphone backend
#[derive(Debug, Default)]
pub struct CpalBackend {
    _unit: (),
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for CpalBackend {
    fn start(&self, ctx: SessionContext) -> Result<SessionThread, AudioError> {
        spawn_session(ctx, "cry-capture", |config| {
            let capture = open_default_input(config)?;
            tracing::info!(device = capture.device_name(), "[CpalBackend] Capture opened");
            Ok(Box::new(capture) as Box<dyn FrameSource>)
        })
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}
