use std::sync::atomic::{AtomicU32, Ordering};

use crate::audio::frame::CapturedFrame;
use crate::audio::source::{FrameSource, PcmSource, ScriptedSource};
use crate::config::AppConfig;
use crate::error::AudioError;

use super::{spawn_session, CaptureBackend, SessionContext, SessionThread};

enum Script {
    Frames {
        sample_rate: u32,
        frames: Vec<CapturedFrame>,
        hold_open: bool,
    },
    Pcm {
        sample_rate: u32,
        samples: Vec<f32>,
    },
    Fail(AudioError),
}

/// Deterministic backend used for testing and offline CLI runs.
///
/// Every session replays the same script from the start, so stop + restart
/// behaves like reopening a device.
pub struct ScriptedBackend {
    script: Script,
    starts: AtomicU32,
}

impl ScriptedBackend {
    /// Replay pre-built frames, then close
    pub fn frames(sample_rate: u32, frames: Vec<CapturedFrame>) -> Self {
        Self::with_script(Script::Frames {
            sample_rate,
            frames,
            hold_open: false,
        })
    }

    /// Replay pre-built frames, then idle until stopped like a quiet device
    pub fn frames_held_open(sample_rate: u32, frames: Vec<CapturedFrame>) -> Self {
        Self::with_script(Script::Frames {
            sample_rate,
            frames,
            hold_open: true,
        })
    }

    /// Replay mono PCM through the spectrum analyser
    pub fn pcm(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::with_script(Script::Pcm {
            sample_rate,
            samples,
        })
    }

    /// Fail every start with `err`
    pub fn failing(err: AudioError) -> Self {
        Self::with_script(Script::Fail(err))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            starts: AtomicU32::new(0),
        }
    }

    /// Number of sessions opened so far
    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for ScriptedBackend {
    fn start(&self, ctx: SessionContext) -> Result<SessionThread, AudioError> {
        let open: Box<dyn FnOnce(&AppConfig) -> Result<Box<dyn FrameSource>, AudioError> + Send> =
            match &self.script {
                Script::Frames {
                    sample_rate,
                    frames,
                    hold_open,
                } => {
                    let (sample_rate, frames, hold_open) = (*sample_rate, frames.clone(), *hold_open);
                    Box::new(move |_config: &AppConfig| {
                        let source = ScriptedSource::new(sample_rate, frames);
                        let source = if hold_open { source.hold_open() } else { source };
                        Ok(Box::new(source) as Box<dyn FrameSource>)
                    })
                }
                Script::Pcm {
                    sample_rate,
                    samples,
                } => {
                    let (sample_rate, samples) = (*sample_rate, samples.clone());
                    Box::new(move |config: &AppConfig| {
                        Ok(Box::new(PcmSource::from_samples(samples, sample_rate, config))
                            as Box<dyn FrameSource>)
                    })
                }
                Script::Fail(err) => {
                    let err = err.clone();
                    Box::new(move |_config: &AppConfig| Err(err))
                }
            };

        let session = spawn_session(ctx, "cry-scripted", open)?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(session)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
