// Analysis module - per-frame cry detection pipeline
//
// This module wires the detection stages together and drives them from a
// frame source on the worker thread.
//
// Architecture:
// - CryDetector: owns all cross-frame state (histories, published state)
// - Pipeline: validate → FeatureExtractor → TemporalSmoother → Classifier → StateTracker
// - MonitorWorker: polls a FrameSource once per tick until stopped or closed
// - Output: observer callback on change, MonitorEvent on a tokio broadcast channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::audio::frame::CapturedFrame;
use crate::audio::source::{FrameSource, SourcePoll};
use crate::config::AppConfig;
use crate::error::{log_frame_error, FrameError};

pub mod classifier;
pub mod features;
pub mod smoother;
pub mod state;

use classifier::{Classifier, VerdictBreakdown};
use features::{FeatureExtractor, FeatureSample};
use smoother::{ConsistencyCounts, TemporalSmoother};
use state::{CryObserver, CryState, StateTracker, Transition};

/// Loudness above which a frame is logged at debug level
const ACTIVITY_LOG_LOUDNESS: f32 = 5.0;

/// Everything the pipeline derived from one frame
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FrameReport {
    /// Index among accepted frames since the last reset
    pub frame_index: u64,
    pub features: FeatureSample,
    pub consistency: ConsistencyCounts,
    pub breakdown: VerdictBreakdown,
    pub is_crying: bool,
    /// Set when this frame changed the published state
    pub transition: Option<Transition>,
}

impl FrameReport {
    /// Audio level for meters, on the loudness scale
    pub fn level(&self) -> f32 {
        self.features.loudness
    }
}

/// Owned detector state for one monitoring session
pub struct CryDetector {
    extractor: FeatureExtractor,
    smoother: TemporalSmoother,
    classifier: Classifier,
    tracker: StateTracker,
    frames_processed: u64,
    frames_rejected: u64,
}

impl CryDetector {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.bands.clone(), &config.detection),
            smoother: TemporalSmoother::new(&config.history, &config.detection),
            classifier: Classifier::new(&config.detection),
            tracker: StateTracker::new(),
            frames_processed: 0,
            frames_rejected: 0,
        }
    }

    /// Run one frame through the pipeline
    ///
    /// # Arguments
    /// * `frame` - Time-domain window and its spectrum
    ///
    /// # Returns
    /// The frame report, or the validation error for a malformed frame.
    /// A rejected frame leaves histories and state untouched.
    pub fn process(&mut self, frame: &CapturedFrame) -> Result<FrameReport, FrameError> {
        if let Err(err) = frame.validate() {
            self.frames_rejected += 1;
            return Err(err);
        }

        let features = self.extractor.extract(&frame.audio, &frame.spectrum);
        let consistency = self
            .smoother
            .update(features.loudness, features.fundamental_ratio);
        let breakdown = self.classifier.breakdown(&features, &consistency);
        let is_crying = breakdown.is_crying();
        let transition = self.tracker.observe(is_crying);

        let report = FrameReport {
            frame_index: self.frames_processed,
            features,
            consistency,
            breakdown,
            is_crying,
            transition,
        };
        self.frames_processed += 1;
        Ok(report)
    }

    pub fn state(&self) -> CryState {
        self.tracker.state()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    pub fn smoother(&self) -> &TemporalSmoother {
        &self.smoother
    }

    /// Discard histories and return to `NotCrying` without notifying
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.tracker.reset();
        self.frames_processed = 0;
        self.frames_rejected = 0;
    }
}

/// Events published to broadcast subscribers
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MonitorEvent {
    /// Published state changed
    StateChanged {
        transition: Transition,
        frame_index: u64,
        offset_ms: u64,
        level: f32,
    },
    /// Source produced its last frame; the worker has exited
    SourceClosed { frames_processed: u64 },
}

impl MonitorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::StateChanged {
                transition: Transition::CryingStarted,
                ..
            } => "cry_detected",
            MonitorEvent::StateChanged {
                transition: Transition::CryingStopped,
                ..
            } => "cry_stopped",
            MonitorEvent::SourceClosed { .. } => "source_closed",
        }
    }

    /// `{type, timestamp, data}` envelope with a wall-clock timestamp in seconds
    pub fn to_json(&self) -> serde_json::Value {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let data = match self {
            MonitorEvent::StateChanged {
                frame_index,
                offset_ms,
                level,
                ..
            } => serde_json::json!({
                "frame_index": frame_index,
                "offset_ms": offset_ms,
                "level": level,
            }),
            MonitorEvent::SourceClosed { frames_processed } => serde_json::json!({
                "frames_processed": frames_processed,
            }),
        };

        serde_json::json!({
            "type": self.event_type(),
            "timestamp": timestamp,
            "data": data,
        })
    }
}

/// A registered observer, locked only while it runs
pub type ObserverCell = Arc<Mutex<Box<dyn CryObserver>>>;

/// Observer slot shared between the control surface and the worker
pub type SharedObserver = Arc<Mutex<Option<ObserverCell>>>;

/// Counters returned when a worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub final_state: CryState,
    pub source_closed: bool,
}

/// Drives a [`CryDetector`] from a [`FrameSource`] until stopped
pub struct MonitorWorker {
    detector: CryDetector,
    observer: SharedObserver,
    event_tx: tokio::sync::broadcast::Sender<MonitorEvent>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    log_every_n_frames: u64,
}

impl MonitorWorker {
    /// # Arguments
    /// * `config` - Detector and worker configuration
    /// * `observer` - Observer slot notified on state changes
    /// * `event_tx` - Broadcast sender for [`MonitorEvent`]s
    /// * `running` - Cleared by the control surface to stop the loop
    pub fn new(
        config: &AppConfig,
        observer: SharedObserver,
        event_tx: tokio::sync::broadcast::Sender<MonitorEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            detector: CryDetector::new(config),
            observer,
            event_tx,
            running,
            poll_interval: Duration::from_millis(config.audio.poll_interval_ms.max(1)),
            log_every_n_frames: config.logging.log_every_n_frames,
        }
    }

    /// Poll `source` until the running flag clears or the source closes
    ///
    /// A frame already taken from the source is always processed to
    /// completion; the flag is checked between ticks.
    pub fn run(mut self, source: &mut dyn FrameSource) -> WorkerSummary {
        tracing::info!(
            sample_rate = source.sample_rate(),
            "[MonitorWorker] Starting detection loop"
        );

        let mut source_closed = false;
        while self.running.load(Ordering::SeqCst) {
            match source.poll_frame() {
                SourcePoll::Ready(frame) => self.handle_frame(&frame, source),
                SourcePoll::Pending => std::thread::sleep(self.poll_interval),
                SourcePoll::Closed => {
                    source_closed = true;
                    tracing::info!(
                        frames = self.detector.frames_processed(),
                        "[MonitorWorker] Source closed"
                    );
                    let _ = self.event_tx.send(MonitorEvent::SourceClosed {
                        frames_processed: self.detector.frames_processed(),
                    });
                    break;
                }
            }
        }

        tracing::info!(
            frames = self.detector.frames_processed(),
            rejected = self.detector.frames_rejected(),
            "[MonitorWorker] Detection loop exited"
        );

        WorkerSummary {
            frames_processed: self.detector.frames_processed(),
            frames_rejected: self.detector.frames_rejected(),
            final_state: self.detector.state(),
            source_closed,
        }
    }

    fn handle_frame(&mut self, frame: &CapturedFrame, source: &dyn FrameSource) {
        let report = match self.detector.process(frame) {
            Ok(report) => report,
            Err(err) => {
                log_frame_error(&err, self.detector.frames_processed());
                return;
            }
        };

        if report.level() > ACTIVITY_LOG_LOUDNESS {
            tracing::debug!(
                "[MonitorWorker] Level: {:.1}, Fund: {:.3}, Harm: {:.3}, Consistency: {}/{}",
                report.level(),
                report.features.fundamental_ratio,
                report.features.harmonic_ratio,
                report.consistency.high_energy,
                self.detector.smoother().recent_window()
            );
        }

        if let Some(transition) = report.transition {
            self.publish(transition, &report, source.position_ms());
        }

        if self.log_every_n_frames > 0
            && (report.frame_index + 1) % self.log_every_n_frames == 0
        {
            tracing::info!(
                frames = report.frame_index + 1,
                rejected = self.detector.frames_rejected(),
                dropped_blocks = source.dropped_blocks(),
                state = ?self.detector.state(),
                "[MonitorWorker] Frame statistics"
            );
        }
    }

    fn publish(&mut self, transition: Transition, report: &FrameReport, offset_ms: u64) {
        match transition {
            Transition::CryingStarted => tracing::info!(
                "[MonitorWorker] Cry detected at frame {} (level {:.1}, fund {:.3}, harm {:.3})",
                report.frame_index,
                report.level(),
                report.features.fundamental_ratio,
                report.features.harmonic_ratio
            ),
            Transition::CryingStopped => tracing::info!(
                "[MonitorWorker] Cry stopped at frame {}",
                report.frame_index
            ),
        }

        // The slot lock is released before the callback runs; the callback
        // may replace or clear the observer, or stop the session.
        let observer = match self.observer.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => {
                tracing::error!("[MonitorWorker] Observer slot poisoned, notification skipped");
                None
            }
        };
        if let Some(observer) = observer {
            match observer.lock() {
                Ok(mut observer) => observer.on_change(transition.is_crying()),
                Err(_) => {
                    tracing::error!("[MonitorWorker] Observer lock poisoned, notification skipped");
                }
            }
        }

        // No subscribers is not an error
        let _ = self.event_tx.send(MonitorEvent::StateChanged {
            transition,
            frame_index: report.frame_index,
            offset_ms,
            level: report.level(),
        });
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
