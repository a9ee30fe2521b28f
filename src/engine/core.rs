//! MonitorHandle: control surface for a cry monitoring session.
//!
//! Owns the capture backend, the observer slot and the event broadcast
//! channel. At most one session runs at a time; start and stop are both
//! idempotent.

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;

use crate::analysis::state::CryObserver;
use crate::analysis::{MonitorEvent, SharedObserver, WorkerSummary};
use crate::config::AppConfig;
use crate::engine::backend::{CaptureBackend, CpalBackend, SessionContext, SessionThread};
use crate::error::{log_audio_error, AudioError};

/// Capacity of the monitor event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// MonitorHandle orchestrates monitoring sessions and shared channels.
pub struct MonitorHandle {
    config: Arc<RwLock<AppConfig>>,
    backend: Arc<dyn CaptureBackend>,
    observer: SharedObserver,
    event_tx: broadcast::Sender<MonitorEvent>,
    session: Mutex<Option<SessionThread>>,
}

impl MonitorHandle {
    /// Create a handle for the default microphone with config from disk.
    pub fn new() -> Self {
        Self::with_backend(AppConfig::load(), Arc::new(CpalBackend::new()))
    }

    /// Create a handle over an explicit backend.
    ///
    /// # Arguments
    /// * `config` - Configuration applied to every session
    /// * `backend` - Source of frames (microphone, scripted, ...)
    pub fn with_backend(config: AppConfig, backend: Arc<dyn CaptureBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(RwLock::new(config)),
            backend,
            observer: Arc::new(Mutex::new(None)),
            event_tx,
            session: Mutex::new(None),
        }
    }

    // ========================================================================
    // OBSERVERS
    // ========================================================================

    /// Register the callback notified on each state change, replacing any
    /// previous one. Takes effect for the running session too.
    ///
    /// The callback runs on the worker thread and may call back into this
    /// handle (`clear_observer`, `set_observer`, `stop_monitoring`).
    pub fn set_observer(&self, observer: impl CryObserver + 'static) -> Result<(), AudioError> {
        let mut slot = self.observer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "observer".to_string(),
        })?;
        *slot = Some(Arc::new(Mutex::new(Box::new(observer))));
        Ok(())
    }

    pub fn clear_observer(&self) -> Result<(), AudioError> {
        let mut slot = self.observer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "observer".to_string(),
        })?;
        *slot = None;
        Ok(())
    }

    /// Subscribe to state changes and source closure
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.event_tx.subscribe()
    }

    // ========================================================================
    // MONITORING METHODS
    // ========================================================================

    /// Open the capture source and start the detection worker.
    ///
    /// Blocks until the source is open. Calling this while a session is
    /// already running is a no-op. A session whose source closed on its own
    /// is reaped and a fresh one started.
    ///
    /// # Returns
    /// * `Ok(())` - Monitoring is active
    /// * `Err(AudioError)` - Source failed to open; nothing is retained
    pub fn start_monitoring(&self) -> Result<(), AudioError> {
        let mut session = self.lock_session()?;

        if let Some(current) = session.as_ref() {
            if !current.is_finished() {
                tracing::debug!("[MonitorHandle] Monitoring already active");
                return Ok(());
            }
        }
        if let Some(finished) = session.take() {
            let summary = finished.stop()?;
            tracing::info!(
                frames = summary.frames_processed,
                "[MonitorHandle] Reaped finished session"
            );
        }

        let config = self.config_snapshot()?;
        let ctx = SessionContext {
            config,
            observer: Arc::clone(&self.observer),
            event_tx: self.event_tx.clone(),
        };

        match self.backend.start(ctx) {
            Ok(thread) => {
                *session = Some(thread);
                tracing::info!(backend = self.backend.name(), "[MonitorHandle] Monitoring started");
                Ok(())
            }
            Err(err) => {
                log_audio_error(&err, "start_monitoring");
                Err(err)
            }
        }
    }

    /// Stop the detection worker and release the capture source.
    ///
    /// History is discarded and the state returns to not crying without
    /// notifying the observer. Stopping an idle handle is a no-op.
    ///
    /// # Returns
    /// Counters from the stopped session, or `None` if none was running.
    pub fn stop_monitoring(&self) -> Result<Option<WorkerSummary>, AudioError> {
        let taken = self.lock_session()?.take();
        let Some(thread) = taken else {
            return Ok(None);
        };

        let summary = thread.stop().map_err(|err| {
            log_audio_error(&err, "stop_monitoring");
            err
        })?;
        tracing::info!(
            frames = summary.frames_processed,
            rejected = summary.frames_rejected,
            "[MonitorHandle] Monitoring stopped"
        );
        Ok(Some(summary))
    }

    /// True while a session is running and its source has not closed
    pub fn is_monitoring(&self) -> bool {
        self.session
            .lock()
            .map(|session| session.as_ref().is_some_and(|s| !s.is_finished()))
            .unwrap_or(false)
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    pub fn config_snapshot(&self) -> Result<AppConfig, AudioError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| AudioError::LockPoisoned {
                component: "config".to_string(),
            })
    }

    /// Replace the configuration; applies from the next session
    pub fn update_config(&self, config: AppConfig) -> Result<(), AudioError> {
        let mut guard = self.config.write().map_err(|_| AudioError::LockPoisoned {
            component: "config".to_string(),
        })?;
        *guard = config;
        Ok(())
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionThread>>, AudioError> {
        self.session.lock().map_err(|_| AudioError::LockPoisoned {
            component: "session".to_string(),
        })
    }
}

impl Default for MonitorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop_monitoring() {
            log_audio_error(&err, "MonitorHandle::drop");
        }
    }
}

// ========================================================================
// TESTS
// ========================================================================
