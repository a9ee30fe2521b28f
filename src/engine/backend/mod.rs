//! Backend abstractions for the monitoring control surface.
//!
//! A backend knows how to open a [`FrameSource`]; the session plumbing
//! around it (worker thread, init handshake, shutdown) is shared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use tokio::sync::broadcast;

use crate::analysis::{MonitorEvent, MonitorWorker, SharedObserver, WorkerSummary};
use crate::audio::source::FrameSource;
use crate::config::AppConfig;
use crate::error::AudioError;

mod cpal;
pub use cpal::CpalBackend;

mod scripted;
pub use scripted::ScriptedBackend;

/// Context provided to backends when a monitoring session starts.
///
/// Bundles the configuration snapshot and the shared channels the worker
/// publishes to, without coupling backends to `MonitorHandle`.
pub struct SessionContext {
    pub config: AppConfig,
    pub observer: SharedObserver,
    pub event_tx: broadcast::Sender<MonitorEvent>,
}

/// Trait implemented by capture backends.
///
/// `start` must block until the source is open (or failed to open) and
/// return the running session.
pub trait CaptureBackend: Send + Sync {
    fn start(&self, ctx: SessionContext) -> Result<SessionThread, AudioError>;
    fn name(&self) -> &'static str;
}

/// A running worker thread and its stop flag
pub struct SessionThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<WorkerSummary>,
}

impl SessionThread {
    /// True once the worker loop has exited on its own (source closed)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the next tick and wait for the worker to release its source
    ///
    /// Called from the worker itself (an observer stopping the session), this
    /// only clears the running flag; the loop exits after the current frame
    /// and an empty summary is returned.
    pub fn stop(self) -> Result<WorkerSummary, AudioError> {
        self.running.store(false, Ordering::SeqCst);
        if self.handle.thread().id() == std::thread::current().id() {
            tracing::debug!("[Session] Stop requested from worker thread, not joining");
            return Ok(WorkerSummary::default());
        }
        self.handle.join().map_err(|_| AudioError::WorkerFailed {
            reason: "detector worker panicked".to_string(),
        })
    }
}

/// Spawn a worker that opens its source in-thread and runs the detector
///
/// The source never leaves the worker thread, so it need not be `Send`
/// (cpal streams are not). Initialization errors are handed back to the
/// caller before this returns.
///
/// # Arguments
/// * `ctx` - Session context
/// * `thread_name` - Name of the worker thread
/// * `open` - Opens the source; runs on the worker thread
pub fn spawn_session<O>(
    ctx: SessionContext,
    thread_name: &str,
    open: O,
) -> Result<SessionThread, AudioError>
where
    O: FnOnce(&AppConfig) -> Result<Box<dyn FrameSource>, AudioError> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let worker_running = Arc::clone(&running);
    let (init_tx, init_rx) = mpsc::channel::<Result<u32, AudioError>>();

    let handle = std::thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            let SessionContext {
                config,
                observer,
                event_tx,
            } = ctx;

            let mut source = match open(&config) {
                Ok(source) => source,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return WorkerSummary::default();
                }
            };
            let _ = init_tx.send(Ok(source.sample_rate()));

            let worker = MonitorWorker::new(&config, observer, event_tx, worker_running);
            worker.run(source.as_mut())
            // source (and any device stream it owns) drops here
        })
        .map_err(|err| AudioError::WorkerFailed {
            reason: format!("failed to spawn worker thread: {}", err),
        })?;

    let session = SessionThread { running, handle };

    match init_rx.recv() {
        Ok(Ok(sample_rate)) => {
            tracing::info!(sample_rate, "[Session] Source opened");
            Ok(session)
        }
        Ok(Err(err)) => {
            let _ = session.stop();
            Err(err)
        }
        Err(_) => {
            let _ = session.stop();
            Err(AudioError::WorkerFailed {
                reason: "worker exited before reporting initialization".to_string(),
            })
        }
    }
}
