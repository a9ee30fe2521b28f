//! Integration tests for the monitoring control surface
//!
//! These tests drive `MonitorHandle` end to end over the scripted backend:
//! - start/stop lifecycle and idempotence
//! - observer notifications and broadcast events
//! - initialization failures
//! - history reset across restarts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cry_detector::audio::frame::{AudioFrame, CapturedFrame, SpectrumFrame};
use cry_detector::config::AppConfig;
use cry_detector::engine::{MonitorEvent, MonitorHandle, ScriptedBackend};
use cry_detector::error::AudioError;
use cry_detector::testing::frames::{repeat, FrameProfile, FRAME_BINS, FRAME_SAMPLE_RATE};
use cry_detector::Transition;
use tokio::sync::broadcast::{self, error::TryRecvError};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn handle_for(backend: ScriptedBackend) -> (MonitorHandle, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let handle = MonitorHandle::with_backend(AppConfig::default(), backend.clone());
    (handle, backend)
}

fn record_observer(handle: &MonitorHandle) -> Arc<Mutex<Vec<bool>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle
        .set_observer(move |is_crying: bool| sink.lock().unwrap().push(is_crying))
        .expect("observer slot");
    seen
}

/// Wait for the next event matching `pred`, collecting everything seen on the way
fn wait_for(
    rx: &mut broadcast::Receiver<MonitorEvent>,
    pred: impl Fn(&MonitorEvent) -> bool,
) -> Vec<MonitorEvent> {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "timed out waiting for event; saw {seen:?}");
                std::thread::sleep(Duration::from_millis(2));
            }
            Err(err) => panic!("event channel failed: {err:?}"),
        }
    }
}

fn is_closed(event: &MonitorEvent) -> bool {
    matches!(event, MonitorEvent::SourceClosed { .. })
}

fn is_started(event: &MonitorEvent) -> bool {
    matches!(
        event,
        MonitorEvent::StateChanged {
            transition: Transition::CryingStarted,
            ..
        }
    )
}

#[test]
fn test_sustained_cry_notifies_once() {
    let (handle, _) = handle_for(ScriptedBackend::frames(
        FRAME_SAMPLE_RATE,
        repeat(FrameProfile::cry(), 16),
    ));
    let seen = record_observer(&handle);
    let mut rx = handle.subscribe();

    handle.start_monitoring().expect("scripted start");
    let events = wait_for(&mut rx, is_closed);

    assert_eq!(*seen.lock().unwrap(), vec![true]);
    assert_eq!(events.iter().filter(|e| is_started(e)).count(), 1);
    match events.first() {
        Some(MonitorEvent::StateChanged { frame_index, .. }) => assert_eq!(*frame_index, 3),
        other => panic!("expected a state change first, got {other:?}"),
    }
    assert_eq!(
        events.last(),
        Some(&MonitorEvent::SourceClosed { frames_processed: 16 })
    );
    assert!(!handle.is_monitoring());
}

#[test]
fn test_cry_then_silence_notifies_both_edges() {
    let mut frames = repeat(FrameProfile::cry(), 10);
    frames.extend(repeat(FrameProfile::silence(), 5));
    let (handle, _) = handle_for(ScriptedBackend::frames(FRAME_SAMPLE_RATE, frames));
    let seen = record_observer(&handle);
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    let events = wait_for(&mut rx, is_closed);

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["cry_detected", "cry_stopped", "source_closed"]);
}

#[test]
fn test_start_is_idempotent_while_running() {
    let (handle, backend) = handle_for(ScriptedBackend::frames_held_open(
        FRAME_SAMPLE_RATE,
        repeat(FrameProfile::silence(), 4),
    ));

    handle.start_monitoring().unwrap();
    handle.start_monitoring().unwrap();
    assert!(handle.is_monitoring());
    assert_eq!(backend.start_count(), 1);

    assert!(handle.stop_monitoring().unwrap().is_some());
    assert!(handle.stop_monitoring().unwrap().is_none());
    assert!(!handle.is_monitoring());
}

#[test]
fn test_initialization_failure_surfaces_once() {
    let (handle, backend) = handle_for(ScriptedBackend::failing(AudioError::PermissionDenied));
    let seen = record_observer(&handle);

    assert_eq!(handle.start_monitoring(), Err(AudioError::PermissionDenied));
    assert!(!handle.is_monitoring());
    assert_eq!(backend.start_count(), 0);
    assert!(seen.lock().unwrap().is_empty());
    assert!(handle.stop_monitoring().unwrap().is_none());
}

#[test]
fn test_stop_resets_state_without_notification() {
    let (handle, _) = handle_for(ScriptedBackend::frames_held_open(
        FRAME_SAMPLE_RATE,
        repeat(FrameProfile::cry(), 10),
    ));
    let seen = record_observer(&handle);
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    wait_for(&mut rx, is_started);
    let summary = handle.stop_monitoring().unwrap().expect("running session");
    assert!(summary.final_state.is_crying());
    assert_eq!(*seen.lock().unwrap(), vec![true]);

    // A fresh session starts from not crying, so the same script notifies again
    handle.start_monitoring().unwrap();
    let events = wait_for(&mut rx, is_started);
    match events.last() {
        Some(MonitorEvent::StateChanged { frame_index, .. }) => assert_eq!(*frame_index, 3),
        other => panic!("expected cry_detected, got {other:?}"),
    }
    handle.stop_monitoring().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![true, true]);
}

#[test]
fn test_restart_clears_history() {
    // Three loud frames per session never satisfy the 4-of-8 energy gate on their own
    let (handle, backend) = handle_for(ScriptedBackend::frames(
        FRAME_SAMPLE_RATE,
        repeat(FrameProfile::cry(), 3),
    ));
    let seen = record_observer(&handle);
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    let first = wait_for(&mut rx, is_closed);
    handle.start_monitoring().unwrap();
    let second = wait_for(&mut rx, is_closed);

    assert_eq!(backend.start_count(), 2);
    assert_eq!(first, vec![MonitorEvent::SourceClosed { frames_processed: 3 }]);
    assert_eq!(second, vec![MonitorEvent::SourceClosed { frames_processed: 3 }]);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_malformed_frames_are_skipped() {
    let bad = CapturedFrame::new(
        AudioFrame::new(Vec::new(), FRAME_SAMPLE_RATE),
        SpectrumFrame::Normalized(vec![0.0; FRAME_BINS]),
    );
    let mut frames = vec![bad.clone()];
    frames.extend(repeat(FrameProfile::cry(), 3));
    frames.push(bad);
    frames.extend(repeat(FrameProfile::cry(), 2));

    let (handle, _) = handle_for(ScriptedBackend::frames(FRAME_SAMPLE_RATE, frames));
    let seen = record_observer(&handle);
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    let events = wait_for(&mut rx, is_closed);

    // Rejected frames leave history alone: the 4th valid frame still triggers
    assert_eq!(*seen.lock().unwrap(), vec![true]);
    match events.first() {
        Some(MonitorEvent::StateChanged { frame_index, .. }) => assert_eq!(*frame_index, 3),
        other => panic!("expected a state change first, got {other:?}"),
    }
    assert_eq!(
        events.last(),
        Some(&MonitorEvent::SourceClosed { frames_processed: 5 })
    );
}

#[test]
fn test_observer_can_clear_itself() {
    let mut frames = repeat(FrameProfile::cry(), 10);
    frames.extend(repeat(FrameProfile::silence(), 5));
    let (handle, _) = handle_for(ScriptedBackend::frames(FRAME_SAMPLE_RATE, frames));
    let handle = Arc::new(handle);
    let weak = Arc::downgrade(&handle);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle
        .set_observer(move |is_crying: bool| {
            sink.lock().unwrap().push(is_crying);
            if let Some(handle) = weak.upgrade() {
                handle.clear_observer().expect("clear from callback");
            }
        })
        .unwrap();
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    let events = wait_for(&mut rx, is_closed);

    // The stop edge is still broadcast but no longer reaches the cleared observer
    assert_eq!(*seen.lock().unwrap(), vec![true]);
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["cry_detected", "cry_stopped", "source_closed"]);
}

#[test]
fn test_observer_can_replace_itself() {
    let mut frames = repeat(FrameProfile::cry(), 10);
    frames.extend(repeat(FrameProfile::silence(), 5));
    let (handle, _) = handle_for(ScriptedBackend::frames(FRAME_SAMPLE_RATE, frames));
    let handle = Arc::new(handle);
    let weak = Arc::downgrade(&handle);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&seen);
    handle
        .set_observer(move |is_crying: bool| {
            first.lock().unwrap().push(("first", is_crying));
            let second = Arc::clone(&first);
            if let Some(handle) = weak.upgrade() {
                handle
                    .set_observer(move |is_crying: bool| {
                        second.lock().unwrap().push(("second", is_crying));
                    })
                    .expect("replace from callback");
            }
        })
        .unwrap();
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    wait_for(&mut rx, is_closed);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("first", true), ("second", false)]
    );
}

#[test]
fn test_observer_can_stop_monitoring() {
    let (handle, _) = handle_for(ScriptedBackend::frames_held_open(
        FRAME_SAMPLE_RATE,
        repeat(FrameProfile::cry(), 10),
    ));
    let handle = Arc::new(handle);
    let weak = Arc::downgrade(&handle);
    let returned = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&returned);
    handle
        .set_observer(move |_is_crying: bool| {
            if let Some(handle) = weak.upgrade() {
                let summary = handle.stop_monitoring().expect("stop from callback");
                assert!(summary.is_some());
            }
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    handle.start_monitoring().unwrap();
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while !returned.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "observer never returned from stop_monitoring");
        std::thread::sleep(Duration::from_millis(2));
    }

    assert!(!handle.is_monitoring());
    assert!(handle.stop_monitoring().unwrap().is_none());
}

#[test]
fn test_pcm_replay_detects_cry_tone() {
    use cry_detector::testing::{SignalPattern, SignalSpec};

    let spec = SignalSpec::new(SignalPattern::CryTone).with_duration_ms(1_000);
    let (handle, _) = handle_for(ScriptedBackend::pcm(spec.sample_rate, spec.generate()));
    let mut rx = handle.subscribe();

    handle.start_monitoring().unwrap();
    let events = wait_for(&mut rx, is_closed);
    assert!(events.iter().any(is_started), "events: {events:?}");
}

#[test]
fn test_event_json_envelope() {
    let event = MonitorEvent::StateChanged {
        transition: Transition::CryingStopped,
        frame_index: 12,
        offset_ms: 192,
        level: 0.0,
    };
    let json = event.to_json();
    assert_eq!(json["type"], "cry_stopped");
    assert_eq!(json["data"]["frame_index"], 12);
    assert!(json["timestamp"].as_f64().unwrap_or_default() > 0.0);
}
