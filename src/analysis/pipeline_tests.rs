use super::*;
use crate::audio::frame::{AudioFrame, SpectrumFrame};
use crate::audio::source::ScriptedSource;
use crate::testing::frames::{repeat, FrameProfile, FRAME_SAMPLE_RATE};

fn detector() -> CryDetector {
    CryDetector::new(&AppConfig::default())
}

fn verdicts(detector: &mut CryDetector, frames: &[CapturedFrame]) -> Vec<bool> {
    frames
        .iter()
        .map(|frame| detector.process(frame).expect("valid frame").is_crying)
        .collect()
}

fn recording_observer() -> (SharedObserver, Arc<Mutex<Vec<bool>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: Box<dyn CryObserver> = Box::new(move |is_crying: bool| {
        sink.lock().unwrap().push(is_crying);
    });
    (Arc::new(Mutex::new(Some(Arc::new(Mutex::new(observer))))), seen)
}

#[test]
fn test_silence_never_cries() {
    let mut detector = detector();
    let frames = repeat(FrameProfile::silence(), 40);
    for report in frames.iter().map(|f| detector.process(f).unwrap()) {
        assert!(!report.is_crying);
        assert!(report.transition.is_none());
    }
    assert_eq!(detector.state(), CryState::NotCrying);
}

#[test]
fn test_sustained_cry_fires_once_when_consistency_met() {
    let mut detector = detector();
    let frames = repeat(FrameProfile::cry(), 30);

    let mut transitions = Vec::new();
    for frame in &frames {
        let report = detector.process(frame).unwrap();
        if let Some(t) = report.transition {
            transitions.push((report.frame_index, t));
        }
    }

    // 4-of-8 loud frames is the last gate to open
    assert_eq!(transitions, vec![(3, Transition::CryingStarted)]);
    assert_eq!(detector.state(), CryState::Crying);
}

#[test]
fn test_no_cry_before_history_warms_up() {
    let mut detector = detector();
    let frames = repeat(FrameProfile::cry(), 3);
    assert_eq!(verdicts(&mut detector, &frames), vec![false, false, false]);
}

#[test]
fn test_silence_after_cry_stops_immediately() {
    let mut detector = detector();
    verdicts(&mut detector, &repeat(FrameProfile::cry(), 10));

    let report = detector.process(&FrameProfile::silence().frame()).unwrap();
    assert!(!report.is_crying);
    assert_eq!(report.transition, Some(Transition::CryingStopped));
}

#[test]
fn test_hiss_is_not_crying() {
    let mut detector = detector();
    let results = verdicts(&mut detector, &repeat(FrameProfile::hiss(), 20));
    assert!(results.iter().all(|&v| !v));
}

#[test]
fn test_transitions_equal_verdict_changes() {
    let mut detector = detector();
    let mut frames = Vec::new();
    for block in 0..6 {
        let profile = if block % 2 == 0 {
            FrameProfile::cry()
        } else {
            FrameProfile::silence()
        };
        frames.extend(repeat(profile, 6 + block));
    }

    let mut previous = false;
    let mut changes = 0;
    let mut transitions = 0;
    for frame in &frames {
        let report = detector.process(frame).unwrap();
        if report.is_crying != previous {
            changes += 1;
            previous = report.is_crying;
        }
        if report.transition.is_some() {
            transitions += 1;
        }
    }

    assert!(changes > 0);
    assert_eq!(transitions, changes);
}

#[test]
fn test_malformed_frame_leaves_history_untouched() {
    let mut detector = detector();
    verdicts(&mut detector, &repeat(FrameProfile::cry(), 2));
    let history_len = detector.smoother().loudness_history().len();

    let empty = CapturedFrame::new(
        AudioFrame::new(Vec::new(), FRAME_SAMPLE_RATE),
        SpectrumFrame::Byte(vec![0; 4]),
    );
    assert_eq!(detector.process(&empty).unwrap_err(), FrameError::EmptyFrame);

    let mismatched = CapturedFrame::new(
        AudioFrame::new(vec![0.1; 100], FRAME_SAMPLE_RATE),
        SpectrumFrame::Byte(vec![0; 10]),
    );
    assert!(matches!(
        detector.process(&mismatched),
        Err(FrameError::LengthMismatch { .. })
    ));

    assert_eq!(detector.smoother().loudness_history().len(), history_len);
    assert_eq!(detector.frames_processed(), 2);
    assert_eq!(detector.frames_rejected(), 2);
}

#[test]
fn test_reset_clears_history() {
    let mut detector = detector();
    verdicts(&mut detector, &repeat(FrameProfile::cry(), 12));
    assert_eq!(detector.state(), CryState::Crying);

    detector.reset();
    assert_eq!(detector.state(), CryState::NotCrying);
    let report = detector.process(&FrameProfile::cry().frame()).unwrap();
    assert!(!report.is_crying);
    assert_eq!(report.frame_index, 0);
}

#[test]
fn test_event_json_envelope() {
    let event = MonitorEvent::StateChanged {
        transition: Transition::CryingStarted,
        frame_index: 3,
        offset_ms: 48,
        level: 50.0,
    };
    let json = event.to_json();
    assert_eq!(json["type"], "cry_detected");
    assert_eq!(json["data"]["frame_index"], 3);
    assert_eq!(json["data"]["offset_ms"], 48);
    assert!(json["timestamp"].as_f64().unwrap() > 0.0);

    let closed = MonitorEvent::SourceClosed {
        frames_processed: 9,
    };
    assert_eq!(closed.event_type(), "source_closed");
}

#[test]
fn test_worker_notifies_observer_and_subscribers() {
    let config = AppConfig::default();
    let (observer, seen) = recording_observer();
    let (event_tx, mut event_rx) = tokio::sync::broadcast::channel(64);
    let running = Arc::new(AtomicBool::new(true));

    let mut frames = repeat(FrameProfile::cry(), 10);
    frames.extend(repeat(FrameProfile::silence(), 5));
    let mut source = ScriptedSource::new(FRAME_SAMPLE_RATE, frames);

    let worker = MonitorWorker::new(&config, observer, event_tx, running);
    let summary = worker.run(&mut source);

    assert!(summary.source_closed);
    assert_eq!(summary.frames_processed, 15);
    assert_eq!(summary.final_state, CryState::NotCrying);
    assert_eq!(*seen.lock().unwrap(), vec![true, false]);

    let mut kinds = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(kinds, vec!["cry_detected", "cry_stopped", "source_closed"]);
}

#[test]
fn test_worker_skips_malformed_frames() {
    let config = AppConfig::default();
    let (observer, seen) = recording_observer();
    let (event_tx, _event_rx) = tokio::sync::broadcast::channel(64);
    let running = Arc::new(AtomicBool::new(true));

    let bad = CapturedFrame::new(
        AudioFrame::new(vec![0.1; 8], FRAME_SAMPLE_RATE),
        SpectrumFrame::Byte(Vec::new()),
    );
    let mut frames = Vec::new();
    for frame in repeat(FrameProfile::cry(), 6) {
        frames.push(frame);
        frames.push(bad.clone());
    }
    let mut source = ScriptedSource::new(FRAME_SAMPLE_RATE, frames);

    let summary = MonitorWorker::new(&config, observer, event_tx, running).run(&mut source);
    assert_eq!(summary.frames_processed, 6);
    assert_eq!(summary.frames_rejected, 6);
    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

#[test]
fn test_worker_exits_when_not_running() {
    let config = AppConfig::default();
    let (observer, seen) = recording_observer();
    let (event_tx, mut event_rx) = tokio::sync::broadcast::channel(8);
    let running = Arc::new(AtomicBool::new(false));

    let mut source = ScriptedSource::new(FRAME_SAMPLE_RATE, repeat(FrameProfile::cry(), 10));
    let summary = MonitorWorker::new(&config, observer, event_tx, running).run(&mut source);

    assert_eq!(summary.frames_processed, 0);
    assert!(!summary.source_closed);
    assert_eq!(source.remaining(), 10);
    assert!(seen.lock().unwrap().is_empty());
    assert!(event_rx.try_recv().is_err());
}
