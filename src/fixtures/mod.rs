//! Fixture utilities for offline analysis.
//!
//! This module discovers WAV fixtures on disk, parses optional expectation
//! JSON, and replays decoded PCM through the same detector the live worker
//! uses. It backs the CLI `analyze` command and the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::state::{CryState, Transition};
use crate::analysis::CryDetector;
use crate::audio::source::{read_wav, FrameSource, PcmSource, SourcePoll};
use crate::config::AppConfig;
use crate::error::log_frame_error;

/// Default location for fixture WAV/JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub wav_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture data with decoded PCM samples.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub events: Vec<ExpectedTransition>,
}

impl FixtureExpectations {
    /// Compare detected transitions with the expected ones, in order
    pub fn verify(&self, actual: &[DetectedTransition]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.events.iter().enumerate() {
            match actual.get(idx) {
                Some(event) => {
                    let delta = (event.offset_ms as f32 - expected.offset_ms).abs();
                    if event.transition != expected.transition || delta > expected.tolerance_ms {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(event.clone()),
                            delta_ms: Some(delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    delta_ms: None,
                }),
            }
        }

        for (idx, event) in actual.iter().enumerate().skip(self.events.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(event.clone()),
                delta_ms: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected state change definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedTransition {
    pub transition: Transition,
    pub offset_ms: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f32,
}

fn default_tolerance() -> f32 {
    100.0
}

/// A state change observed while replaying a fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTransition {
    pub transition: Transition,
    pub frame_index: u64,
    /// Audio consumed when the change was published
    pub offset_ms: u64,
    pub level: f32,
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    /// `None` for an unexpected extra transition
    pub expected: Option<ExpectedTransition>,
    pub actual: Option<DetectedTransition>,
    pub delta_ms: Option<f32>,
}

/// Load and parse an expectation file.
pub fn load_expectations(path: &Path) -> Result<FixtureExpectations> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading expectation {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("wav") {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load fixture samples + expectations for provided name or path.
    ///
    /// An explicit `override_expect` wins over a sibling `<name>.expect.json`.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let wav_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&wav_path)?;
        let (samples, sample_rate) = read_wav(&wav_path)?;

        let expectations = match override_expect.or_else(|| metadata.expect_path.clone()) {
            Some(path) => Some(load_expectations(&path)?),
            None => None,
        };

        Ok(FixtureData {
            metadata,
            sample_rate,
            samples,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.wav"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, wav_path: &Path) -> Result<FixtureMetadata> {
        let name = wav_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", wav_path.display()))?
            .to_string();
        let expect_path = wav_path.with_extension("expect.json");
        Ok(FixtureMetadata {
            name,
            wav_path: wav_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Result of replaying one fixture.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureRun {
    pub transitions: Vec<DetectedTransition>,
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub final_state: CryState,
    /// Highest per-frame level seen
    pub peak_level: f32,
}

/// Executes fixtures by feeding decoded PCM through the detector.
pub struct FixtureProcessor {
    config: AppConfig,
}

impl FixtureProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, data: &FixtureData) -> FixtureRun {
        self.run_samples(data.samples.clone(), data.sample_rate)
    }

    /// Replay mono PCM at the configured hop size
    pub fn run_samples(&self, samples: Vec<f32>, sample_rate: u32) -> FixtureRun {
        let mut source = PcmSource::from_samples(samples, sample_rate, &self.config);
        self.run_source(&mut source)
    }

    /// Drain `source` through a fresh detector.
    ///
    /// Offline sources never pend; a pending poll ends the run like a close.
    pub fn run_source(&self, source: &mut dyn FrameSource) -> FixtureRun {
        let mut detector = CryDetector::new(&self.config);
        let mut transitions = Vec::new();
        let mut peak_level = 0.0f32;

        loop {
            let frame = match source.poll_frame() {
                SourcePoll::Ready(frame) => frame,
                SourcePoll::Pending | SourcePoll::Closed => break,
            };

            match detector.process(&frame) {
                Ok(report) => {
                    peak_level = peak_level.max(report.level());
                    if let Some(transition) = report.transition {
                        transitions.push(DetectedTransition {
                            transition,
                            frame_index: report.frame_index,
                            offset_ms: source.position_ms(),
                            level: report.level(),
                        });
                    }
                }
                Err(err) => log_frame_error(&err, detector.frames_processed()),
            }
        }

        tracing::debug!(
            frames = detector.frames_processed(),
            transitions = transitions.len(),
            "[FixtureProcessor] Replay finished"
        );

        FixtureRun {
            transitions,
            frames_processed: detector.frames_processed(),
            frames_rejected: detector.frames_rejected(),
            final_state: detector.state(),
            peak_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::ScriptedSource;
    use crate::testing::frames::{repeat, FrameProfile, FRAME_SAMPLE_RATE};
    use crate::testing::signals::{SignalPattern, SignalSpec};

    fn started(offset_ms: u64) -> DetectedTransition {
        DetectedTransition {
            transition: Transition::CryingStarted,
            frame_index: 3,
            offset_ms,
            level: 50.0,
        }
    }

    fn expectations(events: Vec<ExpectedTransition>) -> FixtureExpectations {
        FixtureExpectations {
            fixture: "unit".to_string(),
            notes: None,
            events,
        }
    }

    #[test]
    fn test_verify_accepts_within_tolerance() {
        let expect = expectations(vec![ExpectedTransition {
            transition: Transition::CryingStarted,
            offset_ms: 100.0,
            tolerance_ms: 50.0,
        }]);
        assert!(expect.verify(&[started(140)]).is_ok());
    }

    #[test]
    fn test_verify_reports_late_missing_and_extra() {
        let expect = expectations(vec![
            ExpectedTransition {
                transition: Transition::CryingStarted,
                offset_ms: 100.0,
                tolerance_ms: 10.0,
            },
            ExpectedTransition {
                transition: Transition::CryingStopped,
                offset_ms: 900.0,
                tolerance_ms: 10.0,
            },
        ]);

        let diff = expect.verify(&[started(200)]).unwrap_err();
        assert_eq!(diff.failures.len(), 2);
        assert_eq!(diff.failures[0].delta_ms, Some(100.0));
        assert!(diff.failures[1].actual.is_none());

        let diff = expectations(Vec::new()).verify(&[started(0)]).unwrap_err();
        assert_eq!(diff.failures.len(), 1);
        assert!(diff.failures[0].expected.is_none());
        assert_eq!(diff.to_json()["failures"][0]["actual"]["transition"], "crying_started");
    }

    #[test]
    fn test_expectation_json_defaults_tolerance() {
        let json = r#"{
            "fixture": "cry",
            "events": [{ "transition": "crying_started", "offset_ms": 66.0 }]
        }"#;
        let parsed: FixtureExpectations = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.events[0].tolerance_ms, 100.0);
        assert_eq!(parsed.events[0].transition, Transition::CryingStarted);
    }

    #[test]
    fn test_scripted_cry_detected_on_fourth_frame() {
        let processor = FixtureProcessor::new(AppConfig::default());
        let mut source = ScriptedSource::new(FRAME_SAMPLE_RATE, repeat(FrameProfile::cry(), 12));
        let run = processor.run_source(&mut source);

        assert_eq!(run.frames_processed, 12);
        assert_eq!(run.transitions.len(), 1);
        assert_eq!(run.transitions[0].transition, Transition::CryingStarted);
        assert_eq!(run.transitions[0].frame_index, 3);
        assert_eq!(run.final_state, CryState::Crying);
    }

    #[test]
    fn test_cry_tone_detected_early() {
        let spec = SignalSpec::new(SignalPattern::CryTone).with_duration_ms(1_000);
        let run = FixtureProcessor::new(AppConfig::default()).run_samples(spec.generate(), spec.sample_rate);

        let first = run.transitions.first().expect("cry tone should be detected");
        assert_eq!(first.transition, Transition::CryingStarted);
        assert!(first.offset_ms <= 250, "detected at {} ms", first.offset_ms);
        assert!(run.peak_level > 12.0);
    }

    #[test]
    fn test_silence_produces_no_transitions() {
        let spec = SignalSpec::new(SignalPattern::Silence).with_duration_ms(500);
        let run = FixtureProcessor::new(AppConfig::default()).run_samples(spec.generate(), spec.sample_rate);
        assert!(run.transitions.is_empty());
        assert_eq!(run.final_state, CryState::NotCrying);
        assert!(run.frames_processed > 0);
    }

    #[test]
    fn test_empty_input_is_empty_run() {
        let run = FixtureProcessor::new(AppConfig::default()).run_samples(Vec::new(), 44_100);
        assert_eq!(run.frames_processed, 0);
        assert!(run.transitions.is_empty());
    }

    #[test]
    fn test_catalog_missing_root_is_empty() {
        let catalog = FixtureCatalog::new("/nonexistent/cry-fixtures");
        assert!(catalog.discover().unwrap().is_empty());
        assert!(catalog.load("nothing", None).is_err());
    }
}
