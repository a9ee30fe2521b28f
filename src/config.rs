//! Configuration management for detector tuning
//!
//! This module provides runtime configuration loading from JSON files so the
//! empirical thresholds, band edges and analyser parameters can be adjusted
//! without recompilation. Every default equals the calibrated constant the
//! detector ships with; a missing or malformed file falls back to them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::classifier::{
    CONSISTENT_FREQ_MIN, CONSISTENT_HIGH_ENERGY_MIN, HARMONICS_THRESHOLD,
    STRONG_FUNDAMENTAL_THRESHOLD, SUFFICIENT_VOLUME_THRESHOLD,
};
use crate::analysis::features::{
    FUNDAMENTAL_HIGH_HZ, FUNDAMENTAL_LOW_HZ, HARMONIC_HIGH_HZ, LOUDNESS_SCALE,
};
use crate::analysis::smoother::{
    FREQ_PATTERN_THRESHOLD, HIGH_ENERGY_THRESHOLD, HISTORY_CAPACITY, RECENT_WINDOW,
};
use crate::audio::analyser::{
    DEFAULT_FFT_SIZE, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS, DEFAULT_SMOOTHING,
};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub bands: BandConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Classifier and consistency thresholds
///
/// These are calibration parameters, not derived quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Scale applied to frame RMS to get loudness
    pub loudness_scale: f32,
    /// Loudness a frame must exceed to count as sufficiently loud
    pub sufficient_volume: f32,
    /// Fundamental-band ratio for a strong fundamental
    pub strong_fundamental: f32,
    /// Harmonic-band ratio for audible harmonics
    pub harmonics: f32,
    /// Loudness a history entry must exceed to count toward energy consistency
    pub high_energy: f32,
    /// Fundamental ratio a history entry must exceed to count toward pattern consistency
    pub freq_pattern: f32,
    /// Minimum loud entries among the recent window
    pub consistent_high_energy_min: usize,
    /// Minimum fundamental-pattern entries among the recent window
    pub consistent_freq_min: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            loudness_scale: LOUDNESS_SCALE,
            sufficient_volume: SUFFICIENT_VOLUME_THRESHOLD,
            strong_fundamental: STRONG_FUNDAMENTAL_THRESHOLD,
            harmonics: HARMONICS_THRESHOLD,
            high_energy: HIGH_ENERGY_THRESHOLD,
            freq_pattern: FREQ_PATTERN_THRESHOLD,
            consistent_high_energy_min: CONSISTENT_HIGH_ENERGY_MIN,
            consistent_freq_min: CONSISTENT_FREQ_MIN,
        }
    }
}

/// Frequency band edges in Hz
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub fundamental_low_hz: f32,
    pub fundamental_high_hz: f32,
    pub harmonic_high_hz: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            fundamental_low_hz: FUNDAMENTAL_LOW_HZ,
            fundamental_high_hz: FUNDAMENTAL_HIGH_HZ,
            harmonic_high_hz: HARMONIC_HIGH_HZ,
        }
    }
}

/// Sliding history sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained entries per history
    pub capacity: usize,
    /// Number of most recent entries inspected for consistency
    pub recent_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: HISTORY_CAPACITY,
            recent_window: RECENT_WINDOW,
        }
    }
}

/// Spectrum analyser parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Analysis window in samples; the spectrum carries half as many bins
    pub fft_size: usize,
    /// Temporal smoothing between consecutive spectra (0.0 - 1.0)
    pub smoothing_time_constant: f32,
    /// Level mapped to byte value 0
    pub min_decibels: f32,
    /// Level mapped to byte value 255
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing_time_constant: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Size of buffer pool for real-time audio transfer
    pub buffer_pool_size: usize,
    /// Size of each audio buffer in samples
    pub buffer_size: usize,
    /// Worker sleep between polls when no new audio has arrived
    pub poll_interval_ms: u64,
    /// Samples advanced per tick for offline sources (≈ one 60 Hz refresh at 44.1 kHz)
    pub hop_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 32,
            buffer_size: 4096,
            poll_interval_ms: 5,
            hop_size: 735,
        }
    }
}

/// Logging cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log frame statistics every N frames (0 disables)
    pub log_every_n_frames: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_every_n_frames: 600,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults when the file is missing or
    /// its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/cry_config.json")
    }
}
