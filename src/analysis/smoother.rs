// TemporalSmoother - bounded loudness/fundamental histories
//
// Single frames of noise are rejected by requiring several of the most
// recent frames to agree. Each history keeps at most `capacity` entries
// (FIFO); consistency is counted over the last `recent_window` of them.
// Until the window fills, counts stay low, so detection is biased toward
// "not crying" during warm-up.

use std::collections::VecDeque;

use crate::config::{DetectionConfig, HistoryConfig};

/// Entries retained per history
pub const HISTORY_CAPACITY: usize = 20;

/// Most recent entries inspected for consistency
pub const RECENT_WINDOW: usize = 8;

/// Loudness an entry must exceed to count as high energy
pub const HIGH_ENERGY_THRESHOLD: f32 = 10.0;

/// Fundamental ratio an entry must exceed to count toward the pattern
pub const FREQ_PATTERN_THRESHOLD: f32 = 0.08;

/// Bounded FIFO of recent values
#[derive(Debug, Clone)]
pub struct SlidingHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl SlidingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a value, evicting the oldest past capacity
    pub fn push(&mut self, value: f32) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Count of values above `threshold` among the last `window` entries
    pub fn count_recent_above(&self, window: usize, threshold: f32) -> usize {
        let skip = self.values.len().saturating_sub(window);
        self.values
            .iter()
            .skip(skip)
            .filter(|&&value| value > threshold)
            .count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values oldest first
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Consistency counts over the recent window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConsistencyCounts {
    /// Recent loudness entries above the high-energy threshold
    pub high_energy: usize,
    /// Recent fundamental-ratio entries above the pattern threshold
    pub freq_pattern: usize,
}

/// Maintains both histories and derives [`ConsistencyCounts`]
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    loudness: SlidingHistory,
    fundamental: SlidingHistory,
    recent_window: usize,
    high_energy_threshold: f32,
    freq_pattern_threshold: f32,
}

impl TemporalSmoother {
    pub fn new(history: &HistoryConfig, detection: &DetectionConfig) -> Self {
        let capacity = history.capacity.max(1);
        Self {
            loudness: SlidingHistory::new(capacity),
            fundamental: SlidingHistory::new(capacity),
            recent_window: history.recent_window.clamp(1, capacity),
            high_energy_threshold: detection.high_energy,
            freq_pattern_threshold: detection.freq_pattern,
        }
    }

    /// Record one frame and return the updated counts
    pub fn update(&mut self, loudness: f32, fundamental_ratio: f32) -> ConsistencyCounts {
        self.loudness.push(loudness);
        self.fundamental.push(fundamental_ratio);

        ConsistencyCounts {
            high_energy: self
                .loudness
                .count_recent_above(self.recent_window, self.high_energy_threshold),
            freq_pattern: self
                .fundamental
                .count_recent_above(self.recent_window, self.freq_pattern_threshold),
        }
    }

    pub fn loudness_history(&self) -> &SlidingHistory {
        &self.loudness
    }

    pub fn fundamental_history(&self) -> &SlidingHistory {
        &self.fundamental
    }

    pub fn recent_window(&self) -> usize {
        self.recent_window
    }

    /// Discard both histories
    pub fn reset(&mut self) {
        self.loudness.clear();
        self.fundamental.clear();
    }
}
