//! Bounded sample and peak buffers for oscillation tracking

use heapless::Deque;
use relaytune_core::config::MAX_LOOKBACK_SAMPLES;

/// Maximum oscillation peaks recorded in one session
///
/// Reaching this count forces the session to finish.
pub const MAX_PEAKS: usize = 10;

/// Classification of a sample against the lookback window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LocalExtreme {
    /// Strictly greater than every sample in the window
    Max,
    /// Strictly less than every sample in the window
    Min,
    /// Neither
    None,
}

/// Trailing history of process samples, newest first
///
/// Holds at most `limit` samples (never more than 100).
#[derive(Debug, Clone)]
pub struct LookbackWindow {
    samples: Deque<f32, MAX_LOOKBACK_SAMPLES>,
    limit: usize,
}

impl LookbackWindow {
    /// Create an empty window holding up to `limit` samples
    pub fn new(limit: usize) -> Self {
        Self {
            samples: Deque::new(),
            limit: limit.clamp(1, MAX_LOOKBACK_SAMPLES),
        }
    }

    /// Drop all samples and change the window length
    pub fn reset(&mut self, limit: usize) {
        self.samples.clear();
        self.limit = limit.clamp(1, MAX_LOOKBACK_SAMPLES);
    }

    /// Window length in samples
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the window holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, newest first
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }

    /// Classify `value` against the held samples, then push it as newest
    ///
    /// The scan runs oldest to newest. A value that beats an empty window
    /// counts as a maximum.
    pub fn push(&mut self, value: f32) -> LocalExtreme {
        let mut is_max = true;
        let mut is_min = true;

        for &old in self.samples.iter().rev() {
            if is_max {
                is_max = value > old;
            }
            if is_min {
                is_min = value < old;
            }
        }

        if self.samples.len() >= self.limit {
            self.samples.pop_back();
        }
        // Cannot fail: a slot was freed above when at the limit
        let _ = self.samples.push_front(value);

        if is_max {
            LocalExtreme::Max
        } else if is_min {
            LocalExtreme::Min
        } else {
            LocalExtreme::None
        }
    }
}

/// Fixed-capacity record of oscillation peaks
///
/// `count` is the number of completed peaks. The slot at `count` is the
/// peak currently being tracked and is overwritten until the count advances.
#[derive(Debug, Clone)]
pub struct PeakBuffer {
    values: [f32; MAX_PEAKS],
    count: usize,
}

impl Default for PeakBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            values: [0.0; MAX_PEAKS],
            count: 0,
        }
    }

    /// Forget all peaks
    pub fn clear(&mut self) {
        self.values = [0.0; MAX_PEAKS];
        self.count = 0;
    }

    /// Number of completed peaks
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if the peak ceiling has been reached
    pub fn is_full(&self) -> bool {
        self.count >= MAX_PEAKS
    }

    /// Overwrite the in-progress slot
    ///
    /// Returns false (and stores nothing) once the buffer is full.
    pub fn record(&mut self, value: f32) -> bool {
        match self.values.get_mut(self.count) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Close the in-progress peak and move to the next slot
    pub fn advance(&mut self) {
        if self.count < MAX_PEAKS {
            self.count += 1;
        }
    }

    /// Completed peak values, oldest first
    pub fn completed(&self) -> &[f32] {
        &self.values[..self.count]
    }

    /// Mean absolute difference between the three most recent completed peaks
    ///
    /// Returns None until three peaks have completed.
    pub fn average_separation(&self) -> Option<f32> {
        match self.completed() {
            [.., a, b, c] => Some((abs(c - b) + abs(b - a)) / 2.0),
            _ => None,
        }
    }
}

fn abs(x: f32) -> f32 {
    if x < 0.0 {
        -x
    } else {
        x
    }
}
