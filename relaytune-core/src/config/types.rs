//! Configuration type definitions
//!
//! These types describe how a tuning session is run. A `TunerConfig` is
//! captured when a session starts and stays fixed until it ends.

use heapless::{String, Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 16;

/// Maximum number of independently tuned loops
pub const MAX_LOOPS: usize = 4;

/// Largest lookback window, in samples
pub const MAX_LOOKBACK_SAMPLES: usize = 100;

/// Sample interval used for short lookbacks (4 samples per second)
pub const FAST_SAMPLE_TIME_MS: u32 = 250;

/// Lookback durations below this many seconds use the fast sample rate
const FAST_REGIME_LIMIT_S: u32 = 25;

/// Controller type the gains are derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControlType {
    /// Proportional + integral (Kd = 0)
    #[default]
    Pi,
    /// Full PID
    Pid,
}

/// Sample cadence and window length derived from a lookback duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lookback {
    /// Minimum interval between accepted samples (ms)
    pub sample_time_ms: u32,
    /// Window length in samples (1..=100)
    pub samples: usize,
}

impl Lookback {
    /// Derive the sample cadence from a lookback duration
    ///
    /// Short lookbacks (< 25 s) sample at 4 Hz with a window of
    /// `4 * seconds` samples. Longer lookbacks keep a 100-sample window
    /// and stretch the interval to `seconds * 10` ms. Values below one
    /// second are clamped to one.
    pub fn from_seconds(seconds: i32) -> Self {
        let seconds = seconds.max(1) as u32;

        if seconds < FAST_REGIME_LIMIT_S {
            Self {
                sample_time_ms: FAST_SAMPLE_TIME_MS,
                samples: (seconds * 4) as usize,
            }
        } else {
            Self {
                sample_time_ms: seconds.saturating_mul(10),
                samples: MAX_LOOKBACK_SAMPLES,
            }
        }
    }

    /// Lookback duration covered by the window, in whole seconds
    pub fn seconds(&self) -> u32 {
        let total_ms = (self.samples as u64) * (self.sample_time_ms as u64);
        (total_ms / 1000) as u32
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self::from_seconds(10)
    }
}

/// Autotune configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TunerConfig {
    /// Relay excursion applied around the starting output
    ///
    /// The output swings between `start + step` and `start - step`.
    pub output_step: f32,
    /// Hysteresis around the starting measurement
    ///
    /// The relay only flips once the measurement leaves
    /// `setpoint ± noise_band`.
    pub noise_band: f32,
    /// Controller type the gains are derived for
    pub control_type: ControlType,
    /// Sample cadence and extremum window
    pub lookback: Lookback,
}

impl TunerConfig {
    /// Create a configuration from a lookback duration in seconds
    pub fn new(
        output_step: f32,
        noise_band: f32,
        control_type: ControlType,
        lookback_seconds: i32,
    ) -> Self {
        Self {
            output_step,
            noise_band,
            control_type,
            lookback: Lookback::from_seconds(lookback_seconds),
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            output_step: 30.0,
            noise_band: 0.5,
            control_type: ControlType::Pi,
            lookback: Lookback::default(),
        }
    }
}

/// Tuning configuration for one named control loop
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoopTuning {
    /// Loop name (e.g. "left", "right")
    pub name: String<MAX_LABEL_LEN>,
    /// Configuration used when tuning this loop
    pub config: TunerConfig,
}

/// Complete tuning configuration
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TuningSettings {
    /// Values from the root `[autotune]` section
    pub defaults: TunerConfig,
    /// Per-loop overrides
    pub loops: Vec<LoopTuning, MAX_LOOPS>,
}

impl TuningSettings {
    /// Find the configuration for a named loop
    ///
    /// Falls back to the defaults when the loop has no section of its own.
    pub fn for_loop(&self, name: &str) -> TunerConfig {
        self.loops
            .iter()
            .find(|l| l.name.as_str() == name)
            .map(|l| l.config)
            .unwrap_or(self.defaults)
    }

    /// Index of a named loop, used as its calibration slot
    pub fn loop_index(&self, name: &str) -> Option<u8> {
        self.loops
            .iter()
            .position(|l| l.name.as_str() == name)
            .map(|i| i as u8)
    }
}
