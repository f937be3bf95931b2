//! Relay-feedback autotune
//!
//! The engine lives in [`engine`]; [`window`] holds the fixed-capacity
//! buffers it tracks the oscillation with.

pub mod engine;
pub mod window;

pub use engine::{Autotuner, PeakPhase, TuneResult, TuneState, TuneStatus, WARMUP_SAMPLES};
pub use window::{LocalExtreme, LookbackWindow, PeakBuffer, MAX_PEAKS};
