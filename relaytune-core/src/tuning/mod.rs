//! Tuning rules
//!
//! Conversion from relay oscillation measurements to controller gains.

pub mod rules;

pub use rules::{PidGains, TuneError, UltimateParams};
