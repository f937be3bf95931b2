//! Configuration types
//!
//! Tuner configuration, persisted gain calibration and a TOML-subset
//! parser for the configuration.

pub mod calibration;
pub mod toml;
pub mod types;

pub use calibration::{CalibrationData, CalibrationError, LoopCalibration};
pub use toml::{parse_tuning, ParseError};
pub use types::*;
