//! Board-agnostic core types for relay-feedback PID autotuning
//!
//! This crate contains everything the tuner needs that does not depend on
//! a particular engine or board:
//!
//! - Collaborator traits (process input, process output, clock)
//! - Tuner configuration and the lookback sampling rule
//! - Tuning rules turning ultimate gain/period into PI/PID gains
//! - Persisted gain calibration
//! - A minimal TOML-subset configuration parser

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod traits;
pub mod tuning;
