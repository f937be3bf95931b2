//! Autotune engine and process adapters
//!
//! This crate provides the implementations built on the traits defined
//! in relaytune-core:
//!
//! - Relay-feedback autotune state machine
//! - PWM process output

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod autotune;
pub mod output;
