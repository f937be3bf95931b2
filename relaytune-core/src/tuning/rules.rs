//! Relay-feedback tuning rules
//!
//! The relay experiment yields two numbers describing the process: the
//! ultimate gain `Ku` (from the describing function of an ideal relay)
//! and the ultimate period `Pu`. Controller gains follow from the
//! closed-form rules below.
//!
//! | Type | Kp         | Ki              | Kd                |
//! |------|------------|-----------------|-------------------|
//! | PI   | `0.4 * Ku` | `0.48 * Ku / Pu`| `0`               |
//! | PID  | `0.6 * Ku` | `1.2 * Ku / Pu` | `0.075 * Ku * Pu` |

use core::f32::consts::PI;

use crate::config::ControlType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors when deriving gains from a tuning session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneError {
    /// No session has completed yet
    NotComplete,
    /// Process variable never moved, so the amplitude is zero
    NoOscillation,
    /// Transition timestamps were equal or out of order
    InvalidPeriod,
}

/// Ultimate gain and period measured by a relay experiment
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UltimateParams {
    /// Ultimate gain (Ku)
    pub ku: f32,
    /// Ultimate period in seconds (Pu)
    pub pu: f32,
}

impl UltimateParams {
    /// Compute Ku and Pu from relay excursion and observed oscillation
    ///
    /// # Arguments
    /// - `output_step`: relay excursion (the output swings by `2 * output_step`)
    /// - `abs_max`, `abs_min`: extremes of the process variable
    /// - `latest_ms`, `previous_ms`: the two most recent rising transitions
    ///
    /// No guarding happens here: a flat signal gives an infinite `ku` and
    /// skewed timestamps give a non-positive `pu`. `PidGains::from_ultimate`
    /// rejects both.
    pub fn from_relay(
        output_step: f32,
        abs_max: f32,
        abs_min: f32,
        latest_ms: u64,
        previous_ms: u64,
    ) -> Self {
        let ku = 4.0 * (2.0 * output_step) / (PI * (abs_max - abs_min));
        let pu = (latest_ms as i64 - previous_ms as i64) as f32 / 1000.0;
        Self { ku, pu }
    }
}

/// Controller gains
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidGains {
    /// Proportional gain (Kp)
    pub kp: f32,
    /// Integral gain (Ki)
    pub ki: f32,
    /// Derivative gain (Kd)
    pub kd: f32,
}

impl PidGains {
    /// Derive gains for the given controller type
    pub fn from_ultimate(
        params: UltimateParams,
        control_type: ControlType,
    ) -> Result<Self, TuneError> {
        let UltimateParams { ku, pu } = params;

        if !ku.is_finite() {
            return Err(TuneError::NoOscillation);
        }
        if pu.is_nan() || pu <= 0.0 {
            return Err(TuneError::InvalidPeriod);
        }

        let gains = match control_type {
            ControlType::Pi => Self {
                kp: 0.4 * ku,
                ki: 0.48 * ku / pu,
                kd: 0.0,
            },
            ControlType::Pid => Self {
                kp: 0.6 * ku,
                ki: 1.2 * ku / pu,
                kd: 0.075 * ku * pu,
            },
        };

        Ok(gains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_ultimate_from_relay() {
        // Relay of ±5 driving a ±1 oscillation with a 3 s period
        let params = UltimateParams::from_relay(5.0, 1.0, -1.0, 4000, 1000);
        assert!(close(params.ku, 6.366));
        assert!(close(params.pu, 3.0));
    }

    #[test]
    fn test_pid_rule() {
        let params = UltimateParams { ku: 6.3662, pu: 3.0 };
        let gains = PidGains::from_ultimate(params, ControlType::Pid).unwrap();
        assert!(close(gains.kp, 3.820));
        assert!(close(gains.ki, 2.546));
        assert!(close(gains.kd, 1.432));
    }

    #[test]
    fn test_pi_rule() {
        let params = UltimateParams { ku: 10.0, pu: 2.0 };
        let gains = PidGains::from_ultimate(params, ControlType::Pi).unwrap();
        assert!(close(gains.kp, 4.0));
        assert!(close(gains.ki, 2.4));
        assert_eq!(gains.kd, 0.0);
    }

    #[test]
    fn test_zero_period_rejected() {
        let params = UltimateParams::from_relay(5.0, 1.0, -1.0, 2000, 2000);
        assert_eq!(
            PidGains::from_ultimate(params, ControlType::Pid),
            Err(TuneError::InvalidPeriod)
        );
    }

    #[test]
    fn test_skewed_period_rejected() {
        let params = UltimateParams::from_relay(5.0, 1.0, -1.0, 1000, 4000);
        assert!(params.pu < 0.0);
        assert_eq!(
            PidGains::from_ultimate(params, ControlType::Pi),
            Err(TuneError::InvalidPeriod)
        );
    }

    #[test]
    fn test_flat_signal_rejected() {
        let params = UltimateParams::from_relay(5.0, 2.0, 2.0, 4000, 1000);
        assert_eq!(
            PidGains::from_ultimate(params, ControlType::Pid),
            Err(TuneError::NoOscillation)
        );
    }
}
