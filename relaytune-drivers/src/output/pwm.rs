//! PWM process output
//!
//! Maps a command in a configured `[min, max]` range onto the duty cycle
//! of any `embedded_hal::pwm::SetDutyCycle` channel.

use embedded_hal::pwm::SetDutyCycle;
use relaytune_core::traits::ProcessOutput;

/// PWM-driven process output
///
/// Commands outside `[min, max]` are clamped. The last clamped command is
/// reported back through [`ProcessOutput::output`], so a tuner started on
/// this output sees the value actually applied.
pub struct PwmOutput<P> {
    pwm: P,
    min: f32,
    max: f32,
    value: f32,
    /// Set when the PWM channel rejected a duty update
    fault: bool,
}

impl<P: SetDutyCycle> PwmOutput<P> {
    /// Create a new PWM output
    ///
    /// # Arguments
    /// - `pwm`: The PWM channel to drive
    /// - `min`: Command mapped to 0% duty
    /// - `max`: Command mapped to 100% duty
    ///
    /// The output starts at `min`.
    pub fn new(pwm: P, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut output = Self {
            pwm,
            min,
            max,
            value: min,
            fault: false,
        };
        output.set_output(min);
        output
    }

    /// Duty cycle for a command value
    pub fn duty_for(&self, value: f32) -> u16 {
        let span = self.max - self.min;
        if span.is_nan() || span <= 0.0 {
            return 0;
        }

        let fraction = (self.clamp(value) - self.min) / span;
        let max_duty = self.pwm.max_duty_cycle() as f32;
        (fraction * max_duty + 0.5) as u16
    }

    /// Check if a duty update has failed since the last `clear_fault`
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    pub fn clear_fault(&mut self) {
        self.fault = false;
    }

    /// Get access to the PWM channel
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Release the PWM channel
    pub fn release(self) -> P {
        self.pwm
    }

    fn clamp(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }
}

impl<P: SetDutyCycle> ProcessOutput for PwmOutput<P> {
    fn output(&self) -> f32 {
        self.value
    }

    fn set_output(&mut self, value: f32) {
        let duty = self.duty_for(value);
        self.value = self.clamp(value);

        if self.pwm.set_duty_cycle(duty).is_err() {
            self.fault = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::pwm::{ErrorKind, ErrorType};

    /// Mock PWM channel for testing
    struct MockPwm {
        duty: u16,
        max: u16,
        fail: bool,
    }

    impl MockPwm {
        fn new(max: u16) -> Self {
            Self {
                duty: u16::MAX,
                max,
                fail: false,
            }
        }
    }

    impl ErrorType for MockPwm {
        type Error = ErrorKind;
    }

    impl SetDutyCycle for MockPwm {
        fn max_duty_cycle(&self) -> u16 {
            self.max
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn test_starts_at_min() {
        let output = PwmOutput::new(MockPwm::new(1000), 0.0, 100.0);
        assert_eq!(output.output(), 0.0);
        assert_eq!(output.pwm().duty, 0);
    }

    #[test]
    fn test_command_maps_to_duty() {
        let mut output = PwmOutput::new(MockPwm::new(1000), 0.0, 100.0);

        output.set_output(25.0);
        assert_eq!(output.pwm().duty, 250);

        output.set_output(100.0);
        assert_eq!(output.pwm().duty, 1000);
    }

    #[test]
    fn test_offset_range() {
        let mut output = PwmOutput::new(MockPwm::new(255), -50.0, 50.0);
        output.set_output(0.0);
        assert_eq!(output.pwm().duty, 128);
    }

    #[test]
    fn test_commands_clamped() {
        let mut output = PwmOutput::new(MockPwm::new(1000), 0.0, 100.0);

        output.set_output(130.0);
        assert_eq!(output.output(), 100.0);
        assert_eq!(output.pwm().duty, 1000);

        output.set_output(-5.0);
        assert_eq!(output.output(), 0.0);
        assert_eq!(output.pwm().duty, 0);
    }

    #[test]
    fn test_pwm_error_latches_fault() {
        let output = PwmOutput::new(MockPwm::new(1000), 0.0, 100.0);
        assert!(!output.has_fault());

        let mut pwm = output.release();
        pwm.fail = true;
        let mut output = PwmOutput::new(pwm, 0.0, 100.0);
        assert!(output.has_fault());

        output.clear_fault();
        output.set_output(10.0);
        assert!(output.has_fault());
    }

    #[test]
    fn test_drives_autotuner() {
        use crate::autotune::{Autotuner, TuneState};
        use relaytune_core::config::{ControlType, TunerConfig};
        use relaytune_core::traits::ProcessInput;

        struct Level(f32);

        impl ProcessInput for Level {
            fn read(&mut self) -> f32 {
                self.0
            }
        }

        let mut output = PwmOutput::new(MockPwm::new(1000), 0.0, 100.0);
        output.set_output(40.0);

        let mut tuner = Autotuner::new(
            Level(20.0),
            output,
            TunerConfig::new(10.0, 0.5, ControlType::Pi, 1),
        );
        tuner.step(0);
        assert_eq!(tuner.output().pwm().duty, 500);

        tuner.input_mut().0 = 21.0;
        tuner.step(250);
        assert_eq!(tuner.output().pwm().duty, 300);

        tuner.cancel();
        assert_eq!(tuner.state(), TuneState::Cancelled);
        assert_eq!(tuner.output().pwm().duty, 400);
    }
}
