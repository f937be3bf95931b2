//! Process variable, process output and clock traits

/// Trait for the measured process variable
///
/// Implementations wrap whatever produces the measurement (ADC channel,
/// encoder velocity, filtered sensor value). The tuner performs no
/// conversion or filtering on the returned value.
pub trait ProcessInput {
    /// Read the current measured value
    ///
    /// Takes `&mut self` because sensor reads typically require mutable access.
    fn read(&mut self) -> f32;
}

/// Trait for the manipulated process output
///
/// Commands are treated as immediate and synchronous.
pub trait ProcessOutput {
    /// Get the last commanded value
    fn output(&self) -> f32;

    /// Command a new output value
    fn set_output(&mut self, value: f32);
}

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

impl<T: ProcessInput + ?Sized> ProcessInput for &mut T {
    fn read(&mut self) -> f32 {
        (**self).read()
    }
}

impl<T: ProcessOutput + ?Sized> ProcessOutput for &mut T {
    fn output(&self) -> f32 {
        (**self).output()
    }

    fn set_output(&mut self, value: f32) {
        (**self).set_output(value)
    }
}
