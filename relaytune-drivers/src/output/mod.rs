//! Process output implementations

pub mod pwm;

pub use pwm::PwmOutput;
