//! Collaborator traits
//!
//! These traits define the interface between the autotune engine and the
//! process it is tuning.

pub mod process;

pub use process::{Clock, ProcessInput, ProcessOutput};
