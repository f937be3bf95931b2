//! Relay-feedback PID autotuner
//!
//! Replaces the controller with a two-level relay around the output value
//! found when tuning starts. The relay flips whenever the measurement
//! leaves a noise band around its own starting value, forcing a bounded
//! oscillation. Successive peaks of that oscillation are tracked until
//! they stop drifting (or the peak buffer fills), then the ultimate gain
//! and period are computed and the output is restored.
//!
//! The engine never sleeps. Call [`Autotuner::step`] as often as the
//! control loop runs; ticks arriving before the configured sample interval
//! are ignored.

use relaytune_core::config::{ControlType, Lookback, LoopCalibration, TunerConfig};
use relaytune_core::traits::{Clock, ProcessInput, ProcessOutput};
use relaytune_core::tuning::{PidGains, TuneError, UltimateParams};

use super::window::{LocalExtreme, LookbackWindow, PeakBuffer};

/// Samples a session must take before local extremes are trusted
pub const WARMUP_SAMPLES: u32 = 9;

/// Peaks have settled when their spread drops below this share of the
/// observed process range
const CONVERGENCE_RATIO: f32 = 0.05;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneStatus {
    /// Session still running (or tick ignored)
    Continue,
    /// Session finished on this tick, results available
    Done,
}

/// Autotune lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneState {
    /// No session started yet
    Idle,
    /// Relay oscillation in progress
    Running,
    /// Peaks settled, results available
    Converged,
    /// Peak buffer filled before peaks settled, results available
    ForceTerminated,
    /// Cancelled by the caller
    Cancelled,
}

/// Direction of the oscillation since the last reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeakPhase {
    /// No extreme seen yet
    Unknown,
    /// Last extreme was a local maximum
    Rising,
    /// Last extreme was a local minimum
    Falling,
}

/// Measurements of a finished session
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuneResult {
    /// Ultimate gain and period
    pub ultimate: UltimateParams,
    /// Controller type the session was configured for
    pub control_type: ControlType,
    /// True if the peak ceiling ended the session
    pub forced: bool,
}

impl TuneResult {
    /// Derive controller gains
    pub fn gains(&self) -> Result<PidGains, TuneError> {
        PidGains::from_ultimate(self.ultimate, self.control_type)
    }
}

/// Relay autotuner state machine
pub struct Autotuner<I, O> {
    input: I,
    output: O,
    /// Applied at the next session start
    config: TunerConfig,
    /// Captured at session start
    active: TunerConfig,
    state: TuneState,
    setpoint: f32,
    output_start: f32,
    abs_max: f32,
    abs_min: f32,
    window: LookbackWindow,
    phase: PeakPhase,
    /// Latest and previous rising-phase timestamps (ms)
    peak_times: [u64; 2],
    peaks: PeakBuffer,
    last_sample_ms: Option<u64>,
    sample_count: u32,
    result: Option<TuneResult>,
}

impl<I: ProcessInput, O: ProcessOutput> Autotuner<I, O> {
    /// Create a new autotuner
    pub fn new(input: I, output: O, config: TunerConfig) -> Self {
        Self {
            input,
            output,
            config,
            active: config,
            state: TuneState::Idle,
            setpoint: 0.0,
            output_start: 0.0,
            abs_max: 0.0,
            abs_min: 0.0,
            window: LookbackWindow::new(config.lookback.samples),
            phase: PeakPhase::Unknown,
            peak_times: [0; 2],
            peaks: PeakBuffer::new(),
            last_sample_ms: None,
            sample_count: 0,
            result: None,
        }
    }

    /// Set tuning parameters for the next session
    ///
    /// A running session keeps the parameters it started with.
    pub fn configure(
        &mut self,
        output_step: f32,
        noise_band: f32,
        control_type: ControlType,
        lookback_seconds: i32,
    ) {
        self.config = TunerConfig::new(output_step, noise_band, control_type, lookback_seconds);
    }

    /// Replace the configuration used by the next session
    pub fn set_config(&mut self, config: TunerConfig) {
        self.config = config;
    }

    /// Configuration for the next session
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Relay amplitude for the next session
    pub fn output_step(&self) -> f32 {
        self.config.output_step
    }

    /// Hysteresis half-width for the next session
    pub fn noise_band(&self) -> f32 {
        self.config.noise_band
    }

    /// Controller type for the next session
    pub fn control_type(&self) -> ControlType {
        self.config.control_type
    }

    /// Lookback sampling for the next session
    pub fn lookback(&self) -> Lookback {
        self.config.lookback
    }

    /// Lookback duration in whole seconds
    pub fn lookback_seconds(&self) -> u32 {
        self.config.lookback.seconds()
    }

    /// Get current state
    pub fn state(&self) -> TuneState {
        self.state
    }

    /// Check if a session is in progress
    pub fn is_running(&self) -> bool {
        self.state == TuneState::Running
    }

    /// Completed peak count for the current (or last) session
    pub fn peak_count(&self) -> usize {
        self.peaks.count()
    }

    /// Oscillation direction since the last reversal
    pub fn phase(&self) -> PeakPhase {
        self.phase
    }

    /// Measurement captured when the session started
    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    /// Output captured when the session started
    pub fn output_start(&self) -> f32 {
        self.output_start
    }

    /// Highest and lowest measurement seen this session
    pub fn extremes(&self) -> (f32, f32) {
        (self.abs_max, self.abs_min)
    }

    /// Samples accepted this session
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Result of the last finished session
    ///
    /// Cleared when a new session starts.
    pub fn result(&self) -> Option<&TuneResult> {
        self.result.as_ref()
    }

    /// Ultimate gain and period of the last finished session
    pub fn ultimate(&self) -> Option<UltimateParams> {
        self.result.map(|r| r.ultimate)
    }

    /// Controller gains from the last finished session
    pub fn gains(&self) -> Result<PidGains, TuneError> {
        self.result.ok_or(TuneError::NotComplete)?.gains()
    }

    /// Proportional gain from the last finished session
    pub fn kp(&self) -> Result<f32, TuneError> {
        self.gains().map(|g| g.kp)
    }

    /// Integral gain from the last finished session
    pub fn ki(&self) -> Result<f32, TuneError> {
        self.gains().map(|g| g.ki)
    }

    /// Derivative gain from the last finished session
    pub fn kd(&self) -> Result<f32, TuneError> {
        self.gains().map(|g| g.kd)
    }

    /// Package the last result for persistent storage
    pub fn calibration(&self, loop_index: u8) -> Result<LoopCalibration, TuneError> {
        let result = self.result.ok_or(TuneError::NotComplete)?;
        Ok(LoopCalibration::from_autotune(
            loop_index,
            result.gains()?,
            result.ultimate,
        ))
    }

    /// Get access to the process input
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Get access to the process output
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Get mutable access to the process input
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// Get mutable access to the process output
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Release the process input and output
    pub fn into_parts(self) -> (I, O) {
        (self.input, self.output)
    }

    /// Stop the session
    ///
    /// Restores the starting output if a session was running. Oscillation
    /// data is discarded and no gains are computed. No-op when idle.
    pub fn cancel(&mut self) {
        if self.state != TuneState::Running {
            return;
        }

        self.output.set_output(self.output_start);
        self.state = TuneState::Cancelled;

        #[cfg(feature = "defmt")]
        defmt::info!("autotune: cancelled after {} peaks", self.peaks.count());
    }

    /// Run one tick using the given clock
    pub fn poll<C: Clock>(&mut self, clock: &C) -> TuneStatus {
        self.step(clock.now_ms())
    }

    /// Run one tick
    ///
    /// Starts a session on the first accepted sample when none is running.
    pub fn step(&mut self, now_ms: u64) -> TuneStatus {
        if self.is_running() && self.peaks.is_full() {
            self.finish(true);
            return TuneStatus::Done;
        }

        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < u64::from(self.sample_time_ms()) {
                return TuneStatus::Continue;
            }
        }
        self.last_sample_ms = Some(now_ms);

        let reference = self.input.read();

        if self.is_running() {
            if reference > self.abs_max {
                self.abs_max = reference;
            }
            if reference < self.abs_min {
                self.abs_min = reference;
            }
        } else {
            self.start(reference, now_ms);
        }
        self.sample_count = self.sample_count.saturating_add(1);

        self.run_relay(reference);

        let extreme = self.window.push(reference);
        if self.sample_count < WARMUP_SAMPLES {
            return TuneStatus::Continue;
        }

        if self.track_peaks(extreme, reference, now_ms) && self.has_settled() {
            self.finish(false);
            return TuneStatus::Done;
        }

        TuneStatus::Continue
    }

    fn sample_time_ms(&self) -> u32 {
        if self.is_running() {
            self.active.lookback.sample_time_ms
        } else {
            self.config.lookback.sample_time_ms
        }
    }

    /// Begin a new session around the current measurement
    fn start(&mut self, reference: f32, now_ms: u64) {
        self.active = self.config;
        self.state = TuneState::Running;
        self.setpoint = reference;
        self.output_start = self.output.output();
        self.abs_max = reference;
        self.abs_min = reference;
        self.window.reset(self.active.lookback.samples);
        self.phase = PeakPhase::Unknown;
        self.peak_times = [now_ms; 2];
        self.peaks.clear();
        self.sample_count = 0;
        self.result = None;

        self.output
            .set_output(self.output_start + self.active.output_step);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "autotune: started at setpoint {} with output {} +/- {}",
            self.setpoint,
            self.output_start,
            self.active.output_step
        );
    }

    /// Two-sided hysteretic relay
    ///
    /// Inside `setpoint ± noise_band` (edges included) the output holds.
    fn run_relay(&mut self, reference: f32) {
        let band = self.active.noise_band;
        let step = self.active.output_step;

        if reference > self.setpoint + band {
            self.output.set_output(self.output_start - step);
        } else if reference < self.setpoint - band {
            self.output.set_output(self.output_start + step);
        }
    }

    /// Update peak phase and buffer. Returns true on a direction reversal.
    fn track_peaks(&mut self, extreme: LocalExtreme, reference: f32, now_ms: u64) -> bool {
        let mut reversed = false;

        match extreme {
            LocalExtreme::Max => {
                match self.phase {
                    PeakPhase::Unknown => self.phase = PeakPhase::Rising,
                    PeakPhase::Falling => {
                        self.phase = PeakPhase::Rising;
                        self.peak_times[1] = self.peak_times[0];
                        reversed = true;
                    }
                    PeakPhase::Rising => {}
                }
                self.peak_times[0] = now_ms;
                self.peaks.record(reference);
            }
            LocalExtreme::Min => {
                match self.phase {
                    PeakPhase::Unknown => self.phase = PeakPhase::Falling,
                    PeakPhase::Rising => {
                        self.phase = PeakPhase::Falling;
                        self.peaks.advance();
                        reversed = true;
                    }
                    PeakPhase::Falling => {}
                }
                self.peaks.record(reference);
            }
            LocalExtreme::None => {}
        }

        #[cfg(feature = "defmt")]
        if reversed {
            defmt::debug!(
                "autotune: reversal to {}, {} peaks",
                self.phase,
                self.peaks.count()
            );
        }

        reversed
    }

    /// Check if the last three peaks agree within the convergence ratio
    fn has_settled(&self) -> bool {
        match self.peaks.average_separation() {
            Some(separation) => separation < CONVERGENCE_RATIO * (self.abs_max - self.abs_min),
            None => false,
        }
    }

    /// Restore the output and compute the ultimate gain and period
    fn finish(&mut self, forced: bool) {
        self.output.set_output(self.output_start);

        let ultimate = UltimateParams::from_relay(
            self.active.output_step,
            self.abs_max,
            self.abs_min,
            self.peak_times[0],
            self.peak_times[1],
        );

        self.result = Some(TuneResult {
            ultimate,
            control_type: self.active.control_type,
            forced,
        });
        self.state = if forced {
            TuneState::ForceTerminated
        } else {
            TuneState::Converged
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "autotune: {} Ku={} Pu={}s",
            self.state,
            ultimate.ku,
            ultimate.pu
        );
    }
}
