//! System configuration parameters
//!
//! Compile-time constants fix the hardware shape (channel count, duty
//! resolution, valid setpoint range).  Everything tunable lives in
//! [`SystemConfig`], which is validated once at boot.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Fixed hardware shape
// ---------------------------------------------------------------------------

/// Number of heated zones on the board.
pub const NUM_CHANNELS: usize = 3;

/// Heater PWM resolution (8-bit LEDC).
pub const PWM_MAX_DUTY: u8 = 255;

pub const MIN_SETPOINT: f32 = 0.0;
pub const MAX_SETPOINT: f32 = 500.0;
pub const DEFAULT_SETPOINT: f32 = 100.0;

/// Calibration offsets are bounded to ±this many degrees.
pub const MAX_CALIBRATION_OFFSET: f32 = 50.0;

/// Plausible thermocouple range; anything outside faults the channel.
pub const SENSOR_MIN_C: f32 = -100.0;
pub const SENSOR_MAX_C: f32 = 1024.0;

/// Character LCD geometry: one row per channel plus the status row.
pub const DISPLAY_COLUMNS: usize = 20;
pub const DISPLAY_ROWS: usize = 4;

/// Status message capacity in characters.
pub const STATUS_CAPACITY: usize = 32;

/// Integral window length when the `pid-integral-window` policy is built in,
/// zero (unbounded summation) otherwise.
pub const PID_INTEGRAL_WINDOW: usize = if cfg!(feature = "pid-integral-window") {
    10
} else {
    0
};

/// Whether the optimized (anti-windup) integral policy is built in.
pub const PID_OPTIMIZED_INTEGRAL: bool = cfg!(feature = "pid-optimized-integral");

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- PID ---
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
    /// PID sample interval (milliseconds)
    pub pid_interval_ms: u32,

    // --- Task periods (milliseconds) ---
    pub control_period_ms: u32,
    pub input_period_ms: u32,
    pub display_period_ms: u32,
    pub autotune_period_ms: u32,

    // --- Lock budgets (milliseconds) ---
    pub control_lock_budget_ms: u32,
    pub input_lock_budget_ms: u32,
    pub display_lock_budget_ms: u32,
    pub autotune_lock_budget_ms: u32,
    pub emergency_lock_budget_ms: u32,
    /// Task watchdog timeout for the control task.
    pub watchdog_timeout_ms: u32,

    // --- User interface ---
    /// Idle time after which an open setpoint edit is committed.
    pub edit_timeout_ms: u32,
    /// Idle time after which Standby re-applies the setpoints.
    pub standby_refresh_ms: u32,
    /// Setpoint / calibration change per encoder detent (°C).
    pub setpoint_step_c: f32,
    /// |temperature - setpoint| below which the target counts as reached.
    pub reached_band_c: f32,
    /// Blink half-period for the channel under edit.
    pub blink_period_ms: u32,

    // --- Autotune ---
    pub autotune_channel: usize,
    pub autotune_window_ms: u32,
    pub autotune_sample_ms: u32,
    /// Relay test output as a percentage of full duty.
    pub autotune_output_percent: f32,
    pub autotune_peak_threshold_c: f32,
    /// Ultimate period assumed when no oscillation was observed (seconds).
    pub autotune_default_period_s: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pid_kp: 10.0,
            pid_ki: 0.1,
            pid_kd: 5.0,
            pid_interval_ms: 100,

            control_period_ms: 100,
            input_period_ms: 20,
            display_period_ms: 250,
            autotune_period_ms: 1000,

            control_lock_budget_ms: 50,
            input_lock_budget_ms: 30,
            display_lock_budget_ms: 50,
            autotune_lock_budget_ms: 50,
            emergency_lock_budget_ms: 1000,
            watchdog_timeout_ms: 5000,

            edit_timeout_ms: 5000,
            standby_refresh_ms: 2000,
            setpoint_step_c: 0.5,
            reached_band_c: 0.5,
            blink_period_ms: 500,

            autotune_channel: 0,
            autotune_window_ms: 30_000,
            autotune_sample_ms: 500,
            autotune_output_percent: 50.0,
            autotune_peak_threshold_c: 1.0,
            autotune_default_period_s: 5.0,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pid_kp >= 0.0 && self.pid_ki >= 0.0 && self.pid_kd >= 0.0) {
            return Err(ConfigError::ValidationFailed("PID gains must be >= 0"));
        }
        if self.pid_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("pid_interval_ms must be > 0"));
        }
        let periods = [
            self.control_period_ms,
            self.input_period_ms,
            self.display_period_ms,
            self.autotune_period_ms,
        ];
        if periods.contains(&0) {
            return Err(ConfigError::ValidationFailed("task periods must be > 0"));
        }
        if self.control_lock_budget_ms >= self.control_period_ms
            || self.input_lock_budget_ms >= self.input_period_ms
            || self.display_lock_budget_ms >= self.display_period_ms
        {
            return Err(ConfigError::ValidationFailed(
                "lock budgets must be shorter than their task period",
            ));
        }
        if self.watchdog_timeout_ms <= self.control_period_ms {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must exceed the control period",
            ));
        }
        if !(self.setpoint_step_c > 0.0 && self.setpoint_step_c <= 10.0) {
            return Err(ConfigError::ValidationFailed("setpoint_step_c must be 0–10"));
        }
        if self.autotune_channel >= NUM_CHANNELS {
            return Err(ConfigError::ValidationFailed(
                "autotune_channel must name an existing channel",
            ));
        }
        if !(self.autotune_output_percent > 0.0 && self.autotune_output_percent <= 100.0) {
            return Err(ConfigError::ValidationFailed(
                "autotune_output_percent must be 0–100",
            ));
        }
        if self.autotune_sample_ms == 0 || self.autotune_sample_ms > self.autotune_window_ms {
            return Err(ConfigError::ValidationFailed(
                "autotune_sample_ms must be within the observation window",
            ));
        }
        if self.autotune_default_period_s <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "autotune_default_period_s must be > 0",
            ));
        }
        Ok(())
    }

    /// Relay test duty derived from the configured percentage.
    pub fn autotune_duty(&self) -> u8 {
        (self.autotune_output_percent * f32::from(PWM_MAX_DUTY) / 100.0) as u8
    }
}

/// Clamp a requested setpoint into the valid range.  NaN maps to the default.
pub fn clamp_setpoint(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_SETPOINT;
    }
    value.clamp(MIN_SETPOINT, MAX_SETPOINT)
}

/// Clamp a calibration offset.  NaN maps to zero.
pub fn clamp_calibration(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-MAX_CALIBRATION_OFFSET, MAX_CALIBRATION_OFFSET)
}
