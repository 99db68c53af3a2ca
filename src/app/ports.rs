//! Port traits — the boundary between the controller core and its collaborators.
//!
//! ```text
//!   Adapter / driver ──▶ Port trait ──▶ channels, tasks, mode machine
//! ```
//!
//! Sensors, heaters, encoders, the display, persistent storage and the
//! buzzer implement these traits.  The core consumes them via generics so
//! it never touches hardware directly, and host tests substitute
//! recording mocks.

use crate::error::StorageError;

// ───────────────────────────────────────────────────────────────
// Sensor port (hardware → core)
// ───────────────────────────────────────────────────────────────

/// One zone's temperature sensor.
pub trait TemperatureSensor {
    /// Current reading in °C, or NaN on a fault.  No unit conversion
    /// happens past this point.
    fn read_celsius(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (core → hardware)
// ───────────────────────────────────────────────────────────────

/// One zone's heater.  The caller clamps to `[0, PWM_MAX_DUTY]`.
pub trait HeaterOutput {
    fn set_duty(&mut self, duty: u8);
}

// ───────────────────────────────────────────────────────────────
// Input port (operator → core)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// +1 for clockwise, -1 for counter-clockwise.
    pub fn sign(self) -> f32 {
        match self {
            Self::Clockwise => 1.0,
            Self::CounterClockwise => -1.0,
        }
    }
}

/// Debounced gesture from one channel's encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Click,
    Hold,
    Turn(Rotation),
}

/// One channel's encoder with push button.
pub trait InputDevice {
    /// Next pending gesture, if any.  `now_ms` drives hold detection.
    fn poll(&mut self, now_ms: u32) -> Option<InputEvent>;

    /// True while the button is held past the hold threshold.
    fn is_holding(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Display port (core → operator)
// ───────────────────────────────────────────────────────────────

/// Pre-computed integers for one channel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLine {
    pub temperature: i32,
    pub setpoint: i32,
    /// Heater output as a percentage of full duty.
    pub percent: u8,
}

pub trait DisplayPort {
    fn render_channel_line(&mut self, index: usize, line: &ChannelLine);

    /// Blank row used to blink the channel under edit.
    fn render_channel_placeholder(&mut self, index: usize);

    /// Raw status text; `scroll` is the first character to show when the
    /// text is wider than the display.
    fn render_status_line(&mut self, status: &str, scroll: usize);
}

// ───────────────────────────────────────────────────────────────
// Storage port (core ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Per-channel persisted setpoints and calibration offsets.
///
/// Implementations only encode/decode.  Range validation and the
/// "fall back to defaults" policy live in [`crate::app::settings`].
pub trait SettingsStore {
    fn load_setpoint(&self, channel: usize) -> Result<f32, StorageError>;
    fn load_calibration(&self, channel: usize) -> Result<f32, StorageError>;
    fn save_setpoint(&mut self, channel: usize, value: f32) -> Result<(), StorageError>;
    fn save_calibration(&mut self, channel: usize, value: f32) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Audible feedback port
// ───────────────────────────────────────────────────────────────

pub trait Buzzer {
    /// Sound `freq_hz` for `duration_ms`, blocking until done.
    fn tone(&mut self, freq_hz: u32, duration_ms: u32);

    /// Stay silent for `duration_ms`, blocking.
    fn silence(&mut self, duration_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds plus a blocking sleep.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn sleep_ms(&self, ms: u32);
}
