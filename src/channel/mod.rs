//! Per-zone control capability.
//!
//! The tasks and the mode machine only ever see `C: Channel`, so every zone
//! kind is driven identically.  [`HeaterChannel`] is the one kind on this
//! board (thermocouple in, PWM heater out).

mod heater;

pub use heater::HeaterChannel;

use crate::app::ports::InputEvent;
use crate::config::PWM_MAX_DUTY;
use crate::control::pid::ChannelPid;
use crate::error::SensorFault;

/// Result of one PID update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidStep {
    /// Heater duty the PID asks for, already inside `[0, PWM_MAX_DUTY]`.
    pub duty: u8,
    /// The zone just came within the reached band of its setpoint.
    pub reached: bool,
}

/// Plain copy of a channel for display and logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelView {
    pub temperature: f32,
    pub setpoint: f32,
    pub output: u8,
    pub faulted: bool,
}

impl ChannelView {
    /// Output as a percentage of full duty.
    pub fn percent(&self) -> u8 {
        (u16::from(self.output) * 100 / u16::from(PWM_MAX_DUTY)) as u8
    }
}

pub trait Channel {
    /// Position of this channel on the board (0-based).
    fn index(&self) -> usize;

    /// Force the heater to zero and latch the fault-stop.  Repeated calls
    /// while latched only re-assert zero output.
    fn emergency_stop(&mut self);

    /// Pull a reading from the sensor.  A NaN or implausible reading marks
    /// the channel faulted and, on the first such reading, triggers
    /// [`Channel::emergency_stop`].
    fn read_and_update_temperature(&mut self) -> Result<f32, SensorFault>;

    /// Run one PID step against the current setpoint and temperature.
    fn update_pid(&mut self) -> PidStep;

    /// Drive the heater.  Values outside `[0, PWM_MAX_DUTY]` saturate.
    fn control_heater(&mut self, duty: i32);

    /// Apply one encoder event to the setpoint.  Returns `true` if the
    /// setpoint changed.
    fn process_input(&mut self, event: InputEvent, step_c: f32) -> bool;

    fn pid(&self) -> &ChannelPid;
    fn pid_mut(&mut self) -> &mut ChannelPid;

    fn setpoint(&self) -> f32;
    /// Store a setpoint, clamped to the valid range.
    fn set_setpoint(&mut self, value: f32);

    /// Measured temperature with calibration applied.
    fn temperature(&self) -> f32;

    /// Last duty actually commanded to the heater.
    fn output(&self) -> u8;

    fn calibration_offset(&self) -> f32;
    /// Store a calibration offset, clamped to ±`MAX_CALIBRATION_OFFSET`.
    fn set_calibration_offset(&mut self, value: f32);

    /// The most recent sensor reading was unusable.
    fn is_faulted(&self) -> bool;

    /// The fault-stop latch is set.
    fn is_stopped(&self) -> bool;

    /// How many times the fault-stop latch has been set.
    fn stop_count(&self) -> u32;

    /// Clear the fault-stop latch (entering Working).
    fn rearm(&mut self);

    fn view(&self) -> ChannelView {
        ChannelView {
            temperature: self.temperature(),
            setpoint: self.setpoint(),
            output: self.output(),
            faulted: self.is_faulted(),
        }
    }
}
