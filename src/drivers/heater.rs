//! PWM heater output.
//!
//! Any `SetDutyCycle` implementor works (LEDC on the board).  The 0–255
//! heater duty is mapped onto the timer's full resolution.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::HeaterOutput;
use crate::config::PWM_MAX_DUTY;

pub struct PwmHeater<P> {
    pwm: P,
    zone: usize,
}

impl<P: SetDutyCycle> PwmHeater<P> {
    /// Wrap `pwm` and drive it to zero.
    pub fn new(zone: usize, pwm: P) -> Self {
        let mut heater = Self { pwm, zone };
        heater.set_duty(0);
        heater
    }
}

impl<P: SetDutyCycle> HeaterOutput for PwmHeater<P> {
    fn set_duty(&mut self, duty: u8) {
        let result = self
            .pwm
            .set_duty_cycle_fraction(u16::from(duty), u16::from(PWM_MAX_DUTY));
        if let Err(e) = result {
            warn!("HEATER{} | duty write failed: {:?}", self.zone + 1, e);
        }
    }
}
