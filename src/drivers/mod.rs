//! Peripheral drivers, task pacing and platform helpers.

pub mod encoder;
pub mod heater;
pub mod hw_timer;
pub mod max6675;
pub mod task_pin;
pub mod watchdog;
