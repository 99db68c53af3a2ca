use log::{error, info, warn};

use super::{Channel, PidStep};
use crate::app::ports::{HeaterOutput, InputEvent, TemperatureSensor};
use crate::config::{
    clamp_calibration, clamp_setpoint, SystemConfig, DEFAULT_SETPOINT, PWM_MAX_DUTY,
    SENSOR_MAX_C, SENSOR_MIN_C,
};
use crate::control::pid::ChannelPid;
use crate::error::{SensorError, SensorFault};

/// Thermocouple-in, PWM-heater-out zone.
pub struct HeaterChannel<S, H> {
    index: usize,
    sensor: S,
    heater: H,
    pid: ChannelPid,
    setpoint: f32,
    /// Raw sensor value, before calibration.  Keeps the last good reading
    /// while faulted.
    raw_temperature: f32,
    calibration_offset: f32,
    duty: u8,
    reached_band_c: f32,
    reached: bool,
    faulted: bool,
    stopped: bool,
    stop_count: u32,
}

impl<S: TemperatureSensor, H: HeaterOutput> HeaterChannel<S, H> {
    pub fn new(index: usize, sensor: S, heater: H, config: &SystemConfig) -> Self {
        let mut pid = ChannelPid::new(config.pid_kp, config.pid_ki, config.pid_kd);
        pid.set_dt(config.pid_interval_ms);
        pid.set_limits(0.0, f32::from(PWM_MAX_DUTY));
        Self {
            index,
            sensor,
            heater,
            pid,
            setpoint: DEFAULT_SETPOINT,
            raw_temperature: 0.0,
            calibration_offset: 0.0,
            duty: 0,
            reached_band_c: config.reached_band_c,
            reached: false,
            faulted: false,
            stopped: false,
            stop_count: 0,
        }
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn heater(&self) -> &H {
        &self.heater
    }
}

impl<S: TemperatureSensor, H: HeaterOutput> Channel for HeaterChannel<S, H> {
    fn index(&self) -> usize {
        self.index
    }

    fn emergency_stop(&mut self) {
        self.heater.set_duty(0);
        self.duty = 0;
        self.pid.reset_integral();
        if !self.stopped {
            self.stopped = true;
            self.stop_count += 1;
            warn!("CH{} | fault-stop: heater forced off", self.index + 1);
        }
    }

    fn read_and_update_temperature(&mut self) -> Result<f32, SensorFault> {
        let reading = self.sensor.read_celsius();
        let kind = if reading.is_nan() {
            Some(SensorError::NotANumber)
        } else if !(SENSOR_MIN_C..=SENSOR_MAX_C).contains(&reading) {
            Some(SensorError::OutOfRange)
        } else {
            None
        };

        if let Some(kind) = kind {
            let fault = SensorFault {
                channel: self.index,
                kind,
            };
            if !self.faulted {
                self.faulted = true;
                error!("SENSOR FAULT SET: {fault}");
                self.emergency_stop();
            }
            return Err(fault);
        }

        if self.faulted {
            self.faulted = false;
            info!("SENSOR FAULT CLEARED: channel {}", self.index + 1);
        }
        self.raw_temperature = reading;
        Ok(self.temperature())
    }

    fn update_pid(&mut self) -> PidStep {
        let temperature = self.temperature();
        self.pid.setpoint = self.setpoint;
        self.pid.input = temperature;
        let out = self.pid.compute();

        let within_band = (temperature - self.setpoint).abs() < self.reached_band_c;
        let reached = within_band && !self.reached;
        self.reached = within_band;
        if reached {
            info!(
                "CH{} | setpoint {:.1}\u{00b0}C reached",
                self.index + 1,
                self.setpoint
            );
        }

        PidStep {
            duty: out as u8,
            reached,
        }
    }

    fn control_heater(&mut self, duty: i32) {
        let duty = duty.clamp(0, i32::from(PWM_MAX_DUTY)) as u8;
        self.heater.set_duty(duty);
        self.duty = duty;
    }

    fn process_input(&mut self, event: InputEvent, step_c: f32) -> bool {
        match event {
            InputEvent::Turn(rotation) => {
                let before = self.setpoint;
                self.set_setpoint(before + rotation.sign() * step_c);
                self.setpoint != before
            }
            InputEvent::Click | InputEvent::Hold => false,
        }
    }

    fn pid(&self) -> &ChannelPid {
        &self.pid
    }

    fn pid_mut(&mut self) -> &mut ChannelPid {
        &mut self.pid
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_setpoint(&mut self, value: f32) {
        self.setpoint = clamp_setpoint(value);
    }

    fn temperature(&self) -> f32 {
        self.raw_temperature + self.calibration_offset
    }

    fn output(&self) -> u8 {
        self.duty
    }

    fn calibration_offset(&self) -> f32 {
        self.calibration_offset
    }

    fn set_calibration_offset(&mut self, value: f32) {
        self.calibration_offset = clamp_calibration(value);
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn stop_count(&self) -> u32 {
        self.stop_count
    }

    fn rearm(&mut self) {
        self.stopped = false;
    }
}
