//! PID controller for heater zones.
//!
//! Derivative acts on the measurement, not on the error, so setpoint steps
//! do not kick the output.  The integral policy is fixed at build time
//! through the two const parameters:
//!
//! | `WINDOW` | `OPTIMIZED` | Integral behaviour                                  |
//! |----------|-------------|-----------------------------------------------------|
//! | 0        | false       | unbounded summation of `error * Ki * dt`            |
//! | N > 0    | false       | sum of the last N contributions (circular buffer)   |
//! | any      | true        | accumulator bounded so P + D + I stays in limits    |
//!
//! [`ChannelPid`] is the alias the firmware uses; it picks the policy from
//! the `pid-integral-window` / `pid-optimized-integral` cargo features.

use crate::config::{PID_INTEGRAL_WINDOW, PID_OPTIMIZED_INTEGRAL, PWM_MAX_DUTY};

/// The PID flavour compiled into this firmware build.
pub type ChannelPid = PidController<PID_INTEGRAL_WINDOW, PID_OPTIMIZED_INTEGRAL>;

/// Default sample interval before [`PidController::set_dt`] is called.
pub const DEFAULT_DT_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Output rises when the input is below the setpoint (heating).
    Normal,
    /// Error and input delta are negated (cooling).
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidMode {
    /// Classic proportional-on-error.
    OnError,
    /// Proportional gain moved into the integrating path
    /// (for integrating-type processes).
    OnRate,
}

/// Contribution of each term to the most recent output, before the final clamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub proportional: f32,
    pub integral: f32,
    pub derivative: f32,
}

/// Saturating clamp that never panics on inverted or NaN bounds.
fn constrain(value: f32, lo: f32, hi: f32) -> f32 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController<const WINDOW: usize = 0, const OPTIMIZED: bool = false> {
    kp: f32,
    ki: f32,
    kd: f32,
    /// Target value, written by the owner before each compute.
    pub setpoint: f32,
    /// Latest measurement, written by the owner before each compute.
    pub input: f32,
    output: f32,
    integral: f32,
    prev_input: f32,
    direction: Direction,
    mode: PidMode,
    output_min: f32,
    output_max: f32,
    dt_ms: u32,
    dt_s: f32,
    window: [f32; WINDOW],
    window_pos: usize,
    timer_ms: u32,
    terms: PidTerms,
}

impl<const WINDOW: usize, const OPTIMIZED: bool> PidController<WINDOW, OPTIMIZED> {
    /// New controller with limits `[0, PWM_MAX_DUTY]` and a 100 ms interval.
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint: 0.0,
            input: 0.0,
            output: 0.0,
            integral: 0.0,
            prev_input: 0.0,
            direction: Direction::Normal,
            mode: PidMode::OnError,
            output_min: 0.0,
            output_max: f32::from(PWM_MAX_DUTY),
            dt_ms: DEFAULT_DT_MS,
            dt_s: DEFAULT_DT_MS as f32 / 1000.0,
            window: [0.0; WINDOW],
            window_pos: 0,
            timer_ms: 0,
            terms: PidTerms::default(),
        }
    }

    /// Set output limits.  Inverted bounds are swapped.
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min.min(max);
        self.output_max = max.max(min);
    }

    /// Set the sample interval.  A zero interval is ignored.
    pub fn set_dt(&mut self, dt_ms: u32) {
        if dt_ms == 0 {
            return;
        }
        self.dt_ms = dt_ms;
        self.dt_s = dt_ms as f32 / 1000.0;
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn set_mode(&mut self, mode: PidMode) {
        self.mode = mode;
    }

    /// Replace all three gains.
    pub fn tune(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn gains(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.output_min, self.output_max)
    }

    pub fn dt_ms(&self) -> u32 {
        self.dt_ms
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn mode(&self) -> PidMode {
        self.mode
    }

    /// Term breakdown of the last computation.
    pub fn terms(&self) -> PidTerms {
        self.terms
    }

    /// Compute one step with the configured interval.
    pub fn compute(&mut self) -> f32 {
        let mut error = self.setpoint - self.input;
        let mut delta_input = self.prev_input - self.input;
        self.prev_input = self.input;
        if self.direction == Direction::Reverse {
            error = -error;
            delta_input = -delta_input;
        }

        let proportional = match self.mode {
            PidMode::OnError => error * self.kp,
            PidMode::OnRate => 0.0,
        };
        let derivative = delta_input * self.kd / self.dt_s;
        let mut output = proportional + derivative;

        let contribution = error * self.ki * self.dt_s;
        if WINDOW > 0 {
            self.window_pos += 1;
            if self.window_pos >= WINDOW {
                self.window_pos = 0;
            }
            self.integral -= self.window[self.window_pos];
            self.window[self.window_pos] = contribution;
            self.integral += contribution;
        } else {
            self.integral += contribution;
        }

        if OPTIMIZED {
            output = constrain(output, self.output_min, self.output_max);
            let k = self.ki * self.dt_s;
            if k != 0.0 {
                let a = (self.output_min - output) / k;
                let b = (self.output_max - output) / k;
                self.integral = constrain(self.integral, a.min(b), a.max(b));
            }
        }

        if self.mode == PidMode::OnRate {
            self.integral += delta_input * self.kp;
        }

        self.integral = constrain(self.integral, self.output_min, self.output_max);
        output += self.integral;
        self.output = constrain(output, self.output_min, self.output_max);
        self.terms = PidTerms {
            proportional,
            integral: self.integral,
            derivative,
        };
        self.output
    }

    /// Self-timed compute: recomputes only once a full interval has elapsed
    /// since the last recompute, otherwise returns the previous output.
    pub fn compute_timed(&mut self, now_ms: u32) -> f32 {
        if now_ms.wrapping_sub(self.timer_ms) >= self.dt_ms {
            self.timer_ms = now_ms;
            self.compute();
        }
        self.output
    }

    /// Compute with the interval set to the time elapsed since the previous
    /// call.  A zero elapsed time returns the previous output.
    pub fn compute_elapsed(&mut self, now_ms: u32) -> f32 {
        let elapsed = now_ms.wrapping_sub(self.timer_ms);
        self.timer_ms = now_ms;
        if elapsed == 0 {
            return self.output;
        }
        self.set_dt(elapsed);
        self.compute()
    }

    /// Clear the integral, previous input and window history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_input = 0.0;
        self.window = [0.0; WINDOW];
        self.window_pos = 0;
        self.terms = PidTerms::default();
    }

    /// Clear only the integral path (keeps derivative history).
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
        self.window = [0.0; WINDOW];
        self.window_pos = 0;
    }
}
