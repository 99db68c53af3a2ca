//! Control task: sensors in, heaters out.
//!
//! One cycle, all inside a single system-lock window:
//!
//! 1. Service a pending emergency request.
//! 2. Refresh every channel's temperature.  A channel that faults on this
//!    read escalates to a full emergency shutdown, once per fault.
//! 3. Drive every heater: PID output in Working, the relay test duty on
//!    the designated channel in Autotune, zero otherwise.  A faulted
//!    channel always gets zero.
//!
//! Tones are posted after the lock is released.

use std::sync::Arc;

use heapless::Vec;
use log::{debug, warn};

use crate::app::alerts::{Alert, AlertQueue};
use crate::channel::Channel;
use crate::config::SystemConfig;
use crate::drivers::hw_timer::{now_ms, PeriodicTimer};
use crate::drivers::watchdog::Watchdog;
use crate::fsm::SystemMode;
use crate::fsm::context::MAX_ALERTS;
use crate::safety::EmergencyHandler;
use crate::state::{Shared, SystemState};

pub struct ControlTask<C, const N: usize> {
    shared: Shared<SystemState<C, N>>,
    emergency: Arc<EmergencyHandler>,
    alerts: Arc<AlertQueue>,
    budget_ms: u32,
    period_ms: u32,
    watchdog_timeout_ms: u32,
    skipped: u32,
}

impl<C: Channel, const N: usize> ControlTask<C, N> {
    pub fn new(
        shared: Shared<SystemState<C, N>>,
        emergency: Arc<EmergencyHandler>,
        alerts: Arc<AlertQueue>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            shared,
            emergency,
            alerts,
            budget_ms: config.control_lock_budget_ms,
            period_ms: config.control_period_ms,
            watchdog_timeout_ms: config.watchdog_timeout_ms,
            skipped: 0,
        }
    }

    /// Cycles skipped because the lock was busy.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Run one control window.  Returns `false` if the cycle was skipped.
    pub fn cycle(&mut self, now_ms: u32) -> bool {
        let mut pending: Vec<Alert, MAX_ALERTS> = Vec::new();
        {
            let mut guard = match self.shared.lock_within(self.budget_ms) {
                Ok(guard) => guard,
                Err(timeout) => {
                    self.skipped += 1;
                    debug!("CONTROL | {timeout}, skipping cycle");
                    return false;
                }
            };
            let st = &mut *guard;

            if let Some(alert) = self.emergency.service(st, now_ms) {
                let _ = pending.push(alert);
            }

            let mut new_fault = false;
            for ch in st.channels.iter_mut() {
                let was_faulted = ch.is_faulted();
                if ch.read_and_update_temperature().is_err() && !was_faulted {
                    new_fault = true;
                }
            }
            if new_fault {
                let _ = pending.push(self.emergency.shutdown_locked(st, now_ms));
            }
            self.emergency.settle(st, now_ms);

            let mode = st.mode;
            let hold = st.autotune_hold;
            for ch in st.channels.iter_mut() {
                if ch.is_faulted() {
                    ch.control_heater(0);
                    continue;
                }
                match mode {
                    SystemMode::Working => {
                        let step = ch.update_pid();
                        ch.control_heater(i32::from(step.duty));
                        if step.reached && pending.push(Alert::Confirm).is_err() {
                            warn!("CONTROL | alert list full");
                        }
                    }
                    SystemMode::Autotune => {
                        let duty = hold
                            .filter(|h| h.channel == ch.index())
                            .map_or(0, |h| h.duty);
                        ch.control_heater(i32::from(duty));
                    }
                    _ => ch.control_heater(0),
                }
            }
        }

        for alert in pending {
            self.alerts.post(alert);
        }
        true
    }

    /// Task body.  Subscribes to the watchdog and feeds it every period.
    pub fn run(mut self) {
        let watchdog = Watchdog::subscribe("control", self.watchdog_timeout_ms);
        let mut timer = PeriodicTimer::new("control", self.period_ms);
        loop {
            self.cycle(now_ms());
            watchdog.feed();
            timer.wait_next();
        }
    }
}
