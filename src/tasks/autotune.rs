//! Autotune task.
//!
//! Idles until the mode machine enters Autotune, then runs one relay test
//! on the designated channel:
//!
//! 1. Under the lock: install the [`AutotuneHold`] so the control task
//!    drives the channel at the test duty, and read the start temperature.
//! 2. Outside the lock: sleep one sample interval, then take a short lock
//!    to copy the channel's latest temperature into the [`RelayTuner`].
//!    If the mode has left Autotune (hold or emergency) the test is
//!    abandoned without touching the gains.
//! 3. When the window closes, commit the derived gains to every channel,
//!    drop the hold and raise `autotune_complete`, which the mode machine
//!    turns into a return to Standby.

use log::{debug, info, warn};

use crate::app::ports::Clock;
use crate::channel::Channel;
use crate::config::SystemConfig;
use crate::control::autotune::{AutotuneSettings, RelayTuner, TunedGains};
use crate::fsm::SystemMode;
use crate::state::{AutotuneHold, Shared, SystemState};

/// How one test ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuneOutcome {
    Committed(TunedGains),
    /// The mode left Autotune before the window closed.
    Aborted,
    /// Autotune was not requested (or the lock was busy).
    Idle,
}

pub struct AutotuneTask<C, K, const N: usize> {
    shared: Shared<SystemState<C, N>>,
    clock: K,
    settings: AutotuneSettings,
    channel: usize,
    hold_duty: u8,
    budget_ms: u32,
    period_ms: u32,
}

impl<C: Channel, K: Clock, const N: usize> AutotuneTask<C, K, N> {
    pub fn new(shared: Shared<SystemState<C, N>>, clock: K, config: &SystemConfig) -> Self {
        Self {
            shared,
            clock,
            settings: AutotuneSettings::from(config),
            channel: config.autotune_channel,
            hold_duty: config.autotune_duty(),
            budget_ms: config.autotune_lock_budget_ms,
            period_ms: config.autotune_period_ms,
        }
    }

    /// Check for an autotune request and, if there is one, run the whole
    /// test.  Blocks for the observation window.
    pub fn cycle(&mut self) -> TuneOutcome {
        let Some(initial) = self.begin() else {
            return TuneOutcome::Idle;
        };
        let start_ms = self.clock.now_ms();
        let mut tuner = RelayTuner::new(self.settings, start_ms, initial);
        info!(
            "AUTOTUNE | CH{} held at duty {}, observing for {} ms",
            self.channel + 1,
            self.hold_duty,
            self.settings.window_ms
        );

        loop {
            self.clock.sleep_ms(self.settings.sample_ms);
            let now = self.clock.now_ms();
            match self.sample() {
                Sample::Left => {
                    info!("AUTOTUNE | aborted, mode left Autotune");
                    return TuneOutcome::Aborted;
                }
                Sample::Reading(temp) => {
                    if tuner.observe(temp, now) {
                        info!(
                            "AUTOTUNE | peak {:.2}\u{00b0}C (#{})",
                            tuner.peak(),
                            tuner.oscillations()
                        );
                    }
                }
                Sample::Skipped => {}
            }
            if tuner.is_complete(now) {
                break;
            }
        }

        let gains = tuner.finish();
        if self.commit(&gains) {
            info!(
                "AUTOTUNE | Ku={:.1} Tu={:.2}s -> Kp={:.3} Ki={:.3} Kd={:.3}",
                gains.ultimate_gain, gains.ultimate_period_s, gains.kp, gains.ki, gains.kd
            );
            TuneOutcome::Committed(gains)
        } else {
            TuneOutcome::Aborted
        }
    }

    pub fn run(mut self) {
        loop {
            self.cycle();
            self.clock.sleep_ms(self.period_ms);
        }
    }

    /// Install the hold if Autotune is active and no test is running yet.
    /// Returns the start temperature.
    fn begin(&self) -> Option<f32> {
        let mut st = match self.shared.lock_within(self.budget_ms) {
            Ok(st) => st,
            Err(timeout) => {
                debug!("AUTOTUNE | {timeout}, retrying next period");
                return None;
            }
        };
        if st.mode != SystemMode::Autotune || st.autotune_complete {
            return None;
        }
        st.autotune_hold = Some(AutotuneHold {
            channel: self.channel,
            duty: self.hold_duty,
        });
        let ch = st.channels.get(self.channel)?;
        Some(if ch.is_faulted() {
            f32::NAN
        } else {
            ch.temperature()
        })
    }

    fn sample(&self) -> Sample {
        let st = match self.shared.lock_within(self.budget_ms) {
            Ok(st) => st,
            Err(timeout) => {
                debug!("AUTOTUNE | {timeout}, sample skipped");
                return Sample::Skipped;
            }
        };
        if st.mode != SystemMode::Autotune || st.autotune_hold.is_none() {
            return Sample::Left;
        }
        match st.channels.get(self.channel) {
            Some(ch) if !ch.is_faulted() => Sample::Reading(ch.temperature()),
            _ => Sample::Skipped,
        }
    }

    /// Write the gains to every channel, drop the hold and flag completion.
    fn commit(&self, gains: &TunedGains) -> bool {
        let mut st = match self.shared.lock_within(self.budget_ms.saturating_mul(4)) {
            Ok(st) => st,
            Err(timeout) => {
                warn!("AUTOTUNE | {timeout}, result discarded");
                return false;
            }
        };
        if st.mode != SystemMode::Autotune {
            info!("AUTOTUNE | mode changed before commit, result discarded");
            return false;
        }
        for ch in st.channels.iter_mut() {
            ch.pid_mut().tune(gains.kp, gains.ki, gains.kd);
        }
        st.autotune_hold = None;
        st.autotune_complete = true;
        true
    }
}

enum Sample {
    Reading(f32),
    Skipped,
    Left,
}
