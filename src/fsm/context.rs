//! Context threaded through every mode handler.
//!
//! `ModeContext` borrows the locked [`SystemState`] for the duration of one
//! dispatch and collects the side effects a handler wants performed once the
//! lock is released: tones and settings writes.

use heapless::Vec;
use log::warn;

use crate::app::alerts::Alert;
use crate::config::SystemConfig;
use crate::state::SystemState;

/// Alerts a single dispatch may request.
pub const MAX_ALERTS: usize = 4;

/// Which parts of the settings table should be written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Persist {
    pub setpoints: bool,
    pub calibration: bool,
}

impl Persist {
    pub fn any(&self) -> bool {
        self.setpoints || self.calibration
    }

    pub fn merge(&mut self, other: Persist) {
        self.setpoints |= other.setpoints;
        self.calibration |= other.calibration;
    }
}

/// Deferred work produced by one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ModeOutcome {
    pub alerts: Vec<Alert, MAX_ALERTS>,
    pub persist: Persist,
    /// Set by an input handler that acted on the gesture without changing
    /// mode.  Only handled gestures count as user activity.
    pub handled: bool,
}

impl ModeOutcome {
    /// Fold another outcome into this one.  Alerts beyond capacity are
    /// dropped.
    pub fn merge(&mut self, other: ModeOutcome) {
        for alert in other.alerts {
            if self.alerts.push(alert).is_err() {
                warn!("outcome alert list full, dropping {:?}", alert);
            }
        }
        self.persist.merge(other.persist);
    }
}

pub struct ModeContext<'a, C, const N: usize> {
    pub state: &'a mut SystemState<C, N>,
    pub config: &'a SystemConfig,
    /// Channel the current gesture came from.
    pub channel: usize,
    /// The combination partner (channel C) is currently held.
    pub combo_held: bool,
    pub now_ms: u32,
    pub last_input_ms: u32,
    pub last_refresh_ms: u32,
    pub alerts: Vec<Alert, MAX_ALERTS>,
    pub persist: Persist,
    pub handled: bool,
}

impl<'a, C, const N: usize> ModeContext<'a, C, N> {
    pub fn new(
        state: &'a mut SystemState<C, N>,
        config: &'a SystemConfig,
        channel: usize,
        combo_held: bool,
        now_ms: u32,
        last_input_ms: u32,
        last_refresh_ms: u32,
    ) -> Self {
        Self {
            state,
            config,
            channel,
            combo_held,
            now_ms,
            last_input_ms,
            last_refresh_ms,
            alerts: Vec::new(),
            persist: Persist::default(),
            handled: false,
        }
    }

    pub fn alert(&mut self, alert: Alert) {
        if self.alerts.push(alert).is_err() {
            warn!("mode alert list full, dropping {:?}", alert);
        }
    }

    /// Milliseconds since the last handled gesture on any channel.
    pub fn idle_ms(&self) -> u32 {
        self.now_ms.wrapping_sub(self.last_input_ms)
    }

    /// Split into the refresh timestamp the engine keeps and the deferred
    /// work for the caller.
    pub fn into_parts(self) -> (u32, ModeOutcome) {
        (
            self.last_refresh_ms,
            ModeOutcome {
                alerts: self.alerts,
                persist: self.persist,
                handled: self.handled,
            },
        )
    }
}
