//! Emergency shutdown.
//!
//! Two paths lead here: a channel whose sensor just went bad (detected by
//! the control task inside its own lock window) and an explicit request
//! from anywhere else.  Either way the response is the same, performed
//! under the system lock:
//!
//! 1. Every channel is fault-stopped (heater forced to zero).
//! 2. Mode goes to Standby, the liveness flag is cleared, any edit or
//!    autotune hold is dropped.
//! 3. The status shows the alarm text until the alarm pattern has had time
//!    to play, then [`EmergencyHandler::settle`] restores the idle message.
//!
//! A request that cannot get the lock within its budget stays pending and
//! the next control window services it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::app::alerts::{Alert, AlertQueue};
use crate::channel::Channel;
use crate::fsm::SystemMode;
use crate::state::{Shared, SystemState};

pub const ALARM_STATUS: &str = "!!! EMERGENCY STOP !!!";

pub struct EmergencyHandler {
    pending: AtomicBool,
    budget_ms: u32,
    alerts: Arc<AlertQueue>,
}

impl EmergencyHandler {
    pub fn new(budget_ms: u32, alerts: Arc<AlertQueue>) -> Self {
        Self {
            pending: AtomicBool::new(false),
            budget_ms,
            alerts,
        }
    }

    /// Flag an emergency for the next control window.  Never blocks.
    pub fn request(&self) {
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Request and try to perform the shutdown right away.  Returns `false`
    /// when the lock could not be taken; the request then stays pending.
    pub fn trigger<C: Channel, const N: usize>(
        &self,
        shared: &Shared<SystemState<C, N>>,
        now_ms: u32,
    ) -> bool {
        self.request();
        let alert = match shared.lock_within(self.budget_ms) {
            Ok(mut st) => self.service(&mut *st, now_ms),
            Err(timeout) => {
                warn!("EMERGENCY | {timeout}, retrying next control window");
                return false;
            }
        };
        if let Some(alert) = alert {
            self.alerts.post(alert);
        }
        true
    }

    /// Perform a pending shutdown.  Caller holds the system lock and posts
    /// the returned alert after releasing it.
    pub fn service<C: Channel, const N: usize>(
        &self,
        st: &mut SystemState<C, N>,
        now_ms: u32,
    ) -> Option<Alert> {
        self.pending
            .swap(false, Ordering::AcqRel)
            .then(|| self.shutdown_locked(st, now_ms))
    }

    /// Shut everything down.  Caller holds the system lock.
    pub fn shutdown_locked<C: Channel, const N: usize>(
        &self,
        st: &mut SystemState<C, N>,
        now_ms: u32,
    ) -> Alert {
        for ch in st.channels.iter_mut() {
            ch.emergency_stop();
        }
        st.mode = SystemMode::Standby;
        st.system_active = false;
        st.end_edit();
        st.autotune_hold = None;
        st.autotune_complete = false;
        st.set_status(ALARM_STATUS);
        st.alarm_clear_at_ms = Some(now_ms.wrapping_add(Alert::Alarm.duration_ms()));
        st.emergency_count += 1;
        error!(
            "EMERGENCY | shutdown #{}: all heaters off, mode -> Standby",
            st.emergency_count
        );
        Alert::Alarm
    }

    /// Replace the alarm text with the idle message once it has been shown
    /// long enough.
    pub fn settle<C: Channel, const N: usize>(&self, st: &mut SystemState<C, N>, now_ms: u32) {
        if let Some(at) = st.alarm_clear_at_ms {
            if now_ms.wrapping_sub(at) as i32 >= 0 {
                st.alarm_clear_at_ms = None;
                st.set_status(st.mode.status_message());
                info!("EMERGENCY | alarm cleared");
            }
        }
    }
}
