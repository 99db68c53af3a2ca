//! Input task: encoders to mode machine.
//!
//! Each window first drains the encoders into a local buffer without
//! touching the shared state, then takes the lock, dispatches the buffered
//! gestures to the [`ModeMachine`] and lets it check its timeouts.
//! Settings writes and tones requested by the handlers happen after the
//! lock is released.

use std::sync::Arc;

use heapless::Deque;
use log::{debug, warn};

use crate::app::alerts::AlertQueue;
use crate::app::ports::{InputDevice, InputEvent, SettingsStore};
use crate::app::settings::{SettingsKeeper, SettingsTable};
use crate::channel::Channel;
use crate::drivers::hw_timer::{now_ms, PeriodicTimer};
use crate::fsm::ModeMachine;
use crate::fsm::context::ModeOutcome;
use crate::fsm::states::CALIBRATION_CHANNEL;
use crate::state::{Shared, SystemState};

/// Gestures taken from one encoder per window.
const MAX_EVENTS_PER_POLL: usize = 4;
/// Gestures buffered across windows while the lock is busy.
const PENDING_CAPACITY: usize = 16;

/// A gesture read from an encoder, waiting for the lock.
#[derive(Debug, Clone, Copy)]
struct Pending {
    channel: usize,
    event: InputEvent,
    /// Partner hold state sampled when the gesture was read.
    combo_held: bool,
}

pub struct InputTask<C, E, S, const N: usize> {
    shared: Shared<SystemState<C, N>>,
    devices: [E; N],
    pending: Deque<Pending, PENDING_CAPACITY>,
    machine: ModeMachine<C, N>,
    keeper: SettingsKeeper<S, N>,
    alerts: Arc<AlertQueue>,
    budget_ms: u32,
    period_ms: u32,
}

impl<C, E, S, const N: usize> InputTask<C, E, S, N>
where
    C: Channel,
    E: InputDevice,
    S: SettingsStore,
{
    /// `keeper` should already have loaded the table applied to the
    /// channels, so later saves only write what the user changes.
    pub fn new(
        shared: Shared<SystemState<C, N>>,
        devices: [E; N],
        machine: ModeMachine<C, N>,
        keeper: SettingsKeeper<S, N>,
        alerts: Arc<AlertQueue>,
    ) -> Self {
        let config = machine.config();
        let (budget_ms, period_ms) = (config.input_lock_budget_ms, config.input_period_ms);
        Self {
            shared,
            devices,
            pending: Deque::new(),
            machine,
            keeper,
            alerts,
            budget_ms,
            period_ms,
        }
    }

    pub fn keeper(&self) -> &SettingsKeeper<S, N> {
        &self.keeper
    }

    pub fn devices_mut(&mut self) -> &mut [E; N] {
        &mut self.devices
    }

    /// Gestures read but not yet dispatched.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Read queued gestures from every encoder into the local buffer.
    /// Encoders keep what does not fit until the buffer drains.
    fn collect(&mut self, now_ms: u32) {
        let combo_held = self
            .devices
            .get(CALIBRATION_CHANNEL)
            .is_some_and(InputDevice::is_holding);
        for (channel, device) in self.devices.iter_mut().enumerate() {
            for _ in 0..MAX_EVENTS_PER_POLL {
                if self.pending.is_full() {
                    return;
                }
                let Some(event) = device.poll(now_ms) else {
                    break;
                };
                debug!("INPUT | ch{} {:?}", channel + 1, event);
                let read = Pending {
                    channel,
                    event,
                    combo_held,
                };
                if self.pending.push_back(read).is_err() {
                    warn!("INPUT | buffer full, ch{} {:?} dropped", channel + 1, event);
                    return;
                }
            }
        }
    }

    /// Run one input window.  Returns `false` if the lock was busy; the
    /// gestures read this window stay buffered for the next one.
    pub fn cycle(&mut self, now_ms: u32) -> bool {
        self.collect(now_ms);

        let mut outcome = ModeOutcome::default();
        let table = {
            let mut guard = match self.shared.lock_within(self.budget_ms) {
                Ok(guard) => guard,
                Err(timeout) => {
                    debug!(
                        "INPUT | {timeout}, {} gestures held over",
                        self.pending.len()
                    );
                    return false;
                }
            };
            let st = &mut *guard;

            while let Some(read) = self.pending.pop_front() {
                outcome.merge(self.machine.handle_input(
                    st,
                    read.channel,
                    read.event,
                    read.combo_held,
                    now_ms,
                ));
            }
            outcome.merge(self.machine.tick(st, now_ms));

            outcome
                .persist
                .any()
                .then(|| SettingsTable::capture(&st.channels))
        };

        if let Some(table) = table {
            if outcome.persist.setpoints {
                self.keeper.save_setpoints(&table.setpoints);
            }
            if outcome.persist.calibration {
                self.keeper.save_calibration(&table.calibration);
            }
        }
        for alert in outcome.alerts {
            self.alerts.post(alert);
        }
        true
    }

    pub fn run(mut self) {
        let mut timer = PeriodicTimer::new("input", self.period_ms);
        loop {
            self.cycle(now_ms());
            timer.wait_next();
        }
    }
}
