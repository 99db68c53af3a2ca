//! Display task.
//!
//! Takes a snapshot under the system lock (advancing the status scroll
//! cursor while there), releases it, then renders under the display lock.
//! The two locks are never held together.

use log::debug;

use crate::app::ports::{ChannelLine, DisplayPort};
use crate::channel::Channel;
use crate::config::{SystemConfig, DISPLAY_COLUMNS};
use crate::drivers::hw_timer::{now_ms, PeriodicTimer};
use crate::state::{Shared, SystemSnapshot, SystemState};

pub struct DisplayTask<C, D, const N: usize> {
    shared: Shared<SystemState<C, N>>,
    display: Shared<D>,
    budget_ms: u32,
    period_ms: u32,
    blink_period_ms: u32,
}

impl<C: Channel, D: DisplayPort, const N: usize> DisplayTask<C, D, N> {
    pub fn new(shared: Shared<SystemState<C, N>>, display: Shared<D>, config: &SystemConfig) -> Self {
        Self {
            shared,
            display,
            budget_ms: config.display_lock_budget_ms,
            period_ms: config.display_period_ms,
            blink_period_ms: config.blink_period_ms,
        }
    }

    /// Render one frame.  Returns `false` if either lock was busy.
    pub fn cycle(&mut self, now_ms: u32) -> bool {
        let snapshot = match self.shared.lock_within(self.budget_ms) {
            Ok(mut st) => {
                let snapshot = st.snapshot();
                st.advance_scroll(DISPLAY_COLUMNS);
                snapshot
            }
            Err(timeout) => {
                debug!("DISPLAY | {timeout}, skipping frame");
                return false;
            }
        };

        match self.display.lock_within(self.budget_ms) {
            Ok(mut display) => {
                render(&mut *display, &snapshot, now_ms, self.blink_period_ms);
                true
            }
            Err(timeout) => {
                debug!("DISPLAY | {timeout}, skipping frame");
                false
            }
        }
    }

    pub fn run(mut self) {
        let mut timer = PeriodicTimer::new("display", self.period_ms);
        loop {
            self.cycle(now_ms());
            timer.wait_next();
        }
    }
}

/// Draw a snapshot.  The channel under edit alternates with its
/// placeholder every `blink_period_ms`.
pub fn render<D: DisplayPort + ?Sized, const N: usize>(
    display: &mut D,
    snapshot: &SystemSnapshot<N>,
    now_ms: u32,
    blink_period_ms: u32,
) {
    let blank_phase = blink_period_ms > 0 && (now_ms / blink_period_ms) % 2 == 1;
    for (index, view) in snapshot.channels.iter().enumerate() {
        if blank_phase && snapshot.active_channel == Some(index) {
            display.render_channel_placeholder(index);
            continue;
        }
        let line = ChannelLine {
            temperature: view.temperature as i32,
            setpoint: view.setpoint as i32,
            percent: view.percent(),
        };
        display.render_channel_line(index, &line);
    }
    display.render_status_line(&snapshot.status, snapshot.scroll_index);
}
