//! Monotonic millisecond clock and drift-free task pacing.
//!
//! On ESP-IDF the clock is `esp_timer_get_time()` (microseconds since
//! boot).  On the host it is a process-wide `Instant` epoch.  Both wrap
//! after ~49 days; every consumer compares with `wrapping_sub`.
//!
//! [`PeriodicTimer`] schedules wake-ups at fixed multiples of the period
//! from its start, so a slow cycle shortens the next sleep instead of
//! pushing every later cycle back.

use std::thread;
use std::time::Duration;

use log::debug;

/// Milliseconds since boot, truncated to `u32`.
#[cfg(target_os = "espidf")]
pub fn now_ms() -> u32 {
    // SAFETY: esp_timer_get_time has no preconditions once the scheduler runs.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    (us / 1000) as u32
}

/// Milliseconds since the first call in this process, truncated to `u32`.
#[cfg(not(target_os = "espidf"))]
pub fn now_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u32
}

pub struct PeriodicTimer {
    name: &'static str,
    period_ms: u32,
    next_ms: u32,
}

impl PeriodicTimer {
    /// First deadline is one period from now.
    pub fn new(name: &'static str, period_ms: u32) -> Self {
        Self {
            name,
            period_ms,
            next_ms: now_ms().wrapping_add(period_ms),
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Sleep until the next deadline.  An overrun of a whole period or more
    /// re-anchors the schedule to now instead of bursting to catch up.
    pub fn wait_next(&mut self) {
        let now = now_ms();
        let remaining = self.next_ms.wrapping_sub(now) as i32;
        if remaining > 0 {
            thread::sleep(Duration::from_millis(remaining as u64));
            self.next_ms = self.next_ms.wrapping_add(self.period_ms);
        } else if remaining.unsigned_abs() >= self.period_ms {
            debug!(
                "{}: overran by {} ms, re-anchoring",
                self.name,
                remaining.unsigned_abs()
            );
            self.next_ms = now.wrapping_add(self.period_ms);
        } else {
            self.next_ms = self.next_ms.wrapping_add(self.period_ms);
        }
    }
}
