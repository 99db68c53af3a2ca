//! Wall-clock adapter for code that waits in real time.
//!
//! [`SystemClock`] implements [`Clock`] on top of the monotonic
//! millisecond counter in [`crate::drivers::hw_timer`] (`esp_timer` on the
//! board, `Instant` on the host).

use std::thread;
use std::time::Duration;

use crate::app::ports::Clock;
use crate::drivers::hw_timer;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        hw_timer::now_ms()
    }

    fn sleep_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
