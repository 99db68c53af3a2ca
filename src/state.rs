//! Shared system state and its bounded-wait lock.
//!
//! All cross-task communication goes through two protected regions: the
//! [`SystemState`] (mode, channels, status text) and the display device.
//! Each sits behind a [`TimedMutex`]; a task that cannot take its lock
//! within its budget skips the cycle instead of blocking.
//!
//! ```text
//!   input ──┐                      ┌── display (snapshot)
//!           ├─▶ TimedMutex<SystemState> ◀─┤
//!  control ─┘                      └── autotune / emergency
//! ```

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use heapless::String;
use log::warn;

use crate::channel::{Channel, ChannelView};
use crate::config::STATUS_CAPACITY;
use crate::error::{LockTimeout, Region};
use crate::fsm::SystemMode;

/// Poll granularity while waiting for a contended lock.
const LOCK_POLL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Bounded-wait mutex
// ---------------------------------------------------------------------------

/// A mutex whose only acquisition path has a deadline.
pub struct TimedMutex<T> {
    region: Region,
    inner: Mutex<T>,
}

impl<T> TimedMutex<T> {
    pub fn new(region: Region, value: T) -> Self {
        Self {
            region,
            inner: Mutex::new(value),
        }
    }

    /// Take the lock, waiting at most `budget_ms`.
    ///
    /// A poisoned lock is recovered: the guarded data is plain state and a
    /// panicking holder cannot leave it half-written in a way the next
    /// control cycle would not overwrite.
    pub fn lock_within(&self, budget_ms: u32) -> Result<MutexGuard<'_, T>, LockTimeout> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(budget_ms));
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!("{} lock poisoned, recovering", self.region);
                    return Ok(poisoned.into_inner());
                }
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LockTimeout {
                            region: self.region,
                            waited_ms: budget_ms,
                        });
                    }
                    thread::sleep(LOCK_POLL.min(deadline - now));
                }
            }
        }
    }
}

/// Lock-guarded handle passed to every task.
pub type Shared<T> = Arc<TimedMutex<T>>;

// ---------------------------------------------------------------------------
// System state
// ---------------------------------------------------------------------------

/// Test output held on the designated channel while autotune observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutotuneHold {
    pub channel: usize,
    pub duty: u8,
}

pub struct SystemState<C, const N: usize> {
    pub mode: SystemMode,
    pub channels: [C; N],
    /// A per-channel setpoint edit is open.
    pub setting_active: bool,
    /// Channel whose setpoint is being edited.
    pub active_channel: Option<usize>,
    /// Liveness flag; cleared by an emergency, set again on entering Working.
    pub system_active: bool,
    pub autotune_hold: Option<AutotuneHold>,
    /// Set by the autotune task once gains are committed; the mode machine
    /// consumes it to leave Autotune.
    pub autotune_complete: bool,
    /// Time at which the alarm status gives way to the idle message.
    pub alarm_clear_at_ms: Option<u32>,
    /// Emergency shutdowns performed since boot.
    pub emergency_count: u32,
    status: String<STATUS_CAPACITY>,
    scroll_index: usize,
}

impl<C: Channel, const N: usize> SystemState<C, N> {
    /// Fresh state in Standby with the standby status message.
    pub fn new(channels: [C; N]) -> Self {
        let mut state = Self {
            mode: SystemMode::Standby,
            channels,
            setting_active: false,
            active_channel: None,
            system_active: true,
            autotune_hold: None,
            autotune_complete: false,
            alarm_clear_at_ms: None,
            emergency_count: 0,
            status: String::new(),
            scroll_index: 0,
        };
        state.set_status(SystemMode::Standby.status_message());
        state
    }

    /// Replace the status text (truncated on a character boundary) and
    /// rewind the scroll cursor.
    pub fn set_status(&mut self, text: &str) {
        self.status.clear();
        for ch in text.chars() {
            if self.status.push(ch).is_err() {
                break;
            }
        }
        self.scroll_index = 0;
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn scroll_index(&self) -> usize {
        self.scroll_index
    }

    /// Advance the scroll cursor by one when the status is wider than
    /// `width` characters, wrapping after the last character.
    pub fn advance_scroll(&mut self, width: usize) {
        let len = self.status.chars().count();
        if len <= width {
            self.scroll_index = 0;
            return;
        }
        self.scroll_index = (self.scroll_index + 1) % len;
    }

    /// Open a setpoint edit on `channel`.
    pub fn begin_edit(&mut self, channel: usize) {
        self.setting_active = true;
        self.active_channel = Some(channel);
    }

    /// Close any open edit.
    pub fn end_edit(&mut self) {
        self.setting_active = false;
        self.active_channel = None;
    }

    pub fn any_channel_faulted(&self) -> bool {
        self.channels.iter().any(Channel::is_faulted)
    }

    pub fn snapshot(&self) -> SystemSnapshot<N> {
        SystemSnapshot {
            mode: self.mode,
            channels: core::array::from_fn(|i| self.channels[i].view()),
            active_channel: self.active_channel,
            system_active: self.system_active,
            status: self.status.clone(),
            scroll_index: self.scroll_index,
        }
    }
}

/// Point-in-time copy taken inside a short lock window for rendering.
#[derive(Debug, Clone)]
pub struct SystemSnapshot<const N: usize> {
    pub mode: SystemMode,
    pub channels: [ChannelView; N],
    pub active_channel: Option<usize>,
    pub system_active: bool,
    pub status: String<STATUS_CAPACITY>,
    pub scroll_index: usize,
}
