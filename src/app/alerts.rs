//! Audible feedback patterns and the queue that feeds the annunciator.
//!
//! Tasks never play tones themselves: they post an [`Alert`] after leaving
//! their lock window and the alert task sequences it on the buzzer.
//!
//! | Alert     | Pattern                                   | Length  |
//! |-----------|-------------------------------------------|---------|
//! | `Confirm` | 1 × 1000 Hz / 100 ms                      | 100 ms  |
//! | `Error`   | 3 × 2000 Hz / 100 ms, 100 ms gaps         | 600 ms  |
//! | `Alarm`   | 10 × 2000 Hz / 100 ms, 100 ms gaps        | 2000 ms |

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::ports::Buzzer;

const ALERT_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Confirm,
    Error,
    Alarm,
}

/// One beep followed by a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub freq_hz: u32,
    pub on_ms: u32,
    pub off_ms: u32,
}

const CONFIRM: [Tone; 1] = [Tone {
    freq_hz: 1000,
    on_ms: 100,
    off_ms: 0,
}];

const FAULT_BEEP: Tone = Tone {
    freq_hz: 2000,
    on_ms: 100,
    off_ms: 100,
};

const ERROR: [Tone; 3] = [FAULT_BEEP; 3];
const ALARM: [Tone; 10] = [FAULT_BEEP; 10];

impl Alert {
    pub fn pattern(self) -> &'static [Tone] {
        match self {
            Self::Confirm => &CONFIRM,
            Self::Error => &ERROR,
            Self::Alarm => &ALARM,
        }
    }

    /// Total playing time including gaps.
    pub fn duration_ms(self) -> u32 {
        self.pattern().iter().map(|t| t.on_ms + t.off_ms).sum()
    }
}

/// Sequence one alert on the buzzer.  Blocks for [`Alert::duration_ms`].
pub fn play(buzzer: &mut impl Buzzer, alert: Alert) {
    for tone in alert.pattern() {
        buzzer.tone(tone.freq_hz, tone.on_ms);
        if tone.off_ms > 0 {
            buzzer.silence(tone.off_ms);
        }
    }
}

/// Bounded queue between the tasks and the annunciator.
pub struct AlertQueue {
    channel: Channel<CriticalSectionRawMutex, Alert, ALERT_DEPTH>,
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue an alert without blocking.  A full queue drops it.
    pub fn post(&self, alert: Alert) -> bool {
        if self.channel.try_send(alert).is_err() {
            warn!("alert queue full, dropping {:?}", alert);
            return false;
        }
        true
    }

    pub fn try_next(&self) -> Option<Alert> {
        self.channel.try_receive().ok()
    }

    /// Block the calling thread until an alert arrives.
    pub fn wait_next(&self) -> Alert {
        futures_lite::future::block_on(self.channel.receive())
    }
}
