//! Alert task: plays queued [`Alert`]s on the buzzer, one at a time.

use std::sync::Arc;

use log::debug;

use crate::app::alerts::{self, Alert, AlertQueue};
use crate::app::ports::Buzzer;

pub struct AlertTask<B> {
    queue: Arc<AlertQueue>,
    buzzer: B,
}

impl<B: Buzzer> AlertTask<B> {
    pub fn new(queue: Arc<AlertQueue>, buzzer: B) -> Self {
        Self { queue, buzzer }
    }

    /// Play everything already queued without waiting for more.  Returns
    /// how many alerts were played.
    pub fn drain(&mut self) -> usize {
        let mut played = 0;
        while let Some(alert) = self.queue.try_next() {
            self.sound(alert);
            played += 1;
        }
        played
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    pub fn run(mut self) {
        loop {
            let alert = self.queue.wait_next();
            self.sound(alert);
        }
    }

    fn sound(&mut self, alert: Alert) {
        debug!("ALERT | {:?} ({} ms)", alert, alert.duration_ms());
        alerts::play(&mut self.buzzer, alert);
    }
}
