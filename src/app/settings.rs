//! Persisted setpoint / calibration table.
//!
//! The keeper remembers what was last written so a save only touches the
//! entries that actually moved.  Values are captured from the state under
//! the lock; every call here happens after the lock is released.

use log::{info, warn};

use super::ports::SettingsStore;
use crate::channel::Channel;
use crate::config::{DEFAULT_SETPOINT, MAX_CALIBRATION_OFFSET, MAX_SETPOINT, MIN_SETPOINT};

/// Smallest change worth a flash write.
const SAVE_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsTable<const N: usize> {
    pub setpoints: [f32; N],
    pub calibration: [f32; N],
}

impl<const N: usize> SettingsTable<N> {
    pub fn defaults() -> Self {
        Self {
            setpoints: [DEFAULT_SETPOINT; N],
            calibration: [0.0; N],
        }
    }

    /// Copy the live values out of the channels.
    pub fn capture<C: Channel>(channels: &[C; N]) -> Self {
        Self {
            setpoints: core::array::from_fn(|i| channels[i].setpoint()),
            calibration: core::array::from_fn(|i| channels[i].calibration_offset()),
        }
    }

    /// Push the table into the channels (clamped by the channel setters).
    pub fn apply<C: Channel>(&self, channels: &mut [C; N]) {
        for (i, ch) in channels.iter_mut().enumerate() {
            ch.set_setpoint(self.setpoints[i]);
            ch.set_calibration_offset(self.calibration[i]);
        }
    }
}

fn valid_setpoint(v: f32) -> bool {
    (MIN_SETPOINT..=MAX_SETPOINT).contains(&v)
}

fn valid_calibration(v: f32) -> bool {
    v.abs() <= MAX_CALIBRATION_OFFSET
}

fn changed(old: f32, new: f32) -> bool {
    (new - old).abs() > SAVE_EPSILON
}

pub struct SettingsKeeper<S, const N: usize> {
    store: S,
    saved: SettingsTable<N>,
}

impl<S: SettingsStore, const N: usize> SettingsKeeper<S, N> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            saved: SettingsTable::defaults(),
        }
    }

    /// Read and validate the table, repairing it in storage if needed.
    ///
    /// One bad setpoint invalidates the whole setpoint table.  Calibration
    /// offsets are repaired individually.
    pub fn load(&mut self) -> SettingsTable<N> {
        let mut table = SettingsTable::defaults();
        let mut setpoints_ok = true;
        for i in 0..N {
            match self.store.load_setpoint(i) {
                Ok(v) if valid_setpoint(v) => table.setpoints[i] = v,
                Ok(v) => {
                    warn!("SETTINGS | sp{i} = {v} out of range");
                    setpoints_ok = false;
                }
                Err(e) => {
                    warn!("SETTINGS | sp{i}: {e}");
                    setpoints_ok = false;
                }
            }
        }
        if !setpoints_ok {
            warn!("SETTINGS | setpoint table invalid, restoring defaults");
            table.setpoints = [DEFAULT_SETPOINT; N];
            for i in 0..N {
                self.write_setpoint(i, DEFAULT_SETPOINT);
            }
        }

        for i in 0..N {
            match self.store.load_calibration(i) {
                Ok(v) if valid_calibration(v) => table.calibration[i] = v,
                other => {
                    warn!("SETTINGS | cal{i} invalid ({other:?}), resetting to 0");
                    self.write_calibration(i, 0.0);
                }
            }
        }

        self.saved = table;
        info!(
            "SETTINGS | loaded setpoints {:?}, calibration {:?}",
            table.setpoints, table.calibration
        );
        table
    }

    /// Write setpoints that moved since the last save.  Returns how many
    /// were written.
    pub fn save_setpoints(&mut self, setpoints: &[f32; N]) -> usize {
        let mut written = 0;
        for (i, &v) in setpoints.iter().enumerate() {
            if changed(self.saved.setpoints[i], v) && self.write_setpoint(i, v) {
                written += 1;
            }
        }
        if written > 0 {
            info!("SETTINGS | saved {written} setpoint(s)");
        }
        written
    }

    /// Write calibration offsets that moved since the last save.
    pub fn save_calibration(&mut self, offsets: &[f32; N]) -> usize {
        let mut written = 0;
        for (i, &v) in offsets.iter().enumerate() {
            if changed(self.saved.calibration[i], v) && self.write_calibration(i, v) {
                written += 1;
            }
        }
        if written > 0 {
            info!("SETTINGS | saved {written} calibration offset(s)");
        }
        written
    }

    pub fn saved(&self) -> &SettingsTable<N> {
        &self.saved
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn write_setpoint(&mut self, i: usize, v: f32) -> bool {
        match self.store.save_setpoint(i, v) {
            Ok(()) => {
                self.saved.setpoints[i] = v;
                true
            }
            Err(e) => {
                warn!("SETTINGS | writing sp{i} failed: {e}");
                false
            }
        }
    }

    fn write_calibration(&mut self, i: usize, v: f32) -> bool {
        match self.store.save_calibration(i, v) {
            Ok(()) => {
                self.saved.calibration[i] = v;
                true
            }
            Err(e) => {
                warn!("SETTINGS | writing cal{i} failed: {e}");
                false
            }
        }
    }
}
