//! Autotune from the combination gesture to committed gains, on virtual
//! time.  Each virtual sleep runs one control window and advances a
//! crude thermal model: the zone warms only while its heater is driven.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::mock_hw::{RecordingHeater, Rig, ScriptedSensor, Zone};

use thermozone::app::ports::{Clock, InputEvent};
use thermozone::channel::Channel;
use thermozone::config::NUM_CHANNELS;
use thermozone::fsm::SystemMode;
use thermozone::tasks::autotune::{AutotuneTask, TuneOutcome};
use thermozone::tasks::control::ControlTask;

struct VirtualClock<F> {
    now: Cell<u32>,
    on_sleep: F,
}

impl<F: Fn(u32)> Clock for VirtualClock<F> {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn sleep_ms(&self, ms: u32) {
        self.now.set(self.now.get() + ms);
        (self.on_sleep)(self.now.get());
    }
}

/// Rig in Autotune mode via the combination gesture.
fn autotune_rig() -> Rig {
    let mut rig = Rig::new([20.0; 3]);
    rig.inputs[2].set_holding(true);
    rig.inputs[0].send(InputEvent::Hold);
    rig.step(0);
    rig.inputs[2].set_holding(false);
    assert_eq!(rig.state().mode, SystemMode::Autotune);
    assert_eq!(rig.state().status(), "***AUTOTUNE MODE***");
    rig
}

fn control_for(rig: &Rig) -> RefCell<ControlTask<Zone, NUM_CHANNELS>> {
    RefCell::new(ControlTask::new(
        Arc::clone(&rig.shared),
        Arc::clone(&rig.emergency),
        Arc::clone(&rig.alerts),
        &rig.config,
    ))
}

/// +0.4 °C per sample while the heater is driven.
fn warm(sensor: &ScriptedSensor, heater: &RecordingHeater, temp: &Cell<f32>) {
    if heater.last() > 0 {
        temp.set(temp.get() + 0.4);
        sensor.set(temp.get());
    }
}

#[test]
fn relay_test_commits_gains_and_returns_to_standby() {
    let mut rig = autotune_rig();
    let control = control_for(&rig);
    let (sensor, heater) = (rig.sensors[0].clone(), rig.heaters[0].clone());
    let other_heater = rig.heaters[1].clone();
    let temp = Cell::new(20.0);

    let clock = VirtualClock {
        now: Cell::new(0),
        on_sleep: |now| {
            control.borrow_mut().cycle(now);
            assert_eq!(other_heater.last(), 0);
            warm(&sensor, &heater, &temp);
        },
    };
    let mut task = AutotuneTask::new(Arc::clone(&rig.shared), clock, &rig.config);

    let TuneOutcome::Committed(gains) = task.cycle() else {
        panic!("autotune did not commit");
    };
    assert!(heater.history().contains(&127));
    // The control window reads the zone before it warms, so sample k sees
    // 20 + 0.4 (k - 1): peaks at samples 4, 7, .. 58, the last at 29 s.
    let tu = 29.0 / 19.0;
    assert_eq!(gains.oscillations, 19);
    assert!((gains.ultimate_period_s - tu).abs() < 1e-3);
    assert!((gains.kp - 30.0).abs() < 1e-3);
    assert!((gains.ki - 2.0 * 50.0 / tu).abs() < 1e-2);
    assert!((gains.kd - 50.0 * tu / 8.0).abs() < 1e-3);

    {
        let st = rig.state();
        assert!(st.autotune_complete);
        assert!(st.autotune_hold.is_none());
        for ch in &st.channels {
            assert_eq!(ch.pid().gains(), (gains.kp, gains.ki, gains.kd));
        }
    }

    rig.step(31_000);
    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Standby);
    assert_eq!(st.status(), "***standby mode***");
    assert!(!st.autotune_complete);
    drop(st);
    assert_eq!(rig.last_duties(), [0, 0, 0]);
}

#[test]
fn flat_response_uses_default_period() {
    let rig = autotune_rig();
    let control = control_for(&rig);
    let clock = VirtualClock {
        now: Cell::new(0),
        on_sleep: |now| {
            control.borrow_mut().cycle(now);
        },
    };
    let mut task = AutotuneTask::new(Arc::clone(&rig.shared), clock, &rig.config);
    let TuneOutcome::Committed(gains) = task.cycle() else {
        panic!("autotune did not commit");
    };
    assert_eq!(gains.oscillations, 0);
    assert_eq!(gains.ultimate_period_s, rig.config.autotune_default_period_s);
    assert!(gains.ki.is_finite());
}

#[test]
fn emergency_during_observation_aborts_without_commit() {
    let rig = autotune_rig();
    let control = control_for(&rig);
    let sensor = rig.sensors[0].clone();
    let clock = VirtualClock {
        now: Cell::new(0),
        on_sleep: |now| {
            if now >= 3000 {
                sensor.set(f32::NAN);
            }
            control.borrow_mut().cycle(now);
        },
    };
    let mut task = AutotuneTask::new(Arc::clone(&rig.shared), clock, &rig.config);
    assert_eq!(task.cycle(), TuneOutcome::Aborted);

    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Standby);
    assert!(!st.autotune_complete);
    let cfg = &rig.config;
    assert_eq!(st.channels[1].pid().gains(), (cfg.pid_kp, cfg.pid_ki, cfg.pid_kd));
}

#[test]
fn hold_gesture_aborts_autotune() {
    let mut rig = autotune_rig();
    rig.inputs[0].send(InputEvent::Hold);
    rig.step(100);
    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Standby);
    assert!(st.autotune_hold.is_none());
}
