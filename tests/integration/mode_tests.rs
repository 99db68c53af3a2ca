//! Encoder gestures through the input task into the mode machine, with
//! the control task observing the result.

use std::sync::Arc;

use crate::mock_hw::{MemStore, Rig};

use thermozone::adapters::lcd::LogDisplay;
use thermozone::app::alerts::Alert;
use thermozone::app::ports::{InputEvent, Rotation};
use thermozone::channel::Channel;
use thermozone::error::Region;
use thermozone::fsm::SystemMode;
use thermozone::state::TimedMutex;
use thermozone::tasks::display::DisplayTask;

#[test]
fn one_click_enters_working_exactly_once() {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(2, 0);
    assert_eq!(rig.state().mode, SystemMode::Working);
    assert!(rig.state().system_active);
    assert_eq!(rig.drain_alerts(), vec![Alert::Confirm]);

    for t in 1..10 {
        rig.step(t * 20);
    }
    assert_eq!(rig.state().mode, SystemMode::Working);
    assert!(rig.drain_alerts().is_empty());
}

#[test]
fn edit_commits_on_click_and_persists() {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(0, 0);
    rig.click(0, 20);
    {
        let st = rig.state();
        assert_eq!(st.mode, SystemMode::Setting);
        assert_eq!(st.active_channel, Some(0));
        assert_eq!(st.status(), "***SET TEMP SP1***");
    }
    for _ in 0..3 {
        rig.inputs[0].send(InputEvent::Turn(Rotation::CounterClockwise));
    }
    // Rotation on a channel that is not under edit is ignored.
    rig.inputs[1].send(InputEvent::Turn(Rotation::Clockwise));
    rig.step(40);
    rig.click(0, 60);

    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Working);
    assert!(!st.setting_active);
    assert_eq!(st.channels[0].setpoint(), 98.5);
    assert_eq!(st.channels[1].setpoint(), 100.0);
    drop(st);
    assert_eq!(rig.input.keeper().store().setpoints.get(&0), Some(&98.5));
}

#[test]
fn idle_edit_times_out_to_working_with_error_tone() {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(1, 0);
    rig.click(1, 20);
    rig.inputs[1].send(InputEvent::Turn(Rotation::Clockwise));
    rig.step(40);
    rig.drain_alerts();

    rig.step(5000);
    assert_eq!(rig.state().mode, SystemMode::Setting);
    rig.step(5041);
    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Working);
    assert_eq!(st.status(), "***working mode***");
    drop(st);
    assert_eq!(rig.drain_alerts(), vec![Alert::Error]);
    assert_eq!(rig.input.keeper().store().setpoints.get(&1), Some(&100.5));
}

#[test]
fn hold_in_working_returns_to_standby_and_cuts_heaters() {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(0, 0);
    rig.step(100);
    assert_eq!(rig.last_duties(), [255, 255, 255]);

    rig.inputs[1].send(InputEvent::Hold);
    rig.step(200);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.last_duties(), [0, 0, 0]);
}

#[test]
fn calibration_mode_adjusts_offsets_and_persists_on_exit() {
    let mut rig = Rig::new([20.0; 3]);
    rig.inputs[2].send(InputEvent::Hold);
    rig.step(0);
    assert_eq!(rig.state().mode, SystemMode::Calibration);
    assert_eq!(rig.state().status(), "***CALIBRATION MODE***");

    rig.inputs[0].send(InputEvent::Turn(Rotation::Clockwise));
    rig.inputs[0].send(InputEvent::Turn(Rotation::Clockwise));
    rig.step(20);
    rig.click(0, 40);

    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.state().channels[0].calibration_offset(), 1.0);
    assert_eq!(rig.input.keeper().store().calibration.get(&0), Some(&1.0));
}

#[test]
fn standby_hold_on_second_channel_opens_setting() {
    let mut rig = Rig::new([20.0; 3]);
    rig.inputs[1].send(InputEvent::Hold);
    rig.step(0);
    {
        let st = rig.state();
        assert_eq!(st.mode, SystemMode::Setting);
        assert_eq!(st.active_channel, None);
        assert_eq!(st.status(), "***SETTING MODE***");
    }
    rig.click(2, 20);
    assert_eq!(rig.state().active_channel, Some(2));
    rig.inputs[2].send(InputEvent::Hold);
    rig.step(40);
    assert_eq!(rig.state().mode, SystemMode::Standby);
}

#[test]
fn faulted_channel_blocks_working() {
    let mut rig = Rig::new([20.0; 3]);
    rig.sensors[1].set(f32::NAN);
    rig.step(0);
    assert_eq!(rig.drain_alerts(), vec![Alert::Alarm]);

    rig.click(0, 20);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.drain_alerts(), vec![Alert::Error]);

    rig.sensors[1].set(25.0);
    rig.step(40);
    rig.click(0, 60);
    assert_eq!(rig.state().mode, SystemMode::Working);
}

#[test]
fn standby_refresh_writes_only_changed_setpoints() {
    let mut rig = Rig::with_store([20.0; 3], MemStore::default());
    let writes_after_load = rig.input.keeper().store().writes;
    rig.inputs[0].send(InputEvent::Turn(Rotation::Clockwise));
    rig.step(0);
    rig.step(1000);
    assert_eq!(rig.input.keeper().store().writes, writes_after_load);
    rig.step(2100);
    assert_eq!(rig.input.keeper().store().writes, writes_after_load + 1);
    assert_eq!(rig.input.keeper().store().setpoints.get(&0), Some(&100.5));
}

#[test]
fn display_follows_mode_changes() {
    let mut rig = Rig::new([42.0; 3]);
    let display = Arc::new(TimedMutex::new(Region::Display, LogDisplay::default()));
    let mut task = DisplayTask::new(Arc::clone(&rig.shared), Arc::clone(&display), &rig.config);

    rig.step(0);
    assert!(task.cycle(0));
    assert_eq!(display.lock_within(10).unwrap().row(3).trim_end(), "***standby mode***");

    rig.click(0, 20);
    rig.step(120);
    assert!(task.cycle(250));
    let d = display.lock_within(10).unwrap();
    assert_eq!(d.row(3).trim_end(), "***working mode***");
    assert_eq!(d.row(0), "T1:042C\u{b0}SP:100C\u{b0}100%");
}

#[test]
fn edit_commit_with_faulted_sensor_stays_in_standby() {
    let mut rig = Rig::new([20.0; 3]);
    rig.sensors[1].set(f32::NAN);
    rig.step(0);
    rig.inputs[1].send(InputEvent::Hold);
    rig.step(40);
    assert_eq!(rig.state().mode, SystemMode::Setting);
    rig.drain_alerts();

    rig.click(0, 60);
    rig.click(0, 80);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.drain_alerts(), vec![Alert::Error]);

    rig.step(200);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.last_duties(), [0, 0, 0]);
}
