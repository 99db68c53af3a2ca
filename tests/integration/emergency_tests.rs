//! Sensor faults and explicit emergency requests end to end.

use std::sync::Arc;
use std::thread;

use crate::mock_hw::Rig;

use thermozone::app::alerts::Alert;
use thermozone::channel::Channel;
use thermozone::fsm::SystemMode;
use thermozone::safety::ALARM_STATUS;

fn working_rig() -> Rig {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(0, 0);
    rig.step(100);
    assert_eq!(rig.last_duties(), [255, 255, 255]);
    rig.drain_alerts();
    rig
}

#[test]
fn fault_on_any_channel_stops_everything_within_one_period() {
    for faulty in 0..3 {
        let mut rig = working_rig();
        rig.sensors[faulty].set(f32::NAN);
        rig.control.cycle(200);

        let st = rig.state();
        assert_eq!(st.mode, SystemMode::Standby, "channel {faulty}");
        assert!(!st.system_active);
        assert_eq!(st.status(), ALARM_STATUS);
        drop(st);
        assert_eq!(rig.last_duties(), [0, 0, 0], "channel {faulty}");
        assert_eq!(rig.drain_alerts(), vec![Alert::Alarm]);
    }
}

#[test]
fn three_nan_reads_on_channel_two_stop_once() {
    let mut rig = working_rig();
    rig.sensors[1].push(&[f32::NAN, f32::NAN, f32::NAN]);
    for t in [200, 300, 400] {
        rig.control.cycle(t);
    }
    let st = rig.state();
    assert_eq!(st.mode, SystemMode::Standby);
    assert_eq!(st.emergency_count, 1);
    assert_eq!(st.channels[1].stop_count(), 1);
    assert!(st.channels.iter().all(|ch| ch.stop_count() == 1));
    drop(st);
    assert_eq!(rig.drain_alerts(), vec![Alert::Alarm]);
}

#[test]
fn out_of_range_reading_is_a_fault() {
    let mut rig = working_rig();
    rig.sensors[2].set(1500.0);
    rig.control.cycle(200);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert!(rig.state().channels[2].is_faulted());
}

#[test]
fn alarm_status_reverts_after_pattern() {
    let mut rig = working_rig();
    rig.sensors[0].set(f32::NAN);
    rig.control.cycle(1000);
    rig.sensors[0].set(20.0);
    rig.control.cycle(2900);
    assert_eq!(rig.state().status(), ALARM_STATUS);
    rig.control.cycle(3000);
    assert_eq!(rig.state().status(), "***standby mode***");
}

#[test]
fn explicit_trigger_from_another_thread() {
    let mut rig = working_rig();
    let shared = Arc::clone(&rig.shared);
    let emergency = Arc::clone(&rig.emergency);
    let done = thread::spawn(move || emergency.trigger(&shared, 150))
        .join()
        .unwrap();
    assert!(done);
    rig.control.cycle(200);
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.last_duties(), [0, 0, 0]);
    assert_eq!(rig.drain_alerts(), vec![Alert::Alarm]);
}

#[test]
fn contended_trigger_is_serviced_by_next_control_window() {
    let mut rig = working_rig();
    let shared = Arc::clone(&rig.shared);
    let emergency = Arc::clone(&rig.emergency);

    // The lock stays held until the trigger has given up on it.
    let guard = rig.shared.lock_within(10).unwrap();
    let handle = thread::spawn(move || emergency.trigger(&shared, 150));
    assert!(!handle.join().unwrap());
    assert!(rig.emergency.is_pending());
    drop(guard);

    rig.control.cycle(200);
    assert!(!rig.emergency.is_pending());
    assert_eq!(rig.state().mode, SystemMode::Standby);
    assert_eq!(rig.last_duties(), [0, 0, 0]);
}
