//! Control loop against recording heaters and scripted sensors.

use crate::mock_hw::Rig;

use thermozone::app::alerts::Alert;
use thermozone::channel::Channel;
use thermozone::fsm::SystemMode;

#[test]
fn heaters_stay_off_outside_working() {
    let mut rig = Rig::new([20.0, 20.0, 20.0]);
    for (i, mode) in [
        SystemMode::Standby,
        SystemMode::Setting,
        SystemMode::Calibration,
        SystemMode::Manual,
    ]
    .into_iter()
    .enumerate()
    {
        rig.state().mode = mode;
        assert!(rig.control.cycle(i as u32 * 100));
        assert_eq!(rig.last_duties(), [0, 0, 0], "mode {mode:?}");
    }
}

#[test]
fn first_working_cycle_matches_hand_computed_pid() {
    // Kp=10, Ki=0.1, Kd=5, dt=100 ms, setpoint 100, previous sample 100,
    // now 90: P = 100, D = 10*5/0.1 = 500, I = 0.1 -> clamped to 255.
    let mut rig = Rig::new([100.0, 20.0, 20.0]);
    rig.control.cycle(0);
    {
        let mut st = rig.state();
        st.mode = SystemMode::Working;
        st.channels[0].pid_mut().input = 100.0;
        st.channels[0].pid_mut().compute();
        st.channels[0].pid_mut().reset_integral();
    }
    rig.sensors[0].set(90.0);
    rig.control.cycle(100);

    let st = rig.state();
    let terms = st.channels[0].pid().terms();
    assert_eq!(terms.proportional, 100.0);
    if !thermozone::config::PID_OPTIMIZED_INTEGRAL {
        assert!((terms.integral - 0.1).abs() < 1e-4);
    }
    assert_eq!(st.channels[0].output(), 255);
    assert_eq!(rig.heaters[0].last(), 255);
}

#[test]
fn click_starts_regulation_on_every_channel() {
    let mut rig = Rig::new([20.0, 20.0, 300.0]);
    rig.click(0, 0);
    assert_eq!(rig.state().mode, SystemMode::Working);
    rig.step(100);
    // Zones below setpoint saturate; the hot one stays off.
    assert_eq!(rig.last_duties(), [255, 255, 0]);
}

#[test]
fn reached_setpoint_confirms_once_until_it_drifts_away() {
    let mut rig = Rig::new([50.0, 50.0, 50.0]);
    rig.click(0, 0);
    assert_eq!(rig.drain_alerts(), vec![Alert::Confirm]);

    rig.sensors[1].set(100.2);
    rig.step(100);
    rig.step(200);
    assert_eq!(rig.drain_alerts(), vec![Alert::Confirm]);

    rig.sensors[1].set(99.0);
    rig.step(300);
    rig.sensors[1].set(100.1);
    rig.step(400);
    assert_eq!(rig.drain_alerts(), vec![Alert::Confirm]);
}

#[test]
fn calibration_offset_shifts_measured_temperature() {
    let mut rig = Rig::new([20.0, 20.0, 20.0]);
    rig.state().channels[2].set_calibration_offset(-2.5);
    rig.control.cycle(0);
    assert_eq!(rig.state().channels[2].temperature(), 17.5);
}
