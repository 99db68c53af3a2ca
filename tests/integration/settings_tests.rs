//! Persisted setpoints and calibration across simulated power cycles, on
//! both the NVS adapter (host backend) and the in-memory store.

use crate::mock_hw::{MemStore, Rig};

use thermozone::adapters::nvs::NvsSettingsStore;
use thermozone::app::ports::{InputEvent, Rotation, SettingsStore};
use thermozone::app::settings::SettingsKeeper;
use thermozone::channel::Channel;
use thermozone::config::{DEFAULT_SETPOINT, NUM_CHANNELS, SystemConfig};
use thermozone::error::{ConfigError, Error, StorageError};

/// Copy what a rig's keeper has written into a fresh store, as if the
/// flash survived a reboot.
fn reboot_store(rig: &Rig) -> MemStore {
    let store = rig.input.keeper().store();
    MemStore {
        setpoints: store.setpoints.clone(),
        calibration: store.calibration.clone(),
        ..Default::default()
    }
}

#[test]
fn first_boot_writes_defaults() {
    let mut keeper: SettingsKeeper<_, NUM_CHANNELS> =
        SettingsKeeper::new(NvsSettingsStore::new().unwrap());
    let table = keeper.load();
    assert_eq!(table.setpoints, [DEFAULT_SETPOINT; NUM_CHANNELS]);
    assert_eq!(table.calibration, [0.0; NUM_CHANNELS]);
    for i in 0..NUM_CHANNELS {
        assert_eq!(keeper.store().load_setpoint(i), Ok(DEFAULT_SETPOINT));
        assert_eq!(keeper.store().load_calibration(i), Ok(0.0));
    }
}

#[test]
fn stored_table_loads_unchanged() {
    let mut store = NvsSettingsStore::new().unwrap();
    for (i, sp) in [150.0, 245.5, 300.0].into_iter().enumerate() {
        store.save_setpoint(i, sp).unwrap();
        store.save_calibration(i, -(i as f32)).unwrap();
    }
    let mut keeper: SettingsKeeper<_, NUM_CHANNELS> = SettingsKeeper::new(store);
    let table = keeper.load();
    assert_eq!(table.setpoints, [150.0, 245.5, 300.0]);
    assert_eq!(table.calibration, [0.0, -1.0, -2.0]);
}

#[test]
fn out_of_range_setpoint_resets_the_whole_table() {
    let mut store = NvsSettingsStore::new().unwrap();
    store.save_setpoint(0, 180.0).unwrap();
    store.save_setpoint(1, 900.0).unwrap();
    store.save_setpoint(2, 220.0).unwrap();
    store.save_calibration(0, 2.0).unwrap();
    store.save_calibration(1, f32::NAN).unwrap();
    store.save_calibration(2, -75.0).unwrap();

    let mut keeper: SettingsKeeper<_, NUM_CHANNELS> = SettingsKeeper::new(store);
    let table = keeper.load();
    assert_eq!(table.setpoints, [DEFAULT_SETPOINT; NUM_CHANNELS]);
    assert_eq!(table.calibration, [2.0, 0.0, 0.0]);
    assert_eq!(keeper.store().load_setpoint(2), Ok(DEFAULT_SETPOINT));
    assert_eq!(keeper.store().load_calibration(1), Ok(0.0));
    assert_eq!(keeper.store().load_calibration(0), Ok(2.0));
}

#[test]
fn boot_applies_stored_values_to_channels() {
    let store = MemStore {
        setpoints: [(0, 150.0), (1, 200.0), (2, 250.0)].into(),
        calibration: [(0, 0.0), (1, -2.5), (2, 0.0)].into(),
        ..Default::default()
    };
    let rig = Rig::with_store([20.0; 3], store);
    let st = rig.state();
    assert_eq!(st.channels[0].setpoint(), 150.0);
    assert_eq!(st.channels[2].setpoint(), 250.0);
    assert_eq!(st.channels[1].calibration_offset(), -2.5);
    drop(st);
    assert_eq!(rig.input.keeper().store().writes, 0);
}

#[test]
fn edited_setpoint_survives_reboot() {
    let mut rig = Rig::new([20.0; 3]);
    rig.click(2, 0);
    rig.click(2, 20);
    for _ in 0..4 {
        rig.inputs[2].send(InputEvent::Turn(Rotation::Clockwise));
    }
    rig.step(40);
    rig.click(2, 60);
    assert_eq!(rig.state().channels[2].setpoint(), 102.0);

    let rebooted = Rig::with_store([20.0; 3], reboot_store(&rig));
    let st = rebooted.state();
    assert_eq!(st.channels[2].setpoint(), 102.0);
    assert_eq!(st.channels[0].setpoint(), DEFAULT_SETPOINT);
    drop(st);
    assert_eq!(rebooted.input.keeper().store().writes, 0);
}

#[test]
fn unwritable_flash_keeps_running_on_defaults() {
    let store = MemStore {
        fail_writes: true,
        ..Default::default()
    };
    let mut rig = Rig::with_store([20.0; 3], store);
    assert_eq!(rig.state().channels[1].setpoint(), DEFAULT_SETPOINT);
    assert_eq!(rig.input.keeper().store().writes, 0);

    rig.click(0, 0);
    assert!(rig.state().system_active);
}

#[test]
fn config_blob_is_validated_before_saving() {
    let mut store = NvsSettingsStore::new().unwrap();
    let tuned = SystemConfig {
        pid_kp: 12.5,
        autotune_window_ms: 60_000,
        ..Default::default()
    };
    store.save_config(&tuned).unwrap();
    assert_eq!(store.load_config(), tuned);

    let broken = SystemConfig {
        control_period_ms: 0,
        ..Default::default()
    };
    assert!(matches!(
        store.save_config(&broken),
        Err(Error::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(store.load_config(), tuned);
    assert_eq!(store.load_setpoint(0), Err(StorageError::NotFound));
}

#[test]
fn config_round_trips_through_json() {
    let cfg = SystemConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"edit_timeout_ms\":5000"));
    let back: SystemConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}
