//! Mock hardware for integration tests.
//!
//! Every mock hands out a cloneable handle so a test can script readings or
//! inspect the command history while the mock itself is owned by the
//! shared system state.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thermozone::app::alerts::AlertQueue;
use thermozone::app::ports::{
    Buzzer, HeaterOutput, InputDevice, InputEvent, SettingsStore, TemperatureSensor,
};
use thermozone::app::settings::SettingsKeeper;
use thermozone::channel::HeaterChannel;
use thermozone::config::{NUM_CHANNELS, SystemConfig};
use thermozone::error::{Region, StorageError};
use thermozone::fsm::ModeMachine;
use thermozone::safety::EmergencyHandler;
use thermozone::state::{Shared, SystemState, TimedMutex};
use thermozone::tasks::control::ControlTask;
use thermozone::tasks::input::InputTask;

// ── Sensor ────────────────────────────────────────────────────

#[derive(Default)]
struct SensorScript {
    queue: VecDeque<f32>,
    last: f32,
}

/// Plays back queued readings, then repeats the last one.
#[derive(Clone, Default)]
pub struct ScriptedSensor(Arc<Mutex<SensorScript>>);

impl ScriptedSensor {
    pub fn new(value: f32) -> Self {
        let sensor = Self::default();
        sensor.set(value);
        sensor
    }

    /// Replace the steady reading.
    pub fn set(&self, value: f32) {
        let mut s = self.0.lock().unwrap();
        s.queue.clear();
        s.last = value;
    }

    pub fn push(&self, readings: &[f32]) {
        self.0.lock().unwrap().queue.extend(readings.iter().copied());
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read_celsius(&mut self) -> f32 {
        let mut s = self.0.lock().unwrap();
        if let Some(v) = s.queue.pop_front() {
            s.last = v;
        }
        s.last
    }
}

// ── Heater ────────────────────────────────────────────────────

/// Records every duty written.
#[derive(Clone, Default)]
pub struct RecordingHeater(Arc<Mutex<Vec<u8>>>);

impl RecordingHeater {
    pub fn history(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> u8 {
        self.0.lock().unwrap().last().copied().unwrap_or(0)
    }
}

impl HeaterOutput for RecordingHeater {
    fn set_duty(&mut self, duty: u8) {
        self.0.lock().unwrap().push(duty);
    }
}

// ── Input device ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ScriptedInput {
    events: Arc<Mutex<VecDeque<InputEvent>>>,
    holding: Arc<AtomicBool>,
}

impl ScriptedInput {
    pub fn send(&self, event: InputEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn set_holding(&self, holding: bool) {
        self.holding.store(holding, Ordering::SeqCst);
    }
}

impl InputDevice for ScriptedInput {
    fn poll(&mut self, _now_ms: u32) -> Option<InputEvent> {
        self.events.lock().unwrap().pop_front()
    }

    fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }
}

// ── Buzzer ────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingBuzzer(pub Arc<Mutex<Vec<(u32, u32)>>>);

impl Buzzer for RecordingBuzzer {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        self.0.lock().unwrap().push((freq_hz, duration_ms));
    }

    fn silence(&mut self, _duration_ms: u32) {}
}

// ── Settings store ────────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub setpoints: HashMap<usize, f32>,
    pub calibration: HashMap<usize, f32>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl SettingsStore for MemStore {
    fn load_setpoint(&self, channel: usize) -> Result<f32, StorageError> {
        self.setpoints.get(&channel).copied().ok_or(StorageError::NotFound)
    }

    fn load_calibration(&self, channel: usize) -> Result<f32, StorageError> {
        self.calibration.get(&channel).copied().ok_or(StorageError::NotFound)
    }

    fn save_setpoint(&mut self, channel: usize, value: f32) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io);
        }
        self.writes += 1;
        self.setpoints.insert(channel, value);
        Ok(())
    }

    fn save_calibration(&mut self, channel: usize, value: f32) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io);
        }
        self.writes += 1;
        self.calibration.insert(channel, value);
        Ok(())
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type Zone = HeaterChannel<ScriptedSensor, RecordingHeater>;
pub type State = SystemState<Zone, NUM_CHANNELS>;

/// Three scripted zones, plus the control and input tasks around one
/// shared state.
pub struct Rig {
    pub config: SystemConfig,
    pub shared: Shared<State>,
    pub alerts: Arc<AlertQueue>,
    pub emergency: Arc<EmergencyHandler>,
    pub sensors: [ScriptedSensor; NUM_CHANNELS],
    pub heaters: [RecordingHeater; NUM_CHANNELS],
    pub inputs: [ScriptedInput; NUM_CHANNELS],
    pub control: ControlTask<Zone, NUM_CHANNELS>,
    pub input: InputTask<Zone, ScriptedInput, MemStore, NUM_CHANNELS>,
}

impl Rig {
    pub fn new(temps: [f32; NUM_CHANNELS]) -> Self {
        Self::with_store(temps, MemStore::default())
    }

    pub fn with_store(temps: [f32; NUM_CHANNELS], store: MemStore) -> Self {
        let config = SystemConfig::default();
        let sensors = temps.map(ScriptedSensor::new);
        let heaters: [RecordingHeater; NUM_CHANNELS] = Default::default();
        let inputs: [ScriptedInput; NUM_CHANNELS] = Default::default();

        let mut channels: [Zone; NUM_CHANNELS] = core::array::from_fn(|i| {
            HeaterChannel::new(i, sensors[i].clone(), heaters[i].clone(), &config)
        });
        let mut keeper = SettingsKeeper::new(store);
        keeper.load().apply(&mut channels);

        let shared = Arc::new(TimedMutex::new(Region::System, SystemState::new(channels)));
        let alerts = Arc::new(AlertQueue::new());
        let emergency = Arc::new(EmergencyHandler::new(
            config.emergency_lock_budget_ms,
            Arc::clone(&alerts),
        ));
        let control = ControlTask::new(
            Arc::clone(&shared),
            Arc::clone(&emergency),
            Arc::clone(&alerts),
            &config,
        );
        let input = InputTask::new(
            Arc::clone(&shared),
            inputs.clone(),
            ModeMachine::new(config.clone()),
            keeper,
            Arc::clone(&alerts),
        );
        Self {
            config,
            shared,
            alerts,
            emergency,
            sensors,
            heaters,
            inputs,
            control,
            input,
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.shared.lock_within(100).unwrap()
    }

    /// One input window followed by one control window at `now_ms`.
    pub fn step(&mut self, now_ms: u32) {
        assert!(self.input.cycle(now_ms));
        assert!(self.control.cycle(now_ms));
    }

    pub fn click(&mut self, channel: usize, now_ms: u32) {
        self.inputs[channel].send(InputEvent::Click);
        self.step(now_ms);
    }

    pub fn drain_alerts(&self) -> Vec<thermozone::app::alerts::Alert> {
        std::iter::from_fn(|| self.alerts.try_next()).collect()
    }

    pub fn last_duties(&self) -> [u8; NUM_CHANNELS] {
        core::array::from_fn(|i| self.heaters[i].last())
    }
}
