//! Thermozone firmware entry point (ESP-IDF).
//!
//! Boot order:
//!
//! 1. Logger, configuration (NVS, validated, defaults on failure).
//! 2. Peripherals: MAX6675s on SPI2, LEDC heaters, encoders, LCD, buzzer.
//! 3. Persisted setpoints and calibration applied to the channels.
//! 4. Shared state, alert queue and emergency handler.
//! 5. Tasks spawned on their cores; main parks on the join handles.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::Delay;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution, config::TimerConfig};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::{Config as SpiConfig, DriverConfig};
use esp_idf_hal::spi::{SpiDeviceDriver, SpiDriver};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use thermozone::adapters::buzzer::LedcBuzzer;
use thermozone::adapters::lcd::Pcf8574Lcd;
use thermozone::adapters::nvs::NvsSettingsStore;
use thermozone::adapters::time::SystemClock;
use thermozone::app::alerts::AlertQueue;
use thermozone::app::settings::SettingsKeeper;
use thermozone::channel::HeaterChannel;
use thermozone::config::{NUM_CHANNELS, SystemConfig};
use thermozone::drivers::encoder::RotaryEncoder;
use thermozone::drivers::heater::PwmHeater;
use thermozone::drivers::max6675::Max6675;
use thermozone::error::{Error, Region};
use thermozone::fsm::ModeMachine;
use thermozone::pins;
use thermozone::safety::EmergencyHandler;
use thermozone::state::{SystemState, TimedMutex};
use thermozone::tasks::{self, alert::AlertTask, autotune::AutotuneTask, control::ControlTask};
use thermozone::tasks::{display::DisplayTask, input::InputTask};

type Thermocouple = Max6675<SpiDeviceDriver<'static, Arc<SpiDriver<'static>>>>;
type Heater = PwmHeater<LedcDriver<'static>>;
type Zone = HeaterChannel<Thermocouple, Heater>;
type Switch = PinDriver<'static, AnyInputPin, Input>;
type Encoder = RotaryEncoder<Switch, Switch, Switch>;

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Thermozone v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let nvs = NvsSettingsStore::new().map_err(Error::from)?;
    let mut config = nvs.load_config();
    if let Err(e) = config.validate() {
        warn!("Stored config rejected ({e}), using defaults");
        config = SystemConfig::default();
    }
    let json = serde_json::to_string(&config).map_err(|e| anyhow!("config encode: {e}"))?;
    info!("Config: {json}");

    let peripherals = Peripherals::take()?;

    // ── 2. Thermocouples: one SPI bus, one CS per zone ────────
    // SAFETY: pin numbers come from the board map and each is claimed once.
    let spi = Arc::new(SpiDriver::new_without_sdo(
        peripherals.spi2,
        unsafe { AnyOutputPin::new(pins::THERMO_SCK_GPIO) },
        unsafe { AnyIOPin::new(pins::THERMO_MISO_GPIO) },
        &DriverConfig::new(),
    )?);
    let spi_config = SpiConfig::new().baudrate(Hertz(pins::THERMO_SPI_HZ));

    // ── 3. Heaters: LEDC timer 0, channels 0-2 ────────────────
    let heater_timer = Arc::new(LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(Hertz(pins::HEATER_PWM_FREQ_HZ))
            .resolution(Resolution::Bits8),
    )?);
    // SAFETY: as above.
    let heater_pwms = [
        LedcDriver::new(peripherals.ledc.channel0, Arc::clone(&heater_timer), unsafe {
            AnyOutputPin::new(pins::HEATER_GPIOS[0])
        })?,
        LedcDriver::new(peripherals.ledc.channel1, Arc::clone(&heater_timer), unsafe {
            AnyOutputPin::new(pins::HEATER_GPIOS[1])
        })?,
        LedcDriver::new(peripherals.ledc.channel2, Arc::clone(&heater_timer), unsafe {
            AnyOutputPin::new(pins::HEATER_GPIOS[2])
        })?,
    ];

    let mut zones = Vec::with_capacity(NUM_CHANNELS);
    for (i, (cs, pwm)) in pins::THERMO_CS_GPIOS.into_iter().zip(heater_pwms).enumerate() {
        // SAFETY: as above.
        let device =
            SpiDeviceDriver::new(Arc::clone(&spi), Some(unsafe { AnyOutputPin::new(cs) }), &spi_config)?;
        zones.push(HeaterChannel::new(
            i,
            Max6675::new(device),
            PwmHeater::new(i, pwm),
            &config,
        ));
    }
    let mut zones: [Zone; NUM_CHANNELS] = zones
        .try_into()
        .map_err(|_| anyhow!("expected {NUM_CHANNELS} zones"))?;

    // ── 4. Persisted settings ─────────────────────────────────
    let mut keeper = SettingsKeeper::new(nvs);
    keeper.load().apply(&mut zones);

    // ── 5. Operator interface ─────────────────────────────────
    let mut encoders = Vec::with_capacity(NUM_CHANNELS);
    for enc in pins::ENCODERS {
        encoders.push(RotaryEncoder::new(
            input_pin(enc.clk)?,
            input_pin(enc.dt)?,
            input_pin(enc.sw)?,
        ));
    }
    let encoders: [Encoder; NUM_CHANNELS] = encoders
        .try_into()
        .map_err(|_| anyhow!("expected {NUM_CHANNELS} encoders"))?;

    // SAFETY: as above.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        unsafe { AnyIOPin::new(pins::LCD_SDA_GPIO) },
        unsafe { AnyIOPin::new(pins::LCD_SCL_GPIO) },
        &I2cConfig::new().baudrate(Hertz(pins::LCD_I2C_HZ)),
    )?;
    let lcd = Pcf8574Lcd::new(i2c, Delay::new_default(), pins::LCD_I2C_ADDR)
        .map_err(|e| anyhow!("LCD init failed: {e:?}"))?;
    let buzzer = LedcBuzzer::new(pins::BUZZER_GPIO)?;

    // ── 6. Shared state ───────────────────────────────────────
    let shared = Arc::new(TimedMutex::new(Region::System, SystemState::new(zones)));
    let display = Arc::new(TimedMutex::new(Region::Display, lcd));
    let alerts = Arc::new(AlertQueue::new());
    let emergency = Arc::new(EmergencyHandler::new(
        config.emergency_lock_budget_ms,
        Arc::clone(&alerts),
    ));

    // ── 7. Tasks ──────────────────────────────────────────────
    let control = ControlTask::new(
        Arc::clone(&shared),
        Arc::clone(&emergency),
        Arc::clone(&alerts),
        &config,
    );
    let input = InputTask::new(
        Arc::clone(&shared),
        encoders,
        ModeMachine::new(config.clone()),
        keeper,
        Arc::clone(&alerts),
    );
    let display = DisplayTask::new(Arc::clone(&shared), display, &config);
    let autotune = AutotuneTask::new(Arc::clone(&shared), SystemClock, &config);
    let annunciator = AlertTask::new(Arc::clone(&alerts), buzzer);

    let handles = [
        tasks::spawn(tasks::CONTROL_TASK, move || control.run())?,
        tasks::spawn(tasks::INPUT_TASK, move || input.run())?,
        tasks::spawn(tasks::AUTOTUNE_TASK, move || autotune.run())?,
        tasks::spawn(tasks::DISPLAY_TASK, move || display.run())?,
        tasks::spawn(tasks::ALERT_TASK, move || annunciator.run())?,
    ];
    info!("All tasks running");

    for handle in handles {
        if handle.join().is_err() {
            warn!("A task exited by panic");
        }
    }
    Ok(())
}

/// Input with the internal pull-up enabled.
fn input_pin(gpio: i32) -> Result<Switch> {
    // SAFETY: every encoder pin appears once in the board map.
    let mut pin = PinDriver::input(unsafe { AnyInputPin::new(gpio) })?;
    pin.set_pull(Pull::Up)?;
    Ok(pin)
}
