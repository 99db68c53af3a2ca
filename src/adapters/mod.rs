//! Adapters: concrete implementations of the port traits in
//! [`crate::app::ports`].
//!
//! | Adapter  | Implements      | Connects to                         |
//! |----------|-----------------|-------------------------------------|
//! | `buzzer` | Buzzer          | LEDC piezo / log                    |
//! | `lcd`    | DisplayPort     | HD44780 via PCF8574 over I2C / log  |
//! | `nvs`    | SettingsStore   | NVS / in-memory store               |
//! | `time`   | Clock           | ESP32 system timer                  |
//!
//! Sensor, heater and encoder ports are implemented directly by the
//! drivers in [`crate::drivers`].

pub mod buzzer;
pub mod lcd;
pub mod nvs;
pub mod time;
