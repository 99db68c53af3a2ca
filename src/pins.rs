//! GPIO / peripheral pin assignments for the three-zone controller (ESP32-S3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

use crate::config::NUM_CHANNELS;

// ---------------------------------------------------------------------------
// Rotary encoders (one per zone): quadrature A/B + push switch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPins {
    pub clk: i32,
    pub dt: i32,
    /// Active-low push switch with internal pull-up.
    pub sw: i32,
}

pub const ENCODERS: [EncoderPins; NUM_CHANNELS] = [
    EncoderPins { clk: 3, dt: 2, sw: 4 },
    EncoderPins { clk: 6, dt: 5, sw: 7 },
    EncoderPins { clk: 9, dt: 8, sw: 10 },
];

// ---------------------------------------------------------------------------
// Heaters: LEDC PWM, 5 kHz, 8-bit
// ---------------------------------------------------------------------------

pub const HEATER_GPIOS: [i32; NUM_CHANNELS] = [11, 12, 13];
pub const HEATER_PWM_FREQ_HZ: u32 = 5_000;

// ---------------------------------------------------------------------------
// MAX6675 thermocouple amplifiers on one SPI bus, one chip-select each
// ---------------------------------------------------------------------------

pub const THERMO_SCK_GPIO: i32 = 18;
pub const THERMO_MISO_GPIO: i32 = 21;
pub const THERMO_CS_GPIOS: [i32; NUM_CHANNELS] = [15, 16, 17];
/// MAX6675 tolerates up to 4.3 MHz.
pub const THERMO_SPI_HZ: u32 = 4_000_000;

// ---------------------------------------------------------------------------
// 20x4 character LCD behind a PCF8574 I2C expander
// ---------------------------------------------------------------------------

pub const LCD_SDA_GPIO: i32 = 38;
pub const LCD_SCL_GPIO: i32 = 39;
pub const LCD_I2C_ADDR: u8 = 0x27;
pub const LCD_I2C_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Piezo buzzer
// ---------------------------------------------------------------------------

pub const BUZZER_GPIO: i32 = 14;
