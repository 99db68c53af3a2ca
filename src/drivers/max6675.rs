//! MAX6675 K-type thermocouple converter over SPI.
//!
//! The chip shifts out one 16-bit word per conversion:
//!
//! ```text
//!  15 | 14 ............ 3 |  2   | 1  | 0
//!  0  |  12-bit reading   | open | id | tri-state
//! ```
//!
//! Resolution is 0.25 °C.  Bit 2 set means the thermocouple is open; that
//! and any bus error read as NaN so the channel faults.

use embedded_hal::spi::SpiDevice;
use log::warn;

use crate::app::ports::TemperatureSensor;

const OPEN_INPUT_BIT: u16 = 0x0004;
const DEG_PER_LSB: f32 = 0.25;

pub struct Max6675<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max6675<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Raw conversion word.
    pub fn read_raw(&mut self) -> Result<u16, SPI::Error> {
        let mut buf = [0u8; 2];
        self.spi.read(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<SPI: SpiDevice> TemperatureSensor for Max6675<SPI> {
    fn read_celsius(&mut self) -> f32 {
        match self.read_raw() {
            Ok(raw) if raw & OPEN_INPUT_BIT != 0 => f32::NAN,
            Ok(raw) => f32::from(raw >> 3) * DEG_PER_LSB,
            Err(e) => {
                warn!("MAX6675 | bus error: {:?}", e);
                f32::NAN
            }
        }
    }
}
