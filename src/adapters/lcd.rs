//! 20x4 character display adapters.
//!
//! Rows 0–2 show one channel each, row 3 the status text:
//!
//! ```text
//!  T1:025C°SP:100C° 42%
//!  T2:___C SP:___C ___%     <- channel under edit, blink phase
//!  T3:180C°SP:180C°100%
//!  ***working mode***
//! ```
//!
//! [`Pcf8574Lcd`] drives an HD44780 in 4-bit mode through a PCF8574 I2C
//! expander.  [`LogDisplay`] writes the same rows to the log and is used
//! on the host.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::String;
use log::{info, warn};

use crate::app::ports::{ChannelLine, DisplayPort};
use crate::config::{DISPLAY_COLUMNS, DISPLAY_ROWS};

/// One display row.  Sized in bytes, so it leaves room for the two-byte
/// degree sign.
pub type Row = String<{ DISPLAY_COLUMNS * 2 }>;

/// HD44780 ROM code for the degree sign.
const DEGREE: u8 = 0xDF;

// ---------------------------------------------------------------------------
// Row formatting
// ---------------------------------------------------------------------------

/// `T<n>:<temp>C°SP:<sp>C°<pct>%`, three-digit zero-padded values.
pub fn channel_row(index: usize, line: &ChannelLine) -> Row {
    let mut row = Row::new();
    // Overflow keeps what fit; the LCD shows the first columns only.
    let _ = write!(
        row,
        "T{}:{:03}C\u{b0}SP:{:03}C\u{b0}{:3}%",
        index + 1,
        line.temperature,
        line.setpoint,
        line.percent
    );
    row
}

pub fn placeholder_row(index: usize) -> Row {
    let mut row = Row::new();
    let _ = write!(row, "T{}:___C SP:___C ___%", index + 1);
    row
}

/// Visible window of the status text starting at `scroll`, wrapping to the
/// start, padded with spaces when the text is narrower than the display.
pub fn status_row(status: &str, scroll: usize) -> Row {
    let mut row = Row::new();
    let len = status.chars().count();
    if len <= DISPLAY_COLUMNS {
        let _ = row.push_str(status);
    } else {
        for ch in status.chars().cycle().skip(scroll % len).take(DISPLAY_COLUMNS) {
            let _ = row.push(ch);
        }
    }
    for _ in len.min(DISPLAY_COLUMNS)..DISPLAY_COLUMNS {
        let _ = row.push(' ');
    }
    row
}

/// Map a row to display ROM bytes.  Characters outside ASCII become `?`.
fn rom_bytes(row: &str) -> impl Iterator<Item = u8> + '_ {
    row.chars().map(|ch| match ch {
        '\u{b0}' => DEGREE,
        c if c.is_ascii() => c as u8,
        _ => b'?',
    })
}

// ---------------------------------------------------------------------------
// HD44780 over PCF8574
// ---------------------------------------------------------------------------

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM start address of each row on a 20x4 module.
const ROW_OFFSETS: [u8; DISPLAY_ROWS] = [0x00, 0x40, 0x14, 0x54];

pub struct Pcf8574Lcd<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Pcf8574Lcd<I2C, D> {
    /// Run the 4-bit initialisation sequence and clear the screen.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, I2C::Error> {
        let mut lcd = Self {
            i2c,
            delay,
            address,
        };
        lcd.delay.delay_ms(50);
        // Three 8-bit function sets, then switch to 4-bit.
        for wait_us in [4500, 4500, 150] {
            lcd.write_nibble(0x30, 0)?;
            lcd.delay.delay_us(wait_us);
        }
        lcd.write_nibble(0x20, 0)?;
        lcd.command(CMD_FUNCTION_4BIT_2LINE)?;
        lcd.command(CMD_DISPLAY_ON)?;
        lcd.command(CMD_CLEAR)?;
        lcd.delay.delay_ms(2);
        lcd.command(CMD_ENTRY_INCREMENT)?;
        info!("LCD: HD44780 ready at 0x{:02X}", address);
        Ok(lcd)
    }

    fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<(), I2C::Error> {
        let data = (nibble & 0xF0) | mode | BACKLIGHT;
        self.i2c.write(self.address, &[data | EN])?;
        self.delay.delay_us(1);
        self.i2c.write(self.address, &[data])?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), I2C::Error> {
        self.write_nibble(byte & 0xF0, mode)?;
        self.write_nibble(byte << 4, mode)
    }

    fn command(&mut self, cmd: u8) -> Result<(), I2C::Error> {
        self.send(cmd, 0)
    }

    fn write_row(&mut self, row: usize, text: &str) -> Result<(), I2C::Error> {
        let Some(&offset) = ROW_OFFSETS.get(row) else {
            return Ok(());
        };
        self.command(CMD_SET_DDRAM | offset)?;
        for byte in rom_bytes(text).take(DISPLAY_COLUMNS) {
            self.send(byte, RS)?;
        }
        Ok(())
    }

    fn put_row(&mut self, row: usize, text: &str) {
        if let Err(e) = self.write_row(row, text) {
            warn!("LCD: row {row} write failed: {:?}", e);
        }
    }
}

impl<I2C: I2c, D: DelayNs> DisplayPort for Pcf8574Lcd<I2C, D> {
    fn render_channel_line(&mut self, index: usize, line: &ChannelLine) {
        self.put_row(index, &channel_row(index, line));
    }

    fn render_channel_placeholder(&mut self, index: usize) {
        self.put_row(index, &placeholder_row(index));
    }

    fn render_status_line(&mut self, status: &str, scroll: usize) {
        self.put_row(DISPLAY_ROWS - 1, &status_row(status, scroll));
    }
}

// ---------------------------------------------------------------------------
// Log-only display
// ---------------------------------------------------------------------------

/// Writes each row to the log when it changes.
#[derive(Default)]
pub struct LogDisplay {
    rows: [Row; DISPLAY_ROWS],
}

impl LogDisplay {
    pub fn row(&self, row: usize) -> &str {
        self.rows.get(row).map_or("", Row::as_str)
    }

    fn put_row(&mut self, row: usize, text: Row) {
        if let Some(slot) = self.rows.get_mut(row) {
            if *slot != text {
                info!("LCD[{row}] {}", text.as_str());
                *slot = text;
            }
        }
    }
}

impl DisplayPort for LogDisplay {
    fn render_channel_line(&mut self, index: usize, line: &ChannelLine) {
        self.put_row(index, channel_row(index, line));
    }

    fn render_channel_placeholder(&mut self, index: usize) {
        self.put_row(index, placeholder_row(index));
    }

    fn render_status_line(&mut self, status: &str, scroll: usize) {
        self.put_row(DISPLAY_ROWS - 1, status_row(status, scroll));
    }
}
