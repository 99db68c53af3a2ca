//! Piezo buzzer adapters.
//!
//! [`LedcBuzzer`] drives the piezo from a dedicated LEDC timer: the tone
//! frequency is retuned per note and the channel runs at 50 % duty while
//! sounding.  [`LogBuzzer`] logs the notes and waits out their duration.

use std::thread;
use std::time::Duration;

use log::debug;

use crate::app::ports::Buzzer;

fn pause(ms: u32) {
    thread::sleep(Duration::from_millis(u64::from(ms)));
}

// ---------------------------------------------------------------------------
// LEDC piezo (ESP-IDF only)
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
pub use ledc::LedcBuzzer;

#[cfg(target_os = "espidf")]
mod ledc {
    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use super::pause;
    use crate::app::ports::Buzzer;

    /// Heaters take LEDC timer 0 and channels 0-2.
    const TIMER: ledc_timer_t = ledc_timer_t_LEDC_TIMER_1;
    const CHANNEL: ledc_channel_t = ledc_channel_t_LEDC_CHANNEL_3;
    const MODE: ledc_mode_t = ledc_mode_t_LEDC_LOW_SPEED_MODE;
    /// Half of the 8-bit range.
    const TONE_DUTY: u32 = 128;
    const INITIAL_FREQ_HZ: u32 = 1_000;

    pub struct LedcBuzzer {
        _private: (),
    }

    impl LedcBuzzer {
        /// Configure the buzzer timer and channel on `gpio`, silent.
        pub fn new(gpio: i32) -> Result<Self, EspError> {
            let timer = ledc_timer_config_t {
                speed_mode: MODE,
                timer_num: TIMER,
                duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
                freq_hz: INITIAL_FREQ_HZ,
                clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
                ..Default::default()
            };
            // SAFETY: called once from the boot path before the alert task
            // exists; the timer and channel are not shared with any driver.
            esp!(unsafe { ledc_timer_config(&timer) })?;
            esp!(unsafe {
                ledc_channel_config(&ledc_channel_config_t {
                    speed_mode: MODE,
                    channel: CHANNEL,
                    timer_sel: TIMER,
                    gpio_num: gpio,
                    duty: 0,
                    hpoint: 0,
                    ..Default::default()
                })
            })?;
            info!("BUZZER | LEDC ready on GPIO{gpio}");
            Ok(Self { _private: () })
        }

        fn set_duty(&mut self, duty: u32) {
            // SAFETY: channel configured in new(); only the alert task
            // owns this value.
            let ret = unsafe {
                ledc_set_duty(MODE, CHANNEL, duty);
                ledc_update_duty(MODE, CHANNEL)
            };
            if ret != ESP_OK {
                warn!("BUZZER | duty update failed ({ret})");
            }
        }
    }

    impl Buzzer for LedcBuzzer {
        fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
            // SAFETY: see set_duty.
            let ret = unsafe { ledc_set_freq(MODE, TIMER, freq_hz) };
            if ret != ESP_OK {
                warn!("BUZZER | {freq_hz} Hz rejected ({ret})");
                pause(duration_ms);
                return;
            }
            self.set_duty(TONE_DUTY);
            pause(duration_ms);
            self.set_duty(0);
        }

        fn silence(&mut self, duration_ms: u32) {
            self.set_duty(0);
            pause(duration_ms);
        }
    }
}

// ---------------------------------------------------------------------------
// Log-only buzzer
// ---------------------------------------------------------------------------

/// Logs each note.  Keeps real-time pacing so alert timing matches the
/// board.
#[derive(Debug, Default)]
pub struct LogBuzzer {
    notes: usize,
}

impl LogBuzzer {
    /// Notes played so far.
    pub fn notes(&self) -> usize {
        self.notes
    }
}

impl Buzzer for LogBuzzer {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        debug!("BUZZER | {freq_hz} Hz for {duration_ms} ms");
        self.notes += 1;
        pause(duration_ms);
    }

    fn silence(&mut self, duration_ms: u32) {
        pause(duration_ms);
    }
}
