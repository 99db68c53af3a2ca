//! Rotary encoder with push switch.
//!
//! ## Hardware
//!
//! Mechanical quadrature encoder (CLK/DT) plus an active-low momentary
//! switch with pull-up.  All three lines are sampled by [`poll`] at the
//! input-task rate; no interrupts are involved.
//!
//! ## Gesture detection
//!
//! | Gesture  | Condition                                 | Event                 |
//! |----------|-------------------------------------------|-----------------------|
//! | Rotate   | CLK falling edge; DT level gives direction| `Turn(Clockwise/Ccw)` |
//! | Click    | Pressed ≥ 50 ms, released before 600 ms   | `Click`               |
//! | Hold     | Still pressed after 600 ms                | `Hold` (once)         |
//!
//! [`poll`]: RotaryEncoder::poll

use embedded_hal::digital::InputPin;
use heapless::Deque;
use log::debug;

use crate::app::ports::{InputDevice, InputEvent, Rotation};

const DEBOUNCE_MS: u32 = 50;
const HOLD_MS: u32 = 600;
const QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchState {
    Released,
    Debounce { since_ms: u32 },
    Pressed { since_ms: u32, hold_sent: bool },
}

pub struct RotaryEncoder<CLK, DT, SW> {
    clk: CLK,
    dt: DT,
    sw: SW,
    last_clk: bool,
    switch: SwitchState,
    pending: Deque<InputEvent, QUEUE_DEPTH>,
}

impl<CLK: InputPin, DT: InputPin, SW: InputPin> RotaryEncoder<CLK, DT, SW> {
    pub fn new(mut clk: CLK, dt: DT, sw: SW) -> Self {
        let last_clk = clk.is_high().unwrap_or(true);
        Self {
            clk,
            dt,
            sw,
            last_clk,
            switch: SwitchState::Released,
            pending: Deque::new(),
        }
    }

    fn push(&mut self, event: InputEvent) {
        if self.pending.push_back(event).is_err() {
            debug!("encoder queue full, dropping {:?}", event);
        }
    }

    fn sample_rotation(&mut self) {
        let Ok(clk) = self.clk.is_high() else { return };
        if clk == self.last_clk {
            return;
        }
        self.last_clk = clk;
        if clk {
            return;
        }
        let Ok(dt) = self.dt.is_high() else { return };
        let rotation = if dt {
            Rotation::Clockwise
        } else {
            Rotation::CounterClockwise
        };
        self.push(InputEvent::Turn(rotation));
    }

    fn sample_switch(&mut self, now_ms: u32) {
        let pressed = self.sw.is_low().unwrap_or(false);
        self.switch = match self.switch {
            SwitchState::Released if pressed => SwitchState::Debounce { since_ms: now_ms },
            SwitchState::Released => SwitchState::Released,

            SwitchState::Debounce { .. } if !pressed => SwitchState::Released,
            SwitchState::Debounce { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    SwitchState::Pressed {
                        since_ms,
                        hold_sent: false,
                    }
                } else {
                    SwitchState::Debounce { since_ms }
                }
            }

            SwitchState::Pressed { hold_sent, .. } if !pressed => {
                if !hold_sent {
                    self.push(InputEvent::Click);
                }
                SwitchState::Released
            }
            SwitchState::Pressed {
                since_ms,
                hold_sent: false,
            } if now_ms.wrapping_sub(since_ms) >= HOLD_MS => {
                self.push(InputEvent::Hold);
                SwitchState::Pressed {
                    since_ms,
                    hold_sent: true,
                }
            }
            held @ SwitchState::Pressed { .. } => held,
        };
    }
}

impl<CLK: InputPin, DT: InputPin, SW: InputPin> InputDevice for RotaryEncoder<CLK, DT, SW> {
    fn poll(&mut self, now_ms: u32) -> Option<InputEvent> {
        self.sample_rotation();
        self.sample_switch(now_ms);
        self.pending.pop_front()
    }

    fn is_holding(&self) -> bool {
        matches!(
            self.switch,
            SwitchState::Pressed {
                hold_sent: true,
                ..
            }
        )
    }
}
