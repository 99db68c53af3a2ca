//! Thermozone: three-zone PID temperature controller firmware.
//!
//! ```text
//!  encoders ─▶ input task ──┐                 ┌──▶ display task ─▶ LCD
//!                           ▼                 │
//!                 TimedMutex<SystemState> ────┤
//!                           ▲                 │
//!  MAX6675 ──▶ control task ┘──▶ heaters      └──▶ autotune task
//!                  │
//!                  └─ emergency ─▶ AlertQueue ─▶ alert task ─▶ buzzer
//! ```
//!
//! Everything except the ESP-IDF boot wiring in `main.rs` builds and tests
//! on the host.  Hardware access is guarded by
//! `#[cfg(target_os = "espidf")]` inside each module, with a simulation
//! twin for the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod channel;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod safety;
pub mod state;
pub mod tasks;

pub use error::{Error, Result};
