//! Periodic tasks and their placement.
//!
//! ```text
//!  task      core  prio  period   lock budget   touches
//!  control   APP   5     100 ms   50 ms         sensors, heaters, emergency
//!  input     APP   4      20 ms   30 ms         encoders, mode machine, NVS
//!  autotune  PRO   3    1000 ms   50 ms         relay tuner (outside lock)
//!  display   PRO   2     250 ms   50 ms + 50    snapshot, then LCD lock
//!  alert     PRO   1     queue    -             buzzer
//! ```
//!
//! Every periodic task is a struct with a `cycle(now_ms)` method that does
//! one lock window of work and a `run` loop that paces it with
//! [`PeriodicTimer`](crate::drivers::hw_timer::PeriodicTimer).  Tests drive
//! `cycle` directly.

pub mod alert;
pub mod autotune;
pub mod control;
pub mod display;
pub mod input;

use std::io;
use std::thread::JoinHandle;

pub use crate::drivers::task_pin::{Core, TaskSpec};
use crate::drivers::task_pin::spawn_pinned;

pub const CONTROL_TASK: TaskSpec = TaskSpec {
    name: "control\0",
    core: Core::App,
    priority: 5,
    stack_kb: 8,
};

pub const INPUT_TASK: TaskSpec = TaskSpec {
    name: "input\0",
    core: Core::App,
    priority: 4,
    stack_kb: 8,
};

pub const AUTOTUNE_TASK: TaskSpec = TaskSpec {
    name: "autotune\0",
    core: Core::Pro,
    priority: 3,
    stack_kb: 6,
};

pub const DISPLAY_TASK: TaskSpec = TaskSpec {
    name: "display\0",
    core: Core::Pro,
    priority: 2,
    stack_kb: 6,
};

pub const ALERT_TASK: TaskSpec = TaskSpec {
    name: "alert\0",
    core: Core::Pro,
    priority: 1,
    stack_kb: 4,
};

pub fn spawn(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    spawn_pinned(spec, f)
}
