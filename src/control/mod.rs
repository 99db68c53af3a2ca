//! Control algorithms: the per-zone PID engine and the relay autotuner.

pub mod autotune;
pub mod pid;
