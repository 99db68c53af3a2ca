//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock collaborators.  All tests run on the host with no real
//! hardware required; task cycles are driven by hand with explicit
//! timestamps.

mod autotune_tests;
mod control_tests;
mod emergency_tests;
mod mock_hw;
mod mode_tests;
mod settings_tests;
