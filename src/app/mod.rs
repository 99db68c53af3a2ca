//! Application core: collaborator ports, alert sequencing and the
//! persisted settings policy.
//!
//! Nothing in here touches hardware.  Drivers and adapters implement the
//! traits in [`ports`]; the tasks wire them together.

pub mod alerts;
pub mod ports;
pub mod settings;
