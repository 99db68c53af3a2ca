//! Unified error types for the thermozone firmware.
//!
//! Every subsystem converts into the top-level [`Error`] so the task loops
//! handle failures uniformly.  All variants are `Copy` so they can be logged
//! and passed between the control, input and emergency paths without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A channel sensor produced an unusable reading.
    Sensor(SensorFault),
    /// A shared region could not be locked within its budget.
    Lock(LockTimeout),
    /// Persistent storage failed.
    Storage(StorageError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Lock(e) => write!(f, "lock: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The collaborator returned NaN (open thermocouple, bus failure).
    NotANumber,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => write!(f, "reading is not a number"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

/// A [`SensorError`] attributed to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault {
    pub channel: usize,
    pub kind: SensorError,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}: {}", self.channel + 1, self.kind)
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Lock contention
// ---------------------------------------------------------------------------

/// Which of the two protected regions timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    System,
    Display,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Display => write!(f, "display"),
        }
    }
}

/// Transient contention: the lock was not acquired within the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout {
    pub region: Region,
    pub waited_ms: u32,
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lock not acquired within {}ms", self.region, self.waited_ms)
    }
}

impl From<LockTimeout> for Error {
    fn from(e: LockTimeout) -> Self {
        Self::Lock(e)
    }
}

// ---------------------------------------------------------------------------
// Storage / config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored bytes failed to decode.
    Corrupted,
    /// Generic I/O error from the backend.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Corrupted => write!(f, "stored value corrupted"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_fault_names_one_based_channel() {
        let e: Error = SensorFault {
            channel: 1,
            kind: SensorError::NotANumber,
        }
        .into();
        assert_eq!(e.to_string(), "sensor: channel 2: reading is not a number");
    }

    #[test]
    fn lock_timeout_display() {
        let e = LockTimeout {
            region: Region::Display,
            waited_ms: 50,
        };
        assert_eq!(e.to_string(), "display lock not acquired within 50ms");
    }
}
