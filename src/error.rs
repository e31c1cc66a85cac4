//! Unified error types for the TrashPanda firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level control loop's error handling uniform.  All variants are
//! `Copy` so they pass through the service and FSM without allocation.
//!
//! None of these errors is fatal to the device.  Storage failures leave a
//! record dirty for the next flush, sensor failures degrade the current
//! reading, and telemetry failures surface later as a missing
//! acknowledgement.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Non-volatile memory could not be read or written.
    Storage(StorageError),
    /// A sensor could not be initialised or read.
    Sensor(SensorError),
    /// The telemetry queue refused a report.
    Telemetry(TelemetryError),
    /// A remote command carried invalid parameters.
    Command(CommandError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`NvStorage`](crate::app::ports::NvStorage) backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The access would run past the end of the device.
    OutOfBounds,
    /// The bus transaction or backend call failed.
    IoError,
    /// The backing device did not answer its probe.
    NotPresent,
    /// The encoded record does not fit in its reserved region.
    RecordTooLarge,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::IoError => write!(f, "I/O error"),
            Self::NotPresent => write!(f, "device not present"),
            Self::RecordTooLarge => write!(f, "record exceeds its region"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor did not respond during initialisation.
    InitFailed,
    /// A bus transaction with the sensor failed.
    BusError,
    /// No data became ready within the polling timeout.
    Timeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "initialisation failed"),
            Self::BusError => write!(f, "bus error"),
            Self::Timeout => write!(f, "data ready timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The publish queue has no room for another report.
    QueueFull,
    /// The report could not be serialised into the payload buffer.
    Encode,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "publish queue full"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A parameter failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
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
    fn display_prefixes_subsystem() {
        let e: Error = StorageError::IoError.into();
        assert_eq!(e.to_string(), "storage: I/O error");
        let e: Error = CommandError::ValidationFailed("open_hour must be 0–23").into();
        assert_eq!(e.to_string(), "command: validation failed: open_hour must be 0–23");
    }
}
