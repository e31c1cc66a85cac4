//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensors, radio, clock, storage, event sinks) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware directly.
//!
//! ## Contracts
//!
//! - **NvStorage** is byte-addressable and makes no atomicity promise.
//!   Torn writes are caught by the record header checksum.
//! - **PlatformPort::sleep** is the only blocking call the core makes.
//! - Interrupt context never calls a port; it only raises flags in
//!   [`crate::signals`].

use crate::error::{SensorError, StorageError, TelemetryError};
use crate::status::{Calibration, LidOrientation};
use crate::telemetry::TelemetryRecord;

// ───────────────────────────────────────────────────────────────
// Sensor driver ports (driven adapters: hardware → orchestrator)
// ───────────────────────────────────────────────────────────────

/// Time-of-flight distance sensor with a switchable supply.
pub trait DistanceSensor {
    /// Probe and configure the sensor.
    fn begin(&mut self) -> Result<(), SensorError>;
    fn power_on(&mut self);
    fn power_off(&mut self);
    fn start_ranging(&mut self) -> Result<(), SensorError>;
    fn stop_ranging(&mut self) -> Result<(), SensorError>;
    fn clear_interrupt(&mut self) -> Result<(), SensorError>;
    /// Narrow the receive window to `width` × `height` SPADs around `center`.
    fn set_region_of_interest(&mut self, width: u8, height: u8, center: u8)
        -> Result<(), SensorError>;
    fn data_ready(&mut self) -> Result<bool, SensorError>;
    /// Last ranged distance in millimetres.
    fn distance_mm(&mut self) -> Result<u16, SensorError>;
}

/// Raw three-axis acceleration sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Accelerometer used to tell how the lid is sitting.
pub trait OrientationSensor {
    fn begin(&mut self) -> Result<(), SensorError>;
    /// `None` when no fresh sample is available.
    fn sample(&mut self) -> Option<AccelSample>;
}

/// Fuel gauge on the primary cell.
pub trait BatteryGauge {
    /// Cell voltage, `None` when the gauge does not answer.
    fn voltage(&mut self) -> Option<f32>;
}

/// Analog enclosure temperature probe.
pub trait TemperatureProbe {
    /// Raw 12-bit ADC count.
    fn read_raw(&mut self) -> Option<u16>;
}

// ───────────────────────────────────────────────────────────────
// Measurement port (orchestrator → domain)
// ───────────────────────────────────────────────────────────────

/// The outcome of one measurement pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSet {
    pub height_inches: i32,
    pub percent_full: f32,
    pub was_emptied: bool,
    pub lid_orientation: LidOrientation,
    pub internal_temp_c: f32,
    pub battery_voltage: f32,
    /// How many of the distance / orientation / temperature reads succeeded.
    pub successful_reads: u8,
}

/// Read-side port: the domain calls this to obtain a fresh reading.
pub trait MeasurementPort {
    /// Initialise every sensor.  Called once at boot.
    fn begin_sensors(&mut self) -> Result<(), SensorError>;

    /// Run one full measurement pass.  `previous` supplies the fallback for
    /// any single failed read and the reference for emptied detection.
    fn take_measurements(
        &mut self,
        previous: &MeasurementSet,
        calibration: Calibration,
    ) -> MeasurementSet;
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (domain → publish queue)
// ───────────────────────────────────────────────────────────────

/// Persistent publish queue.  Delivery happens in the background while
/// connected; the outcome arrives on [`AckSignal`](crate::telemetry::AckSignal).
pub trait TelemetryPort {
    fn enqueue(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError>;

    /// Give the queue a chance to transmit.  Called once per tick.
    fn service(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (domain ↔ cellular radio)
// ───────────────────────────────────────────────────────────────

pub trait ConnectivityPort {
    /// Begin a non-blocking connection attempt.
    fn connect(&mut self);
    /// Connected to the cloud endpoint.
    fn is_connected(&self) -> bool;
    /// Radio registered on the network (cloud may still be unreachable).
    fn is_radio_ready(&self) -> bool;
    /// Tear down the session and power the radio off.
    /// Returns `false` if the radio refused to shut down.
    fn disconnect(&mut self) -> bool;
    /// Received signal strength in percent, if known.
    fn signal_strength(&self) -> Option<u8> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Time ports
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;
    /// Wall-clock Unix seconds, `None` until the clock has been set.
    fn unix_time(&self) -> Option<i64>;
}

/// Local-time conversion (daylight-saving rules live in the adapter).
pub trait LocalTimePort {
    fn current_local_hour(&self) -> u8;
    fn local_hour_of(&self, unix: i64) -> u8;
    /// `true` if `last` falls on an earlier local calendar day than now.
    fn is_new_calendar_day(&self, last: i64) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Platform port (domain → power management)
// ───────────────────────────────────────────────────────────────

/// Why the device last restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    PowerOn,
    /// Reset pin asserted, including the external watchdog.
    Pin,
    /// Firmware-requested restart.
    User,
    /// Restart out of a timed power-down.
    PowerDown,
    Other,
}

impl ResetReason {
    /// Pin and user resets count toward the excessive-reset alert.
    pub fn counts_toward_reset_alert(self) -> bool {
        matches!(self, Self::Pin | Self::User)
    }
}

/// What ended a sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Timer,
    UserSwitch,
    SensorActivity,
}

/// A request for one low-power stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    pub duration_secs: u32,
    pub wake_on_user_switch: bool,
    pub wake_on_sensor: bool,
}

pub trait PlatformPort {
    fn reset_reason(&self) -> ResetReason;
    /// Block in a low-power stop until a wake source fires.
    fn sleep(&mut self, request: &SleepRequest) -> WakeReason;
    /// Restart the MCU.  Does not return on hardware.
    fn reset(&mut self);
    /// Cut power for `secs`.  Does not return on hardware.
    fn power_down(&mut self, secs: u32);
    /// Level of the user switch right now.
    fn user_switch_held(&self) -> bool;
}

/// Hardware watchdog.  Starved while asleep.
pub trait WatchdogPort {
    fn feed(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Non-volatile storage port
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile memory (FRAM, or an image in flash).
pub trait NvStorage {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;
    fn capacity(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Aggregate device port
// ───────────────────────────────────────────────────────────────

/// Everything the service needs from the board in one bound, so a single
/// adapter can be passed without double mutable borrows.
pub trait DevicePorts:
    ClockPort
    + LocalTimePort
    + ConnectivityPort
    + PlatformPort
    + WatchdogPort
    + MeasurementPort
    + TelemetryPort
    + NvStorage
{
}

impl<T> DevicePorts for T where
    T: ClockPort
        + LocalTimePort
        + ConnectivityPort
        + PlatformPort
        + WatchdogPort
        + MeasurementPort
        + TelemetryPort
        + NvStorage
{
}
