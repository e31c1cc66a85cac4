//! Hardware adapter: bridges the board to every domain port.
//!
//! Owns the measurement orchestrator, the record storage, the radio, the
//! publish queue, the platform and the watchdog, and exposes them through
//! one value that satisfies [`DevicePorts`](crate::app::ports::DevicePorts).
//! Passing a single adapter keeps the service free of double mutable
//! borrows.  On non-espidf targets the parts use their simulation backends.

use log::{debug, warn};

use crate::app::ports::{
    ClockPort, ConnectivityPort, LocalTimePort, MeasurementPort, MeasurementSet, NvStorage,
    PlatformPort, ResetReason, SleepRequest, TelemetryPort, WakeReason, WatchdogPort,
};
use crate::drivers::watchdog::Watchdog;
use crate::error::{SensorError, StorageError, TelemetryError};
use crate::status::Calibration;
use crate::telemetry::TelemetryRecord;

use super::nvs::NvsImageStorage;
use super::platform::EspPlatform;
use super::publish_queue::{PublishQueue, Uplink};
use super::radio::RadioAdapter;
use super::time::Esp32TimeAdapter;

/// Reports held while the radio is down.
pub const REPORT_QUEUE_DEPTH: usize = 8;

// ── Record storage selection ──────────────────────────────────

/// FRAM when fitted, otherwise the NVS image.
pub enum RecordStorage<F> {
    Fram(F),
    Nvs(NvsImageStorage),
}

impl<F: NvStorage> NvStorage for RecordStorage<F> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        match self {
            Self::Fram(f) => f.read(offset, buf),
            Self::Nvs(n) => n.read(offset, buf),
        }
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::Fram(f) => f.write(offset, data),
            Self::Nvs(n) => n.write(offset, data),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Self::Fram(f) => f.capacity(),
            Self::Nvs(n) => n.capacity(),
        }
    }
}

// ── Adapter ───────────────────────────────────────────────────

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<M, S, U> {
    measurement: M,
    storage: S,
    radio: RadioAdapter,
    queue: PublishQueue<U, REPORT_QUEUE_DEPTH>,
    platform: EspPlatform,
    watchdog: Watchdog,
    clock: Esp32TimeAdapter,
}

impl<M, S, U> HardwareAdapter<M, S, U>
where
    M: MeasurementPort,
    S: NvStorage,
    U: Uplink,
{
    pub fn new(
        measurement: M,
        storage: S,
        radio: RadioAdapter,
        queue: PublishQueue<U, REPORT_QUEUE_DEPTH>,
        platform: EspPlatform,
        watchdog: Watchdog,
        clock: Esp32TimeAdapter,
    ) -> Self {
        Self {
            measurement,
            storage,
            radio,
            queue,
            platform,
            watchdog,
            clock,
        }
    }

    pub fn radio(&self) -> &RadioAdapter {
        &self.radio
    }

    pub fn queue(&self) -> &PublishQueue<U, REPORT_QUEUE_DEPTH> {
        &self.queue
    }

    pub fn platform(&self) -> &EspPlatform {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut EspPlatform {
        &mut self.platform
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

// ── Clock / local time ────────────────────────────────────────

impl<M, S, U> ClockPort for HardwareAdapter<M, S, U> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn unix_time(&self) -> Option<i64> {
        self.clock.unix_time()
    }
}

impl<M, S, U> LocalTimePort for HardwareAdapter<M, S, U> {
    fn current_local_hour(&self) -> u8 {
        self.clock.current_local_hour()
    }

    fn local_hour_of(&self, unix: i64) -> u8 {
        self.clock.local_hour_of(unix)
    }

    fn is_new_calendar_day(&self, last: i64) -> bool {
        self.clock.is_new_calendar_day(last)
    }
}

// ── Connectivity ──────────────────────────────────────────────

impl<M, S, U> ConnectivityPort for HardwareAdapter<M, S, U> {
    fn connect(&mut self) {
        self.radio.connect();
    }

    fn is_connected(&self) -> bool {
        self.radio.is_connected()
    }

    fn is_radio_ready(&self) -> bool {
        self.radio.is_radio_ready()
    }

    fn disconnect(&mut self) -> bool {
        self.radio.disconnect()
    }

    fn signal_strength(&self) -> Option<u8> {
        self.radio.signal_strength()
    }
}

// ── Platform / watchdog ───────────────────────────────────────

impl<M, S, U> PlatformPort for HardwareAdapter<M, S, U> {
    fn reset_reason(&self) -> ResetReason {
        self.platform.reset_reason()
    }

    fn sleep(&mut self, request: &SleepRequest) -> WakeReason {
        self.platform.sleep(request)
    }

    fn reset(&mut self) {
        self.platform.reset();
    }

    fn power_down(&mut self, secs: u32) {
        self.platform.power_down(secs);
    }

    fn user_switch_held(&self) -> bool {
        self.platform.user_switch_held()
    }
}

impl<M, S, U> WatchdogPort for HardwareAdapter<M, S, U> {
    fn feed(&mut self) {
        self.watchdog.feed();
    }

    fn pause(&mut self) {
        self.watchdog.pause();
    }

    fn resume(&mut self) {
        self.watchdog.resume();
    }
}

// ── Measurement ───────────────────────────────────────────────

impl<M: MeasurementPort, S, U> MeasurementPort for HardwareAdapter<M, S, U> {
    fn begin_sensors(&mut self) -> Result<(), SensorError> {
        self.measurement.begin_sensors()
    }

    fn take_measurements(
        &mut self,
        previous: &MeasurementSet,
        calibration: Calibration,
    ) -> MeasurementSet {
        self.measurement.take_measurements(previous, calibration)
    }
}

// ── Telemetry ─────────────────────────────────────────────────

impl<M, S, U: Uplink> TelemetryPort for HardwareAdapter<M, S, U> {
    fn enqueue(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.queue.enqueue(record)
    }

    /// Deliveries only go out while the uplink is up.
    fn service(&mut self) {
        if self.radio.is_connected() {
            self.queue.service();
        } else if !self.queue.is_empty() {
            debug!("{} report(s) waiting for the uplink", self.queue.len());
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

impl<M, S: NvStorage, U> NvStorage for HardwareAdapter<M, S, U> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.storage.read(offset, buf)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let result = self.storage.write(offset, data);
        if let Err(e) = result {
            warn!("Record write at {} failed: {}", offset, e);
        }
        result
    }

    fn capacity(&self) -> usize {
        self.storage.capacity()
    }
}
