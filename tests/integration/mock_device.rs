//! Mock device for integration tests.
//!
//! One struct implements every device port.  The clock only moves when a
//! test advances it (or when the device sleeps), so lifecycle timeouts can
//! be crossed deterministically.  Storage is a plain byte image that
//! survives across `AppService` instances, which is how a restart is
//! simulated.

use std::collections::VecDeque;

use trashpanda::app::events::AppEvent;
use trashpanda::app::ports::{
    ClockPort, ConnectivityPort, EventSink, LocalTimePort, MeasurementPort, MeasurementSet,
    NvStorage, PlatformPort, ResetReason, SleepRequest, TelemetryPort, WakeReason, WatchdogPort,
};
use trashpanda::app::service::AppService;
use trashpanda::config::DeviceConfig;
use trashpanda::error::{SensorError, StorageError, TelemetryError};
use trashpanda::fsm::StateId;
use trashpanda::schedule;
use trashpanda::signals::InterruptFlags;
use trashpanda::status::{Calibration, CurrentReading, LidOrientation, SystemStatus};
use trashpanda::storage::{Corrupt, DurableRecord, MAX_RECORD_LEN, RecordSchema};
use trashpanda::telemetry::{AckSignal, TelemetryRecord};

/// 2023-11-14 17:13:20 local time (UTC-5).
pub const BASE_UNIX: i64 = 1_700_000_000;
pub const UTC_OFFSET_SECS: i32 = -18_000;
pub const IMAGE_LEN: usize = 512;

// ── Records ───────────────────────────────────────────────────

/// A System Status that was saved earlier the same day, in low power,
/// after a report this hour.
pub fn warm_system() -> SystemStatus {
    SystemStatus {
        low_power_mode: true,
        last_connection_time: BASE_UNIX,
        last_report_time: BASE_UNIX,
        ..SystemStatus::default()
    }
}

pub fn bench_measurement() -> MeasurementSet {
    MeasurementSet {
        height_inches: 20,
        percent_full: 62.0,
        was_emptied: false,
        lid_orientation: LidOrientation::RightSideUp,
        internal_temp_c: 21.5,
        battery_voltage: 3.9,
        successful_reads: 3,
    }
}

// ── Sleep record ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepCall {
    pub at_unix: Option<i64>,
    pub request: SleepRequest,
    pub wake: WakeReason,
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    // Clock
    pub now_ms: u64,
    /// Wall clock at `now_ms == 0`; `None` keeps the clock unset.
    pub unix_base: Option<i64>,

    // Storage
    pub image: Vec<u8>,
    pub image_writes: u32,

    // Platform
    pub reset_reason: ResetReason,
    pub switch_held: bool,
    pub wakes: VecDeque<WakeReason>,
    pub sleeps: Vec<SleepCall>,
    pub resets: u32,
    pub power_downs: Vec<u32>,

    // Watchdog
    pub feeds: u32,
    pub pauses: u32,
    pub watchdog_paused: bool,

    // Sensors
    pub sensors_fail: bool,
    pub measurement: MeasurementSet,
    pub measure_calls: u32,

    // Radio: stage delays from the start of an attempt; `None` never arrives.
    pub radio_ready_after_ms: Option<u64>,
    pub connected_after_ms: Option<u64>,
    pub refuse_disconnect: bool,
    pub connect_calls: u32,
    pub disconnect_calls: u32,
    attempt_started_ms: Option<u64>,

    // Telemetry
    pub enqueued: Vec<TelemetryRecord>,
    pub queue_full: bool,
    pub service_calls: u32,
}

#[allow(dead_code)]
impl MockDevice {
    /// Blank storage, synced clock, instant network.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            unix_base: Some(BASE_UNIX),
            image: vec![0; IMAGE_LEN],
            image_writes: 0,
            reset_reason: ResetReason::PowerOn,
            switch_held: false,
            wakes: VecDeque::new(),
            sleeps: Vec::new(),
            resets: 0,
            power_downs: Vec::new(),
            feeds: 0,
            pauses: 0,
            watchdog_paused: false,
            sensors_fail: false,
            measurement: bench_measurement(),
            measure_calls: 0,
            radio_ready_after_ms: Some(0),
            connected_after_ms: Some(0),
            refuse_disconnect: false,
            connect_calls: 0,
            disconnect_calls: 0,
            attempt_started_ms: None,
            enqueued: Vec::new(),
            queue_full: false,
            service_calls: 0,
        }
    }

    /// Storage already holding `system` and a default reading.
    pub fn warm(system: SystemStatus) -> Self {
        let mut dev = Self::new();
        dev.store(&system);
        dev.store(&CurrentReading::default());
        dev
    }

    /// No network at all.
    pub fn offline(mut self) -> Self {
        self.radio_ready_after_ms = None;
        self.connected_after_ms = None;
        self
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    /// Write `value` into its region exactly as the firmware would.
    pub fn store<T: RecordSchema>(&mut self, value: &T) {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = DurableRecord::<T>::encode(value, &mut buf).expect("record fits its region");
        self.image[T::OFFSET..T::OFFSET + len].copy_from_slice(&buf[..len]);
    }

    /// Decode the region for `T` from the image.
    pub fn stored<T: RecordSchema>(&self) -> Result<T, Corrupt> {
        DurableRecord::<T>::decode(&self.image[T::OFFSET..T::OFFSET + T::REGION_LEN])
    }

    fn stage_reached(&self, after: Option<u64>) -> bool {
        match (self.attempt_started_ms, after) {
            (Some(start), Some(after)) => self.now_ms >= start + after,
            _ => false,
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

// ── Ports ─────────────────────────────────────────────────────

impl ClockPort for MockDevice {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn unix_time(&self) -> Option<i64> {
        self.unix_base.map(|base| base + (self.now_ms / 1000) as i64)
    }
}

impl LocalTimePort for MockDevice {
    fn current_local_hour(&self) -> u8 {
        self.unix_time()
            .map_or(0, |now| schedule::local_hour(now, UTC_OFFSET_SECS))
    }

    fn local_hour_of(&self, unix: i64) -> u8 {
        schedule::local_hour(unix, UTC_OFFSET_SECS)
    }

    fn is_new_calendar_day(&self, last: i64) -> bool {
        self.unix_time().is_some_and(|now| {
            schedule::local_day(last, UTC_OFFSET_SECS) < schedule::local_day(now, UTC_OFFSET_SECS)
        })
    }
}

impl ConnectivityPort for MockDevice {
    fn connect(&mut self) {
        self.connect_calls += 1;
        if self.attempt_started_ms.is_none() {
            self.attempt_started_ms = Some(self.now_ms);
        }
    }

    fn is_connected(&self) -> bool {
        self.stage_reached(self.connected_after_ms)
    }

    fn is_radio_ready(&self) -> bool {
        self.stage_reached(self.radio_ready_after_ms) || self.is_connected()
    }

    fn disconnect(&mut self) -> bool {
        self.disconnect_calls += 1;
        if self.refuse_disconnect {
            return false;
        }
        self.attempt_started_ms = None;
        true
    }
}

impl PlatformPort for MockDevice {
    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    /// Timer wakes sleep the full request; anything else wakes a second in.
    fn sleep(&mut self, request: &SleepRequest) -> WakeReason {
        let wake = self.wakes.pop_front().unwrap_or(WakeReason::Timer);
        self.sleeps.push(SleepCall {
            at_unix: self.unix_time(),
            request: *request,
            wake,
        });
        let slept_ms = match wake {
            WakeReason::Timer => u64::from(request.duration_secs) * 1000,
            _ => 1000,
        };
        self.advance(slept_ms);
        wake
    }

    fn reset(&mut self) {
        self.resets += 1;
    }

    fn power_down(&mut self, secs: u32) {
        self.power_downs.push(secs);
    }

    fn user_switch_held(&self) -> bool {
        self.switch_held
    }
}

impl WatchdogPort for MockDevice {
    fn feed(&mut self) {
        self.feeds += 1;
    }

    fn pause(&mut self) {
        self.pauses += 1;
        self.watchdog_paused = true;
    }

    fn resume(&mut self) {
        self.watchdog_paused = false;
    }
}

impl MeasurementPort for MockDevice {
    fn begin_sensors(&mut self) -> Result<(), SensorError> {
        if self.sensors_fail {
            Err(SensorError::InitFailed)
        } else {
            Ok(())
        }
    }

    fn take_measurements(
        &mut self,
        _previous: &MeasurementSet,
        _calibration: Calibration,
    ) -> MeasurementSet {
        self.measure_calls += 1;
        self.measurement
    }
}

impl TelemetryPort for MockDevice {
    fn enqueue(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        if self.queue_full {
            return Err(TelemetryError::QueueFull);
        }
        self.enqueued.push(record.clone());
        Ok(())
    }

    fn service(&mut self) {
        self.service_calls += 1;
    }
}

impl NvStorage for MockDevice {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .image
            .get(offset..offset + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let dst = self
            .image
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        self.image_writes += 1;
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.image.len()
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn alerts_raised(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::AlertRaised(code) => Some(*code),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// Service, device, interrupt flags and acknowledgement in one place.
pub struct Harness {
    pub app: AppService,
    pub dev: MockDevice,
    pub irqs: InterruptFlags,
    pub ack: AckSignal,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(dev: MockDevice) -> Self {
        Self::with_config(dev, DeviceConfig::default())
    }

    pub fn with_config(dev: MockDevice, config: DeviceConfig) -> Self {
        Self {
            app: AppService::new(config),
            dev,
            irqs: InterruptFlags::new(),
            ack: AckSignal::new(),
            sink: RecordingSink::default(),
        }
    }

    pub fn boot(&mut self) -> StateId {
        self.app.boot(&mut self.dev, &mut self.sink)
    }

    /// Power-cycle: a fresh service over the same storage image.
    pub fn reboot(&mut self, reason: ResetReason) -> StateId {
        self.app = AppService::new(self.app.config().clone());
        self.dev.reset_reason = reason;
        self.boot()
    }

    /// Move the clock by `step_ms`, then run one control tick.
    pub fn tick(&mut self, step_ms: u64) {
        self.dev.advance(step_ms);
        self.app
            .tick(&mut self.dev, &self.irqs, &self.ack, &mut self.sink);
    }

    pub fn run(&mut self, ticks: u32, step_ms: u64) {
        for _ in 0..ticks {
            self.tick(step_ms);
        }
    }

    /// Tick until `done` holds.  Returns `false` if it never did.
    pub fn run_until(&mut self, max_ticks: u32, step_ms: u64, done: impl Fn(&Self) -> bool) -> bool {
        for _ in 0..max_ticks {
            self.tick(step_ms);
            if done(self) {
                return true;
            }
        }
        false
    }

    pub fn state(&self) -> StateId {
        self.app.state()
    }

    pub fn alert(&self) -> u8 {
        self.app.status().alert_code()
    }
}
