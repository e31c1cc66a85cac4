//! Status aggregator: the two persisted records behind one owner.
//!
//! ```text
//!  NvStorage
//!  ┌──────────────────────────┬──────────────────────┬────────────
//!  │ 0..100   SystemStatus    │ 100..164 CurrentReading │ unused
//!  └──────────────────────────┴──────────────────────┴────────────
//! ```
//!
//! [`StatusStore`] is the single writer for both records.  Every mutation
//! goes through an accessor so dirty tracking cannot be bypassed; the
//! control loop flushes once per tick.

pub mod reading;
pub mod system;

use log::{info, warn};

use crate::alerts::AlertCode;
use crate::app::ports::{MeasurementSet, NvStorage};
use crate::error::StorageError;
use crate::schedule::OperatingWindow;
use crate::storage::{DurableRecord, LoadOutcome, RecordSchema};

pub use reading::{CurrentReading, LidOrientation};
pub use system::SystemStatus;

// ───────────────────────────────────────────────────────────────
// Calibration
// ───────────────────────────────────────────────────────────────

/// Lid-to-contents distance at 100 % full and at empty, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub full_inches: i32,
    pub empty_inches: i32,
}

impl Calibration {
    pub const FACTORY: Self = Self {
        full_inches: system::TRASH_FULL_INCHES,
        empty_inches: system::TRASH_EMPTY_INCHES,
    };

    pub fn contains(self, height_inches: i32) -> bool {
        (self.full_inches..=self.empty_inches).contains(&height_inches)
    }
}

/// Outcome of loading both records at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub system: LoadOutcome,
    pub reading: LoadOutcome,
}

// ───────────────────────────────────────────────────────────────
// StatusStore
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    system: DurableRecord<SystemStatus>,
    reading: DurableRecord<CurrentReading>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the System Status first, then validate the reading against its
    /// calibration.  Either record falls back to defaults on its own.
    pub fn load(&mut self, storage: &mut impl NvStorage) -> LoadReport {
        let system = self.system.load(storage, SystemStatus::validate);
        let calibration = self.calibration();
        let reading = self.reading.load(storage, |r| r.validate(calibration));
        info!(
            "Status loaded: {} / {}",
            describe(SystemStatus::NAME, system),
            describe(CurrentReading::NAME, reading)
        );
        LoadReport { system, reading }
    }

    /// Flush both records.  Both are attempted even if the first fails.
    pub fn flush(
        &mut self,
        storage: &mut impl NvStorage,
        now_ms: u64,
        force: bool,
    ) -> Result<(), StorageError> {
        let sys = self.system.flush(storage, now_ms, force);
        let cur = self.reading.flush(storage, now_ms, force);
        sys.and(cur).map(|_| ())
    }

    pub fn is_dirty(&self) -> bool {
        self.system.is_dirty() || self.reading.is_dirty()
    }

    // ── Raw access ────────────────────────────────────────────

    pub fn system(&self) -> &SystemStatus {
        self.system.get()
    }

    pub fn reading(&self) -> &CurrentReading {
        self.reading.get()
    }

    pub fn update_system(&mut self, f: impl FnOnce(&mut SystemStatus)) {
        self.system.update(f);
    }

    pub fn update_reading(&mut self, f: impl FnOnce(&mut CurrentReading)) {
        self.reading.update(f);
    }

    // ── Operating settings ────────────────────────────────────

    pub fn calibration(&self) -> Calibration {
        let s = self.system.get();
        Calibration {
            full_inches: s.trash_full_inches,
            empty_inches: s.trash_empty_inches,
        }
    }

    pub fn operating_window(&self) -> OperatingWindow {
        let s = self.system.get();
        OperatingWindow::new(s.open_hour, s.close_hour)
    }

    pub fn set_operating_hours(&mut self, open_hour: u8, close_hour: u8) {
        self.system.update(|s| {
            s.open_hour = open_hour;
            s.close_hour = close_hour;
        });
    }

    pub fn low_power_mode(&self) -> bool {
        self.system.get().low_power_mode
    }

    pub fn set_low_power_mode(&mut self, on: bool) {
        self.system.update(|s| s.low_power_mode = on);
    }

    pub fn low_battery_mode(&self) -> bool {
        self.system.get().low_battery_mode
    }

    pub fn verbose_mode(&self) -> bool {
        self.system.get().verbose_mode
    }

    pub fn set_verbose_mode(&mut self, on: bool) {
        self.system.update(|s| s.verbose_mode = on);
    }

    // ── Bookkeeping ───────────────────────────────────────────

    pub fn reset_count(&self) -> u8 {
        self.system.get().reset_count
    }

    /// Count one more reset and return the new total.
    pub fn increment_reset_count(&mut self) -> u8 {
        self.system
            .update(|s| s.reset_count = s.reset_count.saturating_add(1));
        self.reset_count()
    }

    pub fn set_last_report_time(&mut self, unix: i64) {
        self.system.update(|s| s.last_report_time = unix);
    }

    pub fn set_last_connection(&mut self, unix: i64, duration_secs: u16) {
        let duration = duration_secs.min(system::MAX_CONNECTION_DURATION_SECS);
        self.system.update(|s| {
            s.last_connection_time = unix;
            s.last_connection_duration_sec = duration;
        });
    }

    pub fn set_connection_duration(&mut self, duration_secs: u16) {
        let duration = duration_secs.min(system::MAX_CONNECTION_DURATION_SECS);
        self.system
            .update(|s| s.last_connection_duration_sec = duration);
    }

    pub fn set_last_hook_response_time(&mut self, unix: i64) {
        self.system.update(|s| s.last_hook_response_time = unix);
    }

    pub fn set_firmware_release(&mut self, release: f32) {
        self.system.update(|s| s.firmware_release = release);
    }

    // ── Alerts ────────────────────────────────────────────────

    pub fn alert_code(&self) -> u8 {
        self.reading.get().alert_code
    }

    pub fn has_alert(&self) -> bool {
        self.alert_code() != 0
    }

    pub fn raise_alert(&mut self, code: AlertCode) {
        if self.alert_code() != code.raw() {
            warn!("Alert raised: {}", code);
        }
        self.reading.update(|r| r.alert_code = code.raw());
    }

    pub fn clear_alert(&mut self) {
        self.reading.update(|r| r.alert_code = 0);
    }

    // ── Measurements ──────────────────────────────────────────

    pub fn record_measurement(&mut self, m: &MeasurementSet, measured_at: i64) {
        self.reading.update(|r| r.apply(m, measured_at));
    }

    // ── Resets ────────────────────────────────────────────────

    /// Zero the per-day counters: reset count and alert code.
    pub fn reset_everything(&mut self) {
        self.system.update(|s| s.reset_count = 0);
        self.reading.update(|r| r.alert_code = 0);
    }

    /// First tick of a new calendar day: quiet the logs, fall back to low
    /// power, and clear the per-day counters.
    pub fn daily_cleanup(&mut self) {
        info!("Daily cleanup: verbose off, low power on, counters cleared");
        self.system.update(|s| {
            s.verbose_mode = false;
            s.low_power_mode = true;
        });
        self.reset_everything();
    }

    /// Overwrite the System Status with factory defaults, keeping the
    /// firmware release stamp.
    pub fn restore_system_defaults(&mut self) {
        let release = self.system.get().firmware_release;
        self.system.initialize();
        self.system.update(|s| s.firmware_release = release);
        info!("System status restored to defaults");
    }
}

fn describe(name: &'static str, outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Restored => name,
        LoadOutcome::Initialized(_) => "defaults",
    }
}
