//! Current Reading record: the latest measurement and the active alert.

use serde::{Deserialize, Serialize};

use crate::alerts;
use crate::app::ports::MeasurementSet;
use crate::storage::RecordSchema;

use super::Calibration;

/// How the lid is sitting, from the accelerometer z axis.
///
/// Discriminants match the values the cloud side already understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LidOrientation {
    #[default]
    Unknown = 0,
    Side = 1,
    RightSideUp = 5,
    UpsideDown = 6,
}

impl LidOrientation {
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReading {
    pub height_inches: i32,
    pub percent_full: f32,
    pub last_measure_time: i64,
    pub was_emptied: bool,
    pub internal_temp_c: f32,
    pub lid_orientation: LidOrientation,
    pub alert_code: u8,
    pub battery_voltage: f32,
}

impl Default for CurrentReading {
    fn default() -> Self {
        Self {
            height_inches: Calibration::FACTORY.empty_inches,
            percent_full: 0.0,
            last_measure_time: 0,
            was_emptied: false,
            internal_temp_c: 0.0,
            lid_orientation: LidOrientation::Unknown,
            alert_code: 0,
            battery_voltage: 0.0,
        }
    }
}

impl CurrentReading {
    /// Range checks applied on every load, against the loaded calibration.
    pub fn validate(&self, calibration: Calibration) -> Result<(), &'static str> {
        if !calibration.contains(self.height_inches) {
            return Err("height_inches outside calibration band");
        }
        if !(0.0..=100.0).contains(&self.percent_full) {
            return Err("percent_full must be 0–100");
        }
        if !(-40.0..=85.0).contains(&self.internal_temp_c) {
            return Err("internal_temp_c must be -40–85");
        }
        if self.last_measure_time < 0 {
            return Err("last_measure_time is negative");
        }
        if !alerts::is_valid_raw(self.alert_code) {
            return Err("alert_code outside defined range");
        }
        Ok(())
    }

    /// View the stored fields as the previous measurement.
    pub fn as_measurement(&self) -> MeasurementSet {
        MeasurementSet {
            height_inches: self.height_inches,
            percent_full: self.percent_full,
            was_emptied: self.was_emptied,
            lid_orientation: self.lid_orientation,
            internal_temp_c: self.internal_temp_c,
            battery_voltage: self.battery_voltage,
            successful_reads: 3,
        }
    }

    /// Copy a measurement in, stamping the time it was taken.
    pub fn apply(&mut self, m: &MeasurementSet, measured_at: i64) {
        self.height_inches = m.height_inches;
        self.percent_full = m.percent_full;
        self.was_emptied = m.was_emptied;
        self.lid_orientation = m.lid_orientation;
        self.internal_temp_c = m.internal_temp_c;
        self.battery_voltage = m.battery_voltage;
        self.last_measure_time = measured_at;
    }
}

impl RecordSchema for CurrentReading {
    const NAME: &'static str = "current";
    const MAGIC: u32 = 0x20a9_9e74;
    const VERSION: u16 = 2;
    const OFFSET: usize = 100;
    const REGION_LEN: usize = 64;
    const SAVE_DELAY_MS: u64 = 250;

    fn defaults() -> Self {
        Self::default()
    }
}
