//! System Status record: operating settings and connection bookkeeping.

use serde::{Deserialize, Serialize};

use crate::storage::RecordSchema;

/// Bumped whenever a field is appended; stored inside the payload as well
/// as being checked by the validator.
pub const STRUCTURES_VERSION: u8 = 2;

/// Factory calibration: distance to the lid at 100 % and 0 % full.
pub const TRASH_FULL_INCHES: i32 = 9;
pub const TRASH_EMPTY_INCHES: i32 = 38;

/// Ceiling on a recorded connection attempt.
pub const MAX_CONNECTION_DURATION_SECS: u16 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub structures_version: u8,
    pub verbose_mode: bool,
    pub low_power_mode: bool,
    pub low_battery_mode: bool,
    pub reset_count: u8,
    /// First hour (local) of the operating window.
    pub open_hour: u8,
    /// Last hour (local) of the operating window; 24 keeps it open all day.
    pub close_hour: u8,
    pub last_report_time: i64,
    pub last_connection_time: i64,
    pub last_hook_response_time: i64,
    pub last_connection_duration_sec: u16,
    pub firmware_release: f32,
    pub trash_full_inches: i32,
    pub trash_empty_inches: i32,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            structures_version: STRUCTURES_VERSION,
            verbose_mode: true,
            low_power_mode: false,
            low_battery_mode: false,
            reset_count: 0,
            open_hour: 0,
            close_hour: 24,
            last_report_time: 0,
            last_connection_time: 0,
            last_hook_response_time: 0,
            last_connection_duration_sec: 0,
            firmware_release: 0.0,
            trash_full_inches: TRASH_FULL_INCHES,
            trash_empty_inches: TRASH_EMPTY_INCHES,
        }
    }
}

impl SystemStatus {
    /// Range checks applied on every load.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.structures_version != STRUCTURES_VERSION {
            return Err("structures_version does not match firmware");
        }
        if self.open_hour > 23 {
            return Err("open_hour must be 0–23");
        }
        if self.close_hour > 24 {
            return Err("close_hour must be 0–24");
        }
        if self.last_connection_duration_sec > MAX_CONNECTION_DURATION_SECS {
            return Err("last_connection_duration_sec must be ≤ 900");
        }
        if self.trash_full_inches != TRASH_FULL_INCHES
            || self.trash_empty_inches != TRASH_EMPTY_INCHES
        {
            return Err("calibration differs from factory values");
        }
        Ok(())
    }
}

impl RecordSchema for SystemStatus {
    const NAME: &'static str = "sysStatus";
    const MAGIC: u32 = 0x20a9_9e75;
    const VERSION: u16 = 2;
    const OFFSET: usize = 0;
    const REGION_LEN: usize = 100;
    const SAVE_DELAY_MS: u64 = 100;

    fn defaults() -> Self {
        Self::default()
    }
}
