//! Operating window and wall-clock alignment.
//!
//! The device reports at most once per local hour while its operating
//! window is open, and sleeps so that each wake lands just after a
//! wall-clock boundary:
//!
//! ```text
//!   :00        :00        :00
//!    │ report   │ report   │
//!    ▼          ▼          ▼
//!  ──┴──zzzzzzzz┴──zzzzzzzz┴──
//!       ▲ sleep = boundary − (now mod boundary) + 1 s
//! ```

/// Seconds in one day.
const SECS_PER_DAY: i64 = 86_400;

/// Hours during which the device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    /// First open hour (0-23 inclusive).
    pub open_hour: u8,
    /// Last open hour (0-24 inclusive).  24 keeps the window open all day.
    pub close_hour: u8,
}

impl OperatingWindow {
    pub const ALWAYS: Self = Self {
        open_hour: 0,
        close_hour: 24,
    };

    pub const fn new(open_hour: u8, close_hour: u8) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }

    /// Closed when `hour < open_hour` or `hour > close_hour`.
    pub fn is_open(&self, hour: u8) -> bool {
        !(hour < self.open_hour || hour > self.close_hour)
    }
}

/// A report is due when the local hour differs from the hour of the last
/// report.  `None` means no report has been made yet.
pub fn report_due(current_hour: u8, last_report_hour: Option<u8>) -> bool {
    last_report_hour != Some(current_hour)
}

/// Seconds to sleep so the wake lands one second past the next boundary.
///
/// The remainder is clamped into `1..=boundary` first, so an exact hit on
/// the boundary still sleeps a full period and the result is never zero.
pub fn seconds_until_wake(unix_now: i64, boundary_secs: u32) -> u32 {
    let boundary = i64::from(boundary_secs.max(1));
    let remainder = (boundary - unix_now.rem_euclid(boundary)).clamp(1, boundary);
    remainder as u32 + 1
}

/// Local hour of day for a Unix timestamp at a fixed UTC offset.
pub fn local_hour(unix: i64, utc_offset_secs: i32) -> u8 {
    ((unix + i64::from(utc_offset_secs)).rem_euclid(SECS_PER_DAY) / 3600) as u8
}

/// Local day number for a Unix timestamp at a fixed UTC offset.
pub fn local_day(unix: i64, utc_offset_secs: i32) -> i64 {
    (unix + i64::from(utc_offset_secs)).div_euclid(SECS_PER_DAY)
}
