//! ESP32 time adapter.
//!
//! Provides monotonic and wall-clock time plus local-time conversions.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`;
//!   wall clock from `gettimeofday()` (set by network time sync) and local
//!   time through `localtime_r()` under the POSIX `TZ` rule in [`POSIX_TZ`].
//! - **`not(target_os = "espidf")`**: `std::time` for host-side testing and
//!   simulation, with local time at a fixed UTC offset.

use crate::app::ports::{ClockPort, LocalTimePort};
#[cfg(not(target_os = "espidf"))]
use crate::schedule;

/// US Eastern time, with daylight saving.
pub const POSIX_TZ: &str = "EST5EDT,M3.2.0/2:00:00,M11.1.0/2:00:00";

/// Anything earlier is an unsynced clock.
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    utc_offset_secs: i32,
}

impl Esp32TimeAdapter {
    /// Apply the time-zone rule.  `utc_offset_secs` is used by the host
    /// build only.
    pub fn new(utc_offset_secs: i32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            let _ = utc_offset_secs;
            // SAFETY: called once from the main task before any other
            // thread reads the environment.
            unsafe {
                std::env::set_var("TZ", POSIX_TZ);
                esp_idf_svc::sys::tzset();
            }
            Self {}
        }

        #[cfg(not(target_os = "espidf"))]
        {
            Self {
                start: std::time::Instant::now(),
                utc_offset_secs,
            }
        }
    }

    /// Broken-down local time for `unix`.
    #[cfg(target_os = "espidf")]
    fn local_tm(unix: i64) -> Option<esp_idf_svc::sys::tm> {
        let secs = unix as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        Some(tm)
    }
}

impl ClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn unix_time(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_time(&self) -> Option<i64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs() as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}

impl LocalTimePort for Esp32TimeAdapter {
    fn current_local_hour(&self) -> u8 {
        self.unix_time().map_or(0, |now| self.local_hour_of(now))
    }

    #[cfg(target_os = "espidf")]
    fn local_hour_of(&self, unix: i64) -> u8 {
        Self::local_tm(unix)
            .map(|tm| tm.tm_hour)
            .filter(|h| (0..24).contains(h))
            .map_or(0, |h| h as u8)
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_hour_of(&self, unix: i64) -> u8 {
        schedule::local_hour(unix, self.utc_offset_secs)
    }

    #[cfg(target_os = "espidf")]
    fn is_new_calendar_day(&self, last: i64) -> bool {
        let Some(now) = self.unix_time() else {
            return false;
        };
        match (Self::local_tm(last), Self::local_tm(now)) {
            (Some(then), Some(today)) => {
                (then.tm_year, then.tm_yday) < (today.tm_year, today.tm_yday)
            }
            _ => false,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_new_calendar_day(&self, last: i64) -> bool {
        self.unix_time().is_some_and(|now| {
            schedule::local_day(last, self.utc_offset_secs)
                < schedule::local_day(now, self.utc_offset_secs)
        })
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn host_clock_is_synced_and_monotonic() {
        let t = Esp32TimeAdapter::new(-18_000);
        let a = t.now_ms();
        let b = t.now_ms();
        assert!(b >= a);
        assert!(t.unix_time().is_some());
    }

    #[test]
    fn day_boundary_follows_local_offset() {
        let t = Esp32TimeAdapter::new(-18_000);
        assert!(t.is_new_calendar_day(0));
        assert!(!t.is_new_calendar_day(t.unix_time().unwrap()));
        // 2024-01-01 04:00 UTC is still 23:00 on Dec 31 in UTC-5.
        assert_eq!(t.local_hour_of(1_704_081_600), 23);
    }
}
