//! Device timing and policy parameters
//!
//! Compiled-in defaults for every timer the lifecycle uses.  Operating
//! settings that must survive a reset (hours, power modes) live in the
//! System Status record instead, see [`crate::status`].

use serde::{Deserialize, Serialize};

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Reporting cadence ---
    /// Wake-up alignment boundary in seconds (wakes land just after each boundary)
    pub wake_boundary_secs: u32,

    // --- Stay-awake windows ---
    /// Awake time after a user wake or an in-hours timer wake (ms)
    pub stay_awake_long_ms: u64,
    /// Awake time after an ordinary wake (ms)
    pub stay_awake_short_ms: u64,

    // --- Connectivity ---
    /// Longest a connection attempt may run before raising an alert (seconds)
    pub connect_timeout_secs: u32,
    /// How long to wait for a delivery acknowledgement (ms)
    pub ack_wait_ms: u64,
    /// Consecutive connectivity alerts before a modem power cycle
    pub connect_failures_before_power_cycle: u8,

    // --- Error handling ---
    /// Grace period between entering Error and executing the resolved action (ms)
    pub error_cooldown_ms: u64,
    /// Duration of a last-resort power-down (seconds)
    pub power_down_secs: u32,
    /// Resets tolerated per day before alerting
    pub reset_alert_threshold: u8,

    // --- Measurement ---
    /// Upper bound on the distance sensor data-ready poll (ms)
    pub distance_timeout_ms: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,
    /// Local time offset from UTC used by the host clock (seconds)
    pub utc_offset_secs: i32,

    /// Firmware release stamped into the System Status record at boot
    pub firmware_release: f32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // Reporting
            wake_boundary_secs: 3600, // hourly

            // Stay awake
            stay_awake_long_ms: 90_000,
            stay_awake_short_ms: 1_000,

            // Connectivity
            connect_timeout_secs: 600,
            ack_wait_ms: 45_000,
            connect_failures_before_power_cycle: 12, // ~2 h of failed attempts

            // Error handling
            error_cooldown_ms: 30_000,
            power_down_secs: 30,
            reset_alert_threshold: 3,

            // Measurement
            distance_timeout_ms: 10_000,

            // Timing
            control_loop_interval_ms: 100,
            watchdog_timeout_ms: 60_000,
            utc_offset_secs: -5 * 3600, // EST

            firmware_release: 4.01,
        }
    }
}
