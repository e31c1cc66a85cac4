//! Outbound telemetry report and its delivery acknowledgement.
//!
//! Reports are handed to the publish queue behind
//! [`TelemetryPort`](crate::app::ports::TelemetryPort).  The queue delivers
//! them whenever a connection is up and reports the HTTP-like status of the
//! webhook response through [`AckSignal`], which may be signalled from any
//! task or callback context.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use serde::Serialize;

use crate::error::TelemetryError;
use crate::status::{CurrentReading, SystemStatus};

/// Event name the cloud webhook is subscribed to.
pub const REPORT_EVENT: &str = "fill-level";

/// One hourly report as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    #[serde(rename = "height")]
    pub height_inches: i32,
    #[serde(rename = "percentfull")]
    pub percent_full: f32,
    #[serde(rename = "emptied")]
    pub was_emptied: bool,
    #[serde(rename = "lid")]
    pub lid_orientation: u8,
    #[serde(rename = "battery")]
    pub battery_voltage: f32,
    #[serde(rename = "temp")]
    pub internal_temp_c: f32,
    #[serde(rename = "alerts")]
    pub alert_code: u8,
    #[serde(rename = "connecttime")]
    pub last_connection_duration_sec: u16,
    pub timestamp: i64,
}

impl TelemetryRecord {
    /// Build a report from the current status records.
    pub fn from_status(system: &SystemStatus, reading: &CurrentReading, timestamp: i64) -> Self {
        Self {
            height_inches: reading.height_inches,
            percent_full: reading.percent_full,
            was_emptied: reading.was_emptied,
            lid_orientation: reading.lid_orientation.raw(),
            battery_voltage: reading.battery_voltage,
            internal_temp_c: reading.internal_temp_c,
            alert_code: reading.alert_code,
            last_connection_duration_sec: system.last_connection_duration_sec,
            timestamp,
        }
    }

    /// JSON payload for the webhook.
    pub fn to_json(&self) -> Result<String, TelemetryError> {
        serde_json::to_string(self).map_err(|_| TelemetryError::Encode)
    }
}

/// `true` for the statuses the webhook uses to confirm receipt.
pub fn is_success(status: u16) -> bool {
    matches!(status, 200 | 201)
}

/// Latest webhook response status, written from the delivery callback.
pub struct AckSignal {
    inner: Signal<CriticalSectionRawMutex, u16>,
}

impl Default for AckSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AckSignal {
    pub const fn new() -> Self {
        Self {
            inner: Signal::new(),
        }
    }

    /// Record a response.  A newer status overwrites an unread one.
    pub fn on_response(&self, status: u16) {
        self.inner.signal(status);
    }

    /// Take the pending status, if any.
    pub fn take(&self) -> Option<u16> {
        self.inner.try_take()
    }
}

/// Acknowledgements from the board's publish queue.
pub static ACK: AckSignal = AckSignal::new();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::LidOrientation;

    #[test]
    fn json_uses_webhook_field_names() {
        let reading = CurrentReading {
            height_inches: 20,
            percent_full: 62.0,
            lid_orientation: LidOrientation::RightSideUp,
            alert_code: 40,
            ..CurrentReading::default()
        };
        let record = TelemetryRecord::from_status(&SystemStatus::default(), &reading, 1_700_000_000);
        let json = record.to_json().unwrap();
        assert!(json.contains("\"height\":20"));
        assert!(json.contains("\"lid\":5"));
        assert!(json.contains("\"alerts\":40"));
        assert!(json.contains("\"timestamp\":1700000000"));
    }

    #[test]
    fn only_200_and_201_acknowledge() {
        assert!(is_success(200));
        assert!(is_success(201));
        assert!(!is_success(204));
        assert!(!is_success(500));
    }

    #[test]
    fn ack_signal_is_one_shot() {
        let ack = AckSignal::new();
        assert_eq!(ack.take(), None);
        ack.on_response(500);
        ack.on_response(201);
        assert_eq!(ack.take(), Some(201));
        assert_eq!(ack.take(), None);
    }
}
