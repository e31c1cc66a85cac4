//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::RecordReinitialized { record, reason } => {
                warn!("STORE | {} reinitialised: {}", record, reason);
            }
            AppEvent::AlertRaised(code) => {
                warn!("ALERT | raised code={}", code);
            }
            AppEvent::AlertResolved { code, action } => {
                info!("ALERT | resolved code={} by {:?}", code, action);
            }
            AppEvent::ReportQueued(r) => {
                info!(
                    "REPORT | height={}in full={:.0}% emptied={} lid={} \
                     batt={:.2}V temp={:.1}\u{00b0}C alerts={} connect={}s",
                    r.height_inches,
                    r.percent_full,
                    r.was_emptied,
                    r.lid_orientation,
                    r.battery_voltage,
                    r.internal_temp_c,
                    r.alert_code,
                    r.last_connection_duration_sec,
                );
            }
            AppEvent::Woke { slept_secs, reason } => {
                info!("WAKE | {:?} (requested {}s)", reason, slept_secs);
            }
            AppEvent::ShuttingDown { power_down_secs } => match power_down_secs {
                Some(secs) => warn!("POWER | cutting power for {}s", secs),
                None => warn!("POWER | restarting"),
            },
        }
    }
}
