//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to the cloud
//! as a diagnostic publish, and so on.

use crate::alerts::AlertAction;
use crate::app::ports::WakeReason;
use crate::fsm::StateId;
use crate::storage::Corrupt;
use crate::telemetry::TelemetryRecord;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service has started (carries the boot target).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A persisted record failed validation and was reset to defaults.
    RecordReinitialized {
        record: &'static str,
        reason: Corrupt,
    },

    /// A new non-zero alert code was stored.
    AlertRaised(u8),

    /// The `Error` state executed a recoverable action and cleared the code.
    AlertResolved { code: u8, action: AlertAction },

    /// An hourly report was handed to the publish queue.
    ReportQueued(TelemetryRecord),

    /// The device returned from a low-power stop.
    Woke { slept_secs: u32, reason: WakeReason },

    /// A restart or power cut is about to happen.
    ShuttingDown { power_down_secs: Option<u32> },
}
