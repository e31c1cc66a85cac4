//! Alert codes and the escalation policy applied in the `Error` state.
//!
//! An alert code is the only channel into `Error`.  Codes are grouped by
//! decade: 1x device health, 2x firmware update, 3x connectivity, 4x cloud
//! acknowledgement.  Each code resolves to an [`AlertAction`]:
//!
//! ```text
//!   Ignore     ── clear the code, back to Idle
//!   Reconnect  ── clear the code, back to Connecting
//!   Reset      ── flush records, restart the MCU
//!   PowerDown  ── flush records, cut power for a while (modem power cycle)
//! ```
//!
//! The [`AlertResolver`] adds one escalation rule on top of the fixed
//! mapping: a long run of connectivity failures turns `Reconnect` into
//! `PowerDown`.

use core::fmt;

use log::{info, warn};

/// Highest raw value the Current Reading validator accepts.
pub const MAX_ALERT_CODE: u8 = 49;

/// Every alert the firmware can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertCode {
    // ── Device health ─────────────────────────────────────
    BatteryTemperature = 10,
    PmicReset = 11,
    InitFailure = 12,
    ExcessiveResets = 13,
    OutOfMemory = 14,
    DisconnectFailed = 15,

    // ── Firmware update ───────────────────────────────────
    UpdateCompleted = 20,
    UpdateTimedOut = 21,
    UpdateFailed = 22,
    UpdateAttemptLimit = 23,

    // ── Connectivity ──────────────────────────────────────
    CloudConnectTimeout = 30,
    RadioConnectFailed = 31,

    // ── Cloud acknowledgement ─────────────────────────────
    NoAcknowledgement = 40,
}

impl AlertCode {
    pub const fn raw(self) -> u8 {
        self as u8
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            10 => Self::BatteryTemperature,
            11 => Self::PmicReset,
            12 => Self::InitFailure,
            13 => Self::ExcessiveResets,
            14 => Self::OutOfMemory,
            15 => Self::DisconnectFailed,
            20 => Self::UpdateCompleted,
            21 => Self::UpdateTimedOut,
            22 => Self::UpdateFailed,
            23 => Self::UpdateAttemptLimit,
            30 => Self::CloudConnectTimeout,
            31 => Self::RadioConnectFailed,
            40 => Self::NoAcknowledgement,
            _ => return None,
        })
    }

    /// `true` for 30 and 31.
    pub fn is_connectivity(self) -> bool {
        matches!(self, Self::CloudConnectTimeout | Self::RadioConnectFailed)
    }
}

impl fmt::Display for AlertCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BatteryTemperature => "battery temperature outside charge range",
            Self::PmicReset => "PMIC reset required",
            Self::InitFailure => "initialisation error",
            Self::ExcessiveResets => "excessive resets",
            Self::OutOfMemory => "out of memory",
            Self::DisconnectFailed => "network release failed before sleep",
            Self::UpdateCompleted => "firmware update completed",
            Self::UpdateTimedOut => "firmware update timed out",
            Self::UpdateFailed => "firmware update failed",
            Self::UpdateAttemptLimit => "firmware update attempt limit",
            Self::CloudConnectTimeout => "cloud connect timed out",
            Self::RadioConnectFailed => "radio connect failed",
            Self::NoAcknowledgement => "no delivery acknowledgement",
        };
        write!(f, "{} ({})", text, self.raw())
    }
}

/// `true` if `raw` is "no alert" or a value in the defined range.
pub fn is_valid_raw(raw: u8) -> bool {
    raw <= MAX_ALERT_CODE
}

// ═══════════════════════════════════════════════════════════════
//  Actions
// ═══════════════════════════════════════════════════════════════

/// What the `Error` state does once its cooldown has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertAction {
    Ignore,
    Reconnect,
    Reset,
    PowerDown,
}

/// Fixed mapping from raw alert code to action.  Unknown codes restart.
pub fn resolve(raw: u8) -> AlertAction {
    if raw == 0 {
        return AlertAction::Ignore;
    }
    match AlertCode::from_raw(raw) {
        Some(AlertCode::BatteryTemperature | AlertCode::PmicReset) => AlertAction::PowerDown,
        Some(
            AlertCode::InitFailure
            | AlertCode::ExcessiveResets
            | AlertCode::OutOfMemory
            | AlertCode::DisconnectFailed,
        ) => AlertAction::Reset,
        Some(AlertCode::UpdateCompleted | AlertCode::UpdateAttemptLimit) => AlertAction::Ignore,
        Some(
            AlertCode::UpdateTimedOut
            | AlertCode::UpdateFailed
            | AlertCode::CloudConnectTimeout
            | AlertCode::RadioConnectFailed
            | AlertCode::NoAcknowledgement,
        ) => AlertAction::Reconnect,
        None => AlertAction::Reset,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Resolver
// ═══════════════════════════════════════════════════════════════

/// Stateful wrapper around [`resolve`] that escalates repeated
/// connectivity failures.
#[derive(Debug, Clone)]
pub struct AlertResolver {
    consecutive_connect_failures: u8,
    power_cycle_after: u8,
}

impl AlertResolver {
    pub fn new(power_cycle_after: u8) -> Self {
        Self {
            consecutive_connect_failures: 0,
            power_cycle_after: power_cycle_after.max(1),
        }
    }

    /// Decide the action for `raw`, counting connectivity failures.
    pub fn decide(&mut self, raw: u8) -> AlertAction {
        let base = resolve(raw);
        let connectivity = AlertCode::from_raw(raw).is_some_and(AlertCode::is_connectivity);
        if !connectivity {
            return base;
        }

        self.consecutive_connect_failures = self.consecutive_connect_failures.saturating_add(1);
        if self.consecutive_connect_failures >= self.power_cycle_after {
            warn!(
                "Alert {}: {} consecutive connect failures, escalating to power cycle",
                raw, self.consecutive_connect_failures
            );
            self.consecutive_connect_failures = 0;
            AlertAction::PowerDown
        } else {
            base
        }
    }

    /// A connection succeeded; forget earlier failures.
    pub fn note_connected(&mut self) {
        if self.consecutive_connect_failures > 0 {
            info!(
                "Connected after {} failed attempts",
                self.consecutive_connect_failures
            );
        }
        self.consecutive_connect_failures = 0;
    }

    pub fn consecutive_connect_failures(&self) -> u8 {
        self.consecutive_connect_failures
    }
}
