//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It contains the per-tick inputs gathered by the service,
//! the side-effect requests handlers leave for the service to carry out,
//! the persisted status records, configuration and lifecycle timers.
//! Think of it as the "blackboard" in a blackboard architecture.

use crate::alerts::{AlertAction, AlertResolver};
use crate::app::ports::{SleepRequest, WakeReason};
use crate::config::DeviceConfig;
use crate::status::StatusStore;

use super::StateId;

// ---------------------------------------------------------------------------
// Tick inputs (read-only to state handlers; written by the service)
// ---------------------------------------------------------------------------

/// A point-in-time view of the outside world for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInputs {
    /// Monotonic milliseconds since boot.
    pub now_ms: u64,
    /// Wall-clock Unix seconds; 0 while the clock is unset.
    pub unix_time: i64,
    pub time_valid: bool,
    /// Local hour of day (0–23).
    pub local_hour: u8,
    /// Local hour of the last report, `None` if there has been none.
    pub last_report_hour: Option<u8>,
    /// The local calendar day changed since the last connection.
    pub new_day: bool,

    pub connected: bool,
    pub radio_ready: bool,

    /// User switch currently held down.
    pub user_switch_held: bool,
    /// Sensor interrupt observed since the last tick.
    pub sensor_activity: bool,

    /// What ended the last sleep; consumed by the `Sleeping` handler.
    pub wake: Option<WakeReason>,
}

// ---------------------------------------------------------------------------
// Side-effect requests (written by state handlers; consumed by the service)
// ---------------------------------------------------------------------------

/// Work handlers ask the service to perform after the FSM tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCommands {
    /// Start a connection attempt.
    pub connect: bool,
    /// Take a measurement pass.
    pub measure: bool,
    /// Enqueue a telemetry report (after `measure`).
    pub publish_report: bool,
    /// Release the network and stop.
    pub sleep: Option<SleepRequest>,
    /// Flush and restart.
    pub reset: bool,
    /// Flush and cut power for this many seconds.
    pub power_down: Option<u32>,
}

impl DeviceCommands {
    pub fn none() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// `now_ms` at the moment the current state was entered.
    pub state_entered_ms: u64,
    /// The state we came from on the last transition.
    pub previous_state: StateId,

    // -- Per-tick I/O --
    pub inputs: TickInputs,
    pub commands: DeviceCommands,

    // -- Persistent state --
    pub status: StatusStore,

    // -- Configuration --
    pub config: DeviceConfig,

    // -- Lifecycle timers --
    /// Start of the current stay-awake window.
    pub stay_awake_since_ms: u64,
    /// Length of the current stay-awake window.
    pub stay_awake_ms: u64,
    /// State that requested the current connection attempt.
    pub connect_origin: StateId,
    /// A report has been queued and not yet acknowledged.
    pub data_in_flight: bool,
    /// Where `Initialization` hands over to.
    pub boot_target: StateId,

    // -- Alert handling --
    pub resolver: AlertResolver,
    /// Action decided on entering `Error`.
    pub pending_action: Option<AlertAction>,
    /// The pending action has been handed to the service.
    pub action_issued: bool,
}

impl FsmContext {
    /// Create a new context with the given configuration and loaded status.
    pub fn new(config: DeviceConfig, status: StatusStore) -> Self {
        let resolver = AlertResolver::new(config.connect_failures_before_power_cycle);
        Self {
            state_entered_ms: 0,
            previous_state: StateId::Initialization,
            inputs: TickInputs::default(),
            commands: DeviceCommands::none(),
            status,
            stay_awake_since_ms: 0,
            stay_awake_ms: config.stay_awake_long_ms,
            connect_origin: StateId::Initialization,
            data_in_flight: false,
            boot_target: StateId::Idle,
            resolver,
            pending_action: None,
            action_issued: false,
            config,
        }
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.inputs.now_ms.saturating_sub(self.state_entered_ms)
    }

    /// Returns `true` if an alert is pending.
    pub fn has_alert(&self) -> bool {
        self.status.has_alert()
    }

    /// Restart the stay-awake window with `duration_ms`.
    pub fn stay_awake_for(&mut self, duration_ms: u64) {
        self.stay_awake_since_ms = self.inputs.now_ms;
        self.stay_awake_ms = duration_ms;
    }

    /// Restart the stay-awake window keeping its current length.
    pub fn restart_stay_awake(&mut self) {
        self.stay_awake_since_ms = self.inputs.now_ms;
    }

    pub fn stay_awake_elapsed(&self) -> bool {
        self.inputs.now_ms.saturating_sub(self.stay_awake_since_ms) > self.stay_awake_ms
    }

    /// Operating window open at the current local hour.
    pub fn window_open(&self) -> bool {
        self.status.operating_window().is_open(self.inputs.local_hour)
    }
}
