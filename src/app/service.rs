//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM and its shared context.  It sequences boot,
//! gathers per-tick inputs, runs the alert check ahead of the FSM, and
//! carries out whatever the state handlers asked for.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  InterruptFlags ─┐
//!  AckSignal ──────┤    ┌────────────────────────┐
//!                  ├──▶ │       AppService       │ ──▶ EventSink
//!  DevicePorts ◀───┴──▶ │  alerts · FSM · status │
//!                       └────────────────────────┘
//! ```
//!
//! One tick:
//!
//! 1. refresh inputs (clock, local time, radio, switch, drained IRQs)
//! 2. out-of-memory flag → alert 14; drain the delivery acknowledgement
//! 3. alert ≠ 0 → force `Error`
//! 4. FSM tick
//! 5. execute requested commands (connect, measure, publish, sleep, reset)
//! 6. feed watchdog, flush records, service the publish queue

use log::{error, info, warn};

use crate::alerts::AlertCode;
use crate::config::DeviceConfig;
use crate::error::CommandError;
use crate::fsm::context::{DeviceCommands, FsmContext, TickInputs};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::signals::{InterruptFlags, PendingIrqs};
use crate::status::{CurrentReading, StatusStore, SystemStatus};
use crate::storage::{LoadOutcome, RecordSchema};
use crate::telemetry::{self, AckSignal, TelemetryRecord};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{DevicePorts, EventSink, SleepRequest, WakeReason};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    /// Wake reason from the last sleep, handed to the FSM next tick.
    pending_wake: Option<WakeReason>,
    /// Alert code at the end of the previous tick.
    last_alert: u8,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`boot`](Self::boot) next.
    pub fn new(config: DeviceConfig) -> Self {
        let ctx = FsmContext::new(config, StatusStore::new());
        let fsm = Fsm::new(build_state_table(), StateId::Initialization);
        Self {
            fsm,
            ctx,
            pending_wake: None,
            last_alert: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore state, run the start-up checks and enter the first
    /// operating state.  Returns that state.
    pub fn boot(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) -> StateId {
        self.refresh_inputs(hw, PendingIrqs::default());

        let report = self.ctx.status.load(hw);
        for (record, outcome) in [
            (SystemStatus::NAME, report.system),
            (CurrentReading::NAME, report.reading),
        ] {
            if let LoadOutcome::Initialized(reason) = outcome {
                sink.emit(&AppEvent::RecordReinitialized { record, reason });
            }
        }
        self.ctx
            .status
            .set_firmware_release(self.ctx.config.firmware_release);
        self.ctx.status.clear_alert();

        let reason = hw.reset_reason();
        if reason.counts_toward_reset_alert() {
            let count = self.ctx.status.increment_reset_count();
            info!("Reset by {:?}, {} today", reason, count);
            if count == self.ctx.config.reset_alert_threshold.saturating_add(1) {
                self.ctx.status.raise_alert(AlertCode::ExcessiveResets);
            }
        }

        if let Err(e) = hw.begin_sensors() {
            error!("Sensor initialisation failed: {}", e);
            self.ctx.status.raise_alert(AlertCode::InitFailure);
        }
        self.measure(hw);

        let mut target = None;
        if hw.user_switch_held() {
            info!("User switch held at boot, restoring defaults");
            self.ctx.status.restore_system_defaults();
            target = Some(StateId::Connecting);
        }

        if !self.ctx.inputs.time_valid {
            info!("Wall clock not set, connecting to sync");
            target = Some(StateId::Connecting);
        } else if hw.is_new_calendar_day(self.ctx.status.system().last_connection_time) {
            self.ctx.status.daily_cleanup();
        }

        let target = target.unwrap_or(if self.ctx.status.low_power_mode() {
            StateId::Idle
        } else {
            StateId::Connecting
        });

        self.ctx.boot_target = target;
        self.ctx.stay_awake_for(self.ctx.config.stay_awake_long_ms);
        self.fsm.start(&mut self.ctx);
        self.fsm.force_transition(target, &mut self.ctx);
        sink.emit(&AppEvent::Started(target));
        info!(
            "Boot complete in {} mode, entering {:?}",
            if self.ctx.status.low_power_mode() {
                "low power"
            } else {
                "normal"
            },
            target
        );

        self.execute_commands(hw, sink);
        self.report_alert_change(sink);
        target
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies every device port through
    /// [`DevicePorts`]; this avoids double mutable borrows while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut impl DevicePorts,
        irqs: &InterruptFlags,
        ack: &AckSignal,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let prev_state = self.fsm.current_state();

        // 1. Inputs
        let pending = irqs.take_all();
        self.refresh_inputs(hw, pending);
        self.ctx.commands = DeviceCommands::none();

        // 2. Out-of-band signals
        if pending.out_of_memory {
            self.ctx.status.raise_alert(AlertCode::OutOfMemory);
        }
        if let Some(status) = ack.take() {
            self.on_ack(status);
        }

        // 3. Alerts take precedence over every state's own logic
        if self.ctx.has_alert() && self.fsm.current_state() != StateId::Error {
            warn!("Alert {} pending, entering Error", self.ctx.status.alert_code());
            self.report_alert_change(sink);
            self.fsm.force_transition(StateId::Error, &mut self.ctx);
        }

        // 4. FSM tick (pure state logic)
        let code_before = self.ctx.status.alert_code();
        let action_before = self.ctx.pending_action;
        self.fsm.tick(&mut self.ctx);
        if code_before != 0 && !self.ctx.has_alert() {
            if let Some(action) = action_before {
                sink.emit(&AppEvent::AlertResolved {
                    code: code_before,
                    action,
                });
            }
        }

        // 5. Side effects requested by the handlers
        self.execute_commands(hw, sink);

        // 6. Housekeeping
        hw.feed();
        let now_ms = hw.now_ms();
        if let Err(e) = self.ctx.status.flush(hw, now_ms, false) {
            warn!("Status flush failed: {}", e);
        }
        hw.service();
        self.report_alert_change(sink);

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external settings command.
    pub fn handle_command(&mut self, cmd: AppCommand) -> Result<(), CommandError> {
        cmd.validate()?;
        match cmd {
            AppCommand::SetLowPowerMode(on) => {
                self.ctx.status.set_low_power_mode(on);
                if !on {
                    self.ctx.stay_awake_for(self.ctx.config.stay_awake_long_ms);
                }
            }
            AppCommand::SetVerboseMode(on) => self.ctx.status.set_verbose_mode(on),
            AppCommand::SetOperatingHours { open, close } => {
                self.ctx.status.set_operating_hours(open, close);
            }
            AppCommand::RestoreDefaults => self.ctx.status.restore_system_defaults(),
        }
        info!("Command applied: {:?}", cmd);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total control ticks executed since boot.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Both persisted records.
    pub fn status(&self) -> &StatusStore {
        &self.ctx.status
    }

    /// The full FSM context, for diagnostics and tests.
    pub fn context(&self) -> &FsmContext {
        &self.ctx
    }

    /// A report is queued and not yet acknowledged.
    pub fn data_in_flight(&self) -> bool {
        self.ctx.data_in_flight
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.ctx.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn refresh_inputs(&mut self, hw: &mut impl DevicePorts, irqs: PendingIrqs) {
        let unix = hw.unix_time();
        let system = self.ctx.status.system();
        let last_report = system.last_report_time;
        let last_connection = system.last_connection_time;

        self.ctx.inputs = TickInputs {
            now_ms: hw.now_ms(),
            unix_time: unix.unwrap_or(0),
            time_valid: unix.is_some(),
            local_hour: hw.current_local_hour(),
            last_report_hour: (last_report > 0).then(|| hw.local_hour_of(last_report)),
            new_day: unix.is_some() && hw.is_new_calendar_day(last_connection),
            connected: hw.is_connected(),
            radio_ready: hw.is_radio_ready(),
            user_switch_held: irqs.user_switch || hw.user_switch_held(),
            sensor_activity: irqs.sensor_activity,
            wake: self.pending_wake.take(),
        };
    }

    fn on_ack(&mut self, status: u16) {
        if telemetry::is_success(status) {
            info!("Report acknowledged ({})", status);
            self.ctx.data_in_flight = false;
            self.ctx
                .status
                .set_last_hook_response_time(self.ctx.inputs.unix_time);
        } else {
            // Not a failure by itself: the report stays in flight and the
            // ack timeout raises the alert.
            warn!("Report rejected ({})", status);
        }
    }

    /// Carry out everything the handlers requested this tick, in order.
    fn execute_commands(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let cmds = self.ctx.commands;

        if cmds.connect {
            hw.connect();
        }
        if cmds.measure {
            self.measure(hw);
        }
        if cmds.publish_report {
            self.publish(hw, sink);
        }
        if let Some(request) = cmds.sleep {
            self.sleep(hw, &request, sink);
        }
        if cmds.reset || cmds.power_down.is_some() {
            self.shut_down(hw, cmds.power_down, sink);
        }
    }

    fn measure(&mut self, hw: &mut impl DevicePorts) {
        let previous = self.ctx.status.reading().as_measurement();
        let calibration = self.ctx.status.calibration();
        let m = hw.take_measurements(&previous, calibration);
        self.ctx
            .status
            .record_measurement(&m, self.ctx.inputs.unix_time);
    }

    fn publish(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let record = TelemetryRecord::from_status(
            self.ctx.status.system(),
            self.ctx.status.reading(),
            self.ctx.inputs.unix_time,
        );
        match hw.enqueue(&record) {
            Ok(()) => {
                self.ctx.data_in_flight = true;
                sink.emit(&AppEvent::ReportQueued(record));
            }
            Err(e) => warn!("Report not queued: {}", e),
        }
    }

    /// Release the network, then stop with the watchdog starved.
    fn sleep(&mut self, hw: &mut impl DevicePorts, request: &SleepRequest, sink: &mut impl EventSink) {
        if (hw.is_connected() || hw.is_radio_ready()) && !hw.disconnect() {
            self.ctx.status.raise_alert(AlertCode::DisconnectFailed);
            return;
        }

        info!("Sleeping for up to {} s", request.duration_secs);
        hw.pause();
        let reason = hw.sleep(request);
        hw.resume();

        self.pending_wake = Some(reason);
        sink.emit(&AppEvent::Woke {
            slept_secs: request.duration_secs,
            reason,
        });
    }

    fn shut_down(
        &mut self,
        hw: &mut impl DevicePorts,
        power_down_secs: Option<u32>,
        sink: &mut impl EventSink,
    ) {
        let now_ms = hw.now_ms();
        if let Err(e) = self.ctx.status.flush(hw, now_ms, true) {
            error!("Final status flush failed: {}", e);
        }
        sink.emit(&AppEvent::ShuttingDown { power_down_secs });
        match power_down_secs {
            Some(secs) => hw.power_down(secs),
            None => hw.reset(),
        }
    }

    fn report_alert_change(&mut self, sink: &mut impl EventSink) {
        let code = self.ctx.status.alert_code();
        if code != self.last_alert && code != 0 {
            sink.emit(&AppEvent::AlertRaised(code));
        }
        self.last_alert = code;
    }
}
