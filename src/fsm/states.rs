//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.  Handlers never touch hardware; they leave
//! requests in `ctx.commands` for the service to carry out after the tick.
//!
//! ```text
//!  INITIALIZATION ──[boot target]──▶ IDLE | CONNECTING
//!
//!  IDLE ──[window open, new hour]──▶ REPORTING ──[connected]──▶ AWAITING_ACK
//!   │ ▲                                  │                           │
//!   │ │                         [offline]│  [low battery]            │
//!   │ │                                  ▼       │                   │
//!   │ └──────[connected]──────────── CONNECTING  │   [acknowledged]  │
//!   │ ▲◀─────────────────────────────────────────┘◀──────────────────┘
//!   │ │
//!   │ └──[timer | sensor wake]──┐
//!   ▼                           │
//!  SLEEPING ──[user wake]──▶ CONNECTING
//!  (low power, stay-awake over)
//!
//!  Any state ──[alert ≠ 0]──▶ ERROR ──[cooldown, resolved]──▶ IDLE | CONNECTING
//!                                   └─[cooldown, fatal]──▶ reset | power-down
//! ```

use log::{debug, info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use crate::alerts::{AlertAction, AlertCode};
use crate::app::ports::{SleepRequest, WakeReason};
use crate::schedule;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Initialization
        StateDescriptor {
            id: StateId::Initialization,
            name: "Initialization",
            on_enter: None,
            on_exit: None,
            on_update: initialization_update,
        },
        // Index 1: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 2: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: Some(sleeping_enter),
            on_exit: None,
            on_update: sleeping_update,
        },
        // Index 3: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_update: connecting_update,
        },
        // Index 4: Reporting
        StateDescriptor {
            id: StateId::Reporting,
            name: "Reporting",
            on_enter: Some(reporting_enter),
            on_exit: None,
            on_update: reporting_update,
        },
        // Index 5: AwaitingAck
        StateDescriptor {
            id: StateId::AwaitingAck,
            name: "AwaitingAck",
            on_enter: Some(awaiting_ack_enter),
            on_exit: None,
            on_update: awaiting_ack_update,
        },
        // Index 6: Error
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INITIALIZATION state
// ═══════════════════════════════════════════════════════════════════════════

fn initialization_update(ctx: &mut FsmContext) -> Option<StateId> {
    Some(ctx.boot_target)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    debug!(
        "IDLE: low power {}, stay awake {} ms",
        ctx.status.low_power_mode(),
        ctx.stay_awake_ms
    );
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_alert() {
        return Some(StateId::Error);
    }

    // Report first so a due report is never delayed by a sleep.
    if ctx.inputs.time_valid
        && ctx.window_open()
        && schedule::report_due(ctx.inputs.local_hour, ctx.inputs.last_report_hour)
    {
        return Some(StateId::Reporting);
    }

    if ctx.status.low_power_mode() && ctx.stay_awake_elapsed() {
        return Some(StateId::Sleeping);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING state: request a stop, then act on what woke us
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_enter(ctx: &mut FsmContext) {
    ctx.stay_awake_for(ctx.config.stay_awake_short_ms);
}

fn sleeping_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_alert() {
        return Some(StateId::Error);
    }

    if let Some(wake) = ctx.inputs.wake.take() {
        return Some(on_wake(ctx, wake));
    }

    // Never stop in a tick that saw the sensor interrupt; try again next tick.
    if ctx.inputs.sensor_activity {
        return None;
    }

    let duration_secs = if ctx.inputs.time_valid {
        schedule::seconds_until_wake(ctx.inputs.unix_time, ctx.config.wake_boundary_secs)
    } else {
        ctx.config.wake_boundary_secs
    };
    ctx.commands.sleep = Some(SleepRequest {
        duration_secs,
        wake_on_user_switch: true,
        wake_on_sensor: true,
    });
    None
}

fn on_wake(ctx: &mut FsmContext, wake: WakeReason) -> StateId {
    info!("SLEEPING: woke on {:?}", wake);
    match wake {
        WakeReason::UserSwitch => {
            ctx.status.set_low_power_mode(false);
            ctx.status.set_operating_hours(0, 24);
            ctx.stay_awake_for(ctx.config.stay_awake_long_ms);
            StateId::Connecting
        }
        WakeReason::SensorActivity => {
            ctx.restart_stay_awake();
            StateId::Idle
        }
        WakeReason::Timer => {
            if ctx.window_open() {
                ctx.stay_awake_for(ctx.config.stay_awake_long_ms);
            } else {
                ctx.restart_stay_awake();
            }
            StateId::Idle
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING state
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut FsmContext) {
    ctx.connect_origin = ctx.previous_state;
    ctx.status.set_connection_duration(0);
    ctx.commands.connect = true;
    info!("CONNECTING: requested by {:?}", ctx.connect_origin);
}

fn connecting_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_alert() {
        return Some(StateId::Error);
    }

    let elapsed_secs = u16::try_from(ctx.ms_in_state() / 1000).unwrap_or(u16::MAX);

    if ctx.inputs.connected {
        ctx.status
            .set_last_connection(ctx.inputs.unix_time, elapsed_secs);
        ctx.restart_stay_awake();
        ctx.resolver.note_connected();
        info!("CONNECTING: connected in {} s", elapsed_secs);
        return Some(if ctx.connect_origin == StateId::Reporting {
            StateId::AwaitingAck
        } else {
            StateId::Idle
        });
    }

    if ctx.ms_in_state() >= u64::from(ctx.config.connect_timeout_secs) * 1000 {
        let code = if ctx.inputs.radio_ready {
            AlertCode::CloudConnectTimeout
        } else {
            AlertCode::RadioConnectFailed
        };
        warn!("CONNECTING: gave up after {} s", elapsed_secs);
        ctx.status.set_connection_duration(elapsed_secs);
        ctx.status.set_low_power_mode(true);
        ctx.status.raise_alert(code);
        return Some(StateId::Error);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  REPORTING state: one measurement, one queued record
// ═══════════════════════════════════════════════════════════════════════════

fn reporting_enter(ctx: &mut FsmContext) {
    debug!("REPORTING: hour {}", ctx.inputs.local_hour);
}

fn reporting_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_alert() {
        return Some(StateId::Error);
    }

    ctx.status.set_last_report_time(ctx.inputs.unix_time);
    if ctx.inputs.new_day {
        ctx.status.daily_cleanup();
    }
    ctx.commands.measure = true;
    ctx.commands.publish_report = true;

    if ctx.inputs.connected {
        Some(StateId::AwaitingAck)
    } else if ctx.status.low_battery_mode() && !ctx.inputs.user_switch_held {
        info!("REPORTING: low battery, holding report until next connection");
        Some(StateId::Idle)
    } else {
        Some(StateId::Connecting)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_ACK state
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_ack_enter(ctx: &mut FsmContext) {
    debug!("AWAITING_ACK: waiting up to {} ms", ctx.config.ack_wait_ms);
}

fn awaiting_ack_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.has_alert() {
        return Some(StateId::Error);
    }

    if !ctx.data_in_flight {
        info!("AWAITING_ACK: delivery confirmed");
        return Some(StateId::Idle);
    }

    if ctx.ms_in_state() > ctx.config.ack_wait_ms {
        ctx.status.raise_alert(AlertCode::NoAcknowledgement);
        return Some(StateId::Error);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR state: decide on entry, act after the cooldown
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    let code = ctx.status.alert_code();
    let action = ctx.resolver.decide(code);
    ctx.pending_action = Some(action);
    ctx.action_issued = false;
    warn!(
        "ERROR: alert {} -> {:?} in {} ms",
        code, action, ctx.config.error_cooldown_ms
    );
}

fn error_exit(ctx: &mut FsmContext) {
    ctx.pending_action = None;
    ctx.action_issued = false;
}

fn error_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.action_issued || ctx.ms_in_state() < ctx.config.error_cooldown_ms {
        return None;
    }

    match ctx.pending_action.unwrap_or(AlertAction::Reset) {
        AlertAction::Ignore => {
            ctx.status.clear_alert();
            Some(StateId::Idle)
        }
        AlertAction::Reconnect => {
            ctx.status.clear_alert();
            Some(StateId::Connecting)
        }
        AlertAction::Reset => {
            ctx.commands.reset = true;
            ctx.action_issued = true;
            None
        }
        AlertAction::PowerDown => {
            ctx.commands.power_down = Some(ctx.config.power_down_secs);
            ctx.action_issued = true;
            None
        }
    }
}
