//! Lifecycle tests: boot, reporting, sleep and alert handling driven
//! through `AppService` against the mock device.

use crate::mock_device::{BASE_UNIX, Harness, MockDevice, warm_system};

use trashpanda::alerts::AlertAction;
use trashpanda::app::commands::AppCommand;
use trashpanda::app::events::AppEvent;
use trashpanda::app::ports::{ResetReason, WakeReason};
use trashpanda::config::DeviceConfig;
use trashpanda::fsm::StateId;
use trashpanda::signals::Irq;
use trashpanda::status::{CurrentReading, SystemStatus};

/// Normal power mode, reported last hour, connected earlier today.
fn awake_system() -> SystemStatus {
    SystemStatus {
        low_power_mode: false,
        last_report_time: BASE_UNIX - 3600,
        ..warm_system()
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn fresh_device_reports_in_its_first_hour() {
    let mut h = Harness::new(MockDevice::new());

    // Blank storage on a new day: defaults, then the daily cleanup.
    assert_eq!(h.boot(), StateId::Idle);
    assert!(h.app.status().low_power_mode());
    let reinit = h
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::RecordReinitialized { .. }))
        .count();
    assert_eq!(reinit, 2);

    assert!(h.run_until(10, 100, |h| h.state() == StateId::AwaitingAck));
    assert_eq!(h.dev.enqueued.len(), 1);
    assert_eq!(h.dev.enqueued[0].height_inches, 20);
    assert!(h.app.data_in_flight());
    assert!(h.app.status().system().last_connection_time > 0);

    h.ack.on_response(200);
    h.tick(100);
    assert_eq!(h.state(), StateId::Idle);
    assert!(!h.app.data_in_flight());
    assert_eq!(
        h.app.status().system().last_hook_response_time,
        h.dev.unix_base.unwrap() + (h.dev.now_ms / 1000) as i64
    );
}

#[test]
fn warm_boot_in_low_power_stays_idle() {
    let mut h = Harness::new(MockDevice::warm(warm_system()));
    assert_eq!(h.boot(), StateId::Idle);
    assert_eq!(h.dev.measure_calls, 1);
    assert_eq!(h.dev.connect_calls, 0);
    assert_eq!(
        h.app.status().system().firmware_release,
        h.app.config().firmware_release
    );
}

#[test]
fn warm_boot_in_normal_power_connects() {
    let mut h = Harness::new(MockDevice::warm(awake_system()));
    assert_eq!(h.boot(), StateId::Connecting);
    assert_eq!(h.dev.connect_calls, 1);
}

#[test]
fn unsynced_clock_connects_at_boot() {
    let mut dev = MockDevice::warm(warm_system());
    dev.unix_base = None;
    let mut h = Harness::new(dev);
    assert_eq!(h.boot(), StateId::Connecting);
}

#[test]
fn switch_held_at_boot_restores_operating_hours() {
    let mut dev = MockDevice::warm(SystemStatus {
        open_hour: 6,
        close_hour: 20,
        ..warm_system()
    });
    dev.switch_held = true;
    let mut h = Harness::new(dev);

    assert_eq!(h.boot(), StateId::Connecting);
    let system = h.app.status().system();
    assert_eq!((system.open_hour, system.close_hour), (0, 24));
    assert_eq!(system.firmware_release, h.app.config().firmware_release);
}

#[test]
fn excessive_resets_alert_once_then_restart() {
    let mut dev = MockDevice::warm(SystemStatus {
        reset_count: 3,
        ..warm_system()
    });
    dev.reset_reason = ResetReason::Pin;
    let mut h = Harness::new(dev);

    h.boot();
    assert_eq!(h.app.status().reset_count(), 4);
    assert_eq!(h.alert(), 13);

    h.tick(100);
    assert_eq!(h.state(), StateId::Error);
    assert!(h.run_until(40, 1000, |h| h.dev.resets == 1));
    assert_eq!(h.dev.stored::<CurrentReading>().unwrap().alert_code, 13);

    // The next boot clears the code and a fifth reset stays quiet.
    h.reboot(ResetReason::Pin);
    assert_eq!(h.app.status().reset_count(), 5);
    assert_eq!(h.alert(), 0);
    assert_eq!(h.sink.alerts_raised(), vec![13]);
}

#[test]
fn power_on_reset_is_not_counted() {
    let mut h = Harness::new(MockDevice::warm(SystemStatus {
        reset_count: 3,
        ..warm_system()
    }));
    h.boot();
    assert_eq!(h.app.status().reset_count(), 3);
    assert_eq!(h.alert(), 0);
}

#[test]
fn new_day_boot_clears_yesterdays_counters() {
    let mut dev = MockDevice::warm(SystemStatus {
        reset_count: 3,
        low_power_mode: false,
        last_connection_time: BASE_UNIX - 86_400,
        ..warm_system()
    });
    dev.reset_reason = ResetReason::Pin;
    let mut h = Harness::new(dev);

    assert_eq!(h.boot(), StateId::Idle);
    let status = h.app.status();
    assert_eq!(status.reset_count(), 0);
    assert_eq!(status.alert_code(), 0);
    assert!(status.low_power_mode());
    assert!(!status.verbose_mode());
}

#[test]
fn sensor_init_failure_raises_12_and_restarts() {
    let mut dev = MockDevice::warm(warm_system());
    dev.sensors_fail = true;
    let mut h = Harness::new(dev);

    h.boot();
    assert_eq!(h.alert(), 12);
    assert!(h.run_until(40, 1000, |h| h.dev.resets == 1));
    assert!(h.dev.power_downs.is_empty());
}

// ── Sleep and wake ────────────────────────────────────────────

#[test]
fn user_wake_leaves_low_power_and_connects() {
    let mut dev = MockDevice::warm(warm_system());
    dev.wakes.push_back(WakeReason::UserSwitch);
    let mut h = Harness::new(dev);
    h.boot();

    // Stay-awake window first, then one stop.
    h.run(80, 1000);
    assert_eq!(h.state(), StateId::Idle);
    assert!(h.run_until(200, 1000, |h| h.state() == StateId::Connecting));

    assert_eq!(h.dev.sleeps.len(), 1);
    let call = h.dev.sleeps[0];
    assert_eq!(call.wake, WakeReason::UserSwitch);
    assert!(call.request.wake_on_user_switch && call.request.wake_on_sensor);
    let at = call.at_unix.unwrap();
    assert_eq!((at + i64::from(call.request.duration_secs)) % 3600, 1);

    assert_eq!(h.dev.pauses, 1);
    assert!(!h.dev.watchdog_paused);
    assert!(!h.app.status().low_power_mode());
    let window = h.app.status().operating_window();
    assert_eq!((window.open_hour, window.close_hour), (0, 24));
    assert_eq!(h.dev.connect_calls, 1);
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Woke {
            reason: WakeReason::UserSwitch,
            ..
        }
    )));
}

#[test]
fn sensor_activity_defers_the_stop() {
    let mut h = Harness::new(MockDevice::warm(warm_system()));
    h.boot();
    assert!(h.run_until(200, 1000, |h| h.state() == StateId::Sleeping));

    h.irqs.raise(Irq::SensorActivity);
    h.tick(100);
    assert_eq!(h.state(), StateId::Sleeping);
    assert!(h.dev.sleeps.is_empty());

    // Timer wake on the next attempt, back to Idle.
    h.tick(100);
    assert_eq!(h.dev.sleeps.len(), 1);
    h.tick(100);
    assert_eq!(h.state(), StateId::Idle);
}

#[test]
fn normal_power_never_sleeps() {
    let mut h = Harness::new(MockDevice::warm(SystemStatus {
        low_power_mode: false,
        ..warm_system()
    }));
    h.boot();
    h.run(300, 1000);
    assert!(h.dev.sleeps.is_empty());
    assert_eq!(h.state(), StateId::Idle);
}

#[test]
fn refused_disconnect_raises_15_instead_of_sleeping() {
    let mut dev = MockDevice::warm(SystemStatus {
        low_power_mode: false,
        ..warm_system()
    });
    dev.refuse_disconnect = true;
    let mut h = Harness::new(dev);

    assert_eq!(h.boot(), StateId::Connecting);
    h.tick(100);
    assert_eq!(h.state(), StateId::Idle);
    h.app
        .handle_command(AppCommand::SetLowPowerMode(true))
        .unwrap();

    assert!(h.run_until(200, 1000, |h| h.alert() == 15));
    assert!(h.dev.sleeps.is_empty());
    assert_eq!(h.dev.disconnect_calls, 1);
    assert!(h.run_until(40, 1000, |h| h.dev.resets == 1));
}

// ── Connectivity ──────────────────────────────────────────────

#[test]
fn cloud_unreachable_times_out_with_30_then_reconnects() {
    let mut dev = MockDevice::warm(awake_system());
    dev.connected_after_ms = None;
    let mut h = Harness::new(dev);

    assert_eq!(h.boot(), StateId::Connecting);
    assert!(h.run_until(100, 10_000, |h| h.state() == StateId::Error));
    assert_eq!(h.alert(), 30);
    assert!(h.app.status().low_power_mode());
    assert_eq!(h.app.status().system().last_connection_duration_sec, 600);
    assert_eq!(h.app.context().resolver.consecutive_connect_failures(), 1);

    assert!(h.run_until(10, 10_000, |h| h.state() == StateId::Connecting));
    assert_eq!(h.alert(), 0);
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::AlertResolved {
            code: 30,
            action: AlertAction::Reconnect
        }
    )));
}

#[test]
fn no_radio_times_out_with_31() {
    let mut h = Harness::new(MockDevice::warm(awake_system()).offline());
    h.boot();
    assert!(h.run_until(100, 10_000, |h| h.state() == StateId::Error));
    assert_eq!(h.alert(), 31);
}

#[test]
fn repeated_connect_failures_escalate_to_power_down() {
    let config = DeviceConfig {
        connect_timeout_secs: 10,
        error_cooldown_ms: 1_000,
        connect_failures_before_power_cycle: 3,
        ..DeviceConfig::default()
    };
    let mut h = Harness::with_config(MockDevice::warm(awake_system()).offline(), config);
    h.boot();

    assert!(h.run_until(200, 1000, |h| !h.dev.power_downs.is_empty()));
    h.run(5, 1000);
    assert_eq!(h.dev.power_downs, vec![30]);
    assert_eq!(h.dev.resets, 0);
    assert_eq!(h.sink.alerts_raised(), vec![31, 31, 31]);
    assert!(h.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ShuttingDown {
            power_down_secs: Some(30)
        }
    )));
}

#[test]
fn successful_connection_forgets_earlier_failures() {
    let config = DeviceConfig {
        connect_timeout_secs: 10,
        error_cooldown_ms: 1_000,
        ..DeviceConfig::default()
    };
    let mut dev = MockDevice::warm(awake_system());
    dev.connected_after_ms = Some(15_000);
    let mut h = Harness::with_config(dev, config);
    h.boot();

    assert!(h.run_until(30, 1000, |h| h.alert() == 30));
    assert!(h.run_until(30, 1000, |h| h.state() == StateId::Idle));
    assert_eq!(h.app.context().resolver.consecutive_connect_failures(), 0);
    assert!(h.app.status().system().last_connection_time > 0);
}

// ── Reporting ─────────────────────────────────────────────────

#[test]
fn acknowledged_report_completes_the_cycle() {
    let mut h = Harness::new(MockDevice::warm(awake_system()));
    h.boot();
    assert!(h.run_until(10, 100, |h| h.state() == StateId::AwaitingAck));

    let record = h.dev.enqueued[0].clone();
    assert_eq!(record.percent_full, 62.0);
    assert_eq!(record.lid_orientation, 5);
    assert_eq!(record.alert_code, 0);
    assert!(record.timestamp >= BASE_UNIX);
    assert_eq!(h.app.status().system().last_report_time, record.timestamp);

    // A rejection keeps the report in flight.
    h.ack.on_response(500);
    h.tick(100);
    assert_eq!(h.state(), StateId::AwaitingAck);
    assert!(h.app.data_in_flight());

    h.ack.on_response(201);
    h.tick(100);
    assert_eq!(h.state(), StateId::Idle);
    assert!(!h.app.data_in_flight());

    // One report per hour.
    h.run(20, 1000);
    assert_eq!(h.dev.enqueued.len(), 1);
}

#[test]
fn missing_acknowledgement_raises_40_and_reconnects() {
    let mut h = Harness::new(MockDevice::warm(awake_system()));
    h.boot();
    assert!(h.run_until(10, 100, |h| h.state() == StateId::AwaitingAck));

    assert!(h.run_until(60, 1000, |h| h.state() == StateId::Error));
    assert_eq!(h.alert(), 40);
    assert!(h.run_until(40, 1000, |h| h.state() == StateId::Idle));
    assert_eq!(h.alert(), 0);
    assert_eq!(h.dev.resets, 0);
}

#[test]
fn rejected_report_ends_in_the_ack_timeout() {
    let mut h = Harness::new(MockDevice::warm(awake_system()));
    h.boot();
    assert!(h.run_until(10, 100, |h| h.state() == StateId::AwaitingAck));

    h.ack.on_response(400);
    h.tick(100);
    assert_eq!(h.state(), StateId::AwaitingAck);
    assert_eq!(h.alert(), 0);

    assert!(h.run_until(60, 1000, |h| h.state() == StateId::Error));
    assert_eq!(h.alert(), 40);
}

#[test]
fn low_battery_holds_the_report_until_next_connection() {
    let mut h = Harness::new(
        MockDevice::warm(SystemStatus {
            low_battery_mode: true,
            last_report_time: BASE_UNIX - 3600,
            ..warm_system()
        })
        .offline(),
    );
    assert_eq!(h.boot(), StateId::Idle);

    h.run(2, 100);
    assert_eq!(h.state(), StateId::Idle);
    assert_eq!(h.dev.enqueued.len(), 1);
    assert!(h.app.data_in_flight());
    assert_eq!(h.dev.connect_calls, 0);
}

#[test]
fn held_switch_overrides_low_battery() {
    let mut h = Harness::new(MockDevice::warm(SystemStatus {
        low_battery_mode: true,
        last_report_time: BASE_UNIX - 3600,
        ..warm_system()
    }));
    h.boot();
    h.dev.switch_held = true;

    h.run(2, 100);
    assert_eq!(h.state(), StateId::Connecting);
    assert_eq!(h.dev.connect_calls, 1);
}

#[test]
fn closed_window_suppresses_reports() {
    let mut h = Harness::new(MockDevice::warm(awake_system()));
    h.boot();
    h.app
        .handle_command(AppCommand::SetOperatingHours { open: 6, close: 12 })
        .unwrap();

    h.run(5, 100);
    assert_eq!(h.state(), StateId::Idle);
    assert!(h.dev.enqueued.is_empty());

    h.app
        .handle_command(AppCommand::SetOperatingHours { open: 6, close: 20 })
        .unwrap();
    assert!(h.run_until(5, 100, |h| h.dev.enqueued.len() == 1));
}

#[test]
fn full_queue_leaves_nothing_in_flight() {
    let mut dev = MockDevice::warm(awake_system());
    dev.queue_full = true;
    let mut h = Harness::new(dev);
    h.boot();
    h.run(4, 100);
    assert!(h.dev.enqueued.is_empty());
    assert!(!h.app.data_in_flight());
}

// ── Alert precedence ──────────────────────────────────────────

#[test]
fn out_of_memory_preempts_a_due_report() {
    let mut h = Harness::new(MockDevice::warm(SystemStatus {
        last_report_time: BASE_UNIX - 3600,
        ..warm_system()
    }));
    assert_eq!(h.boot(), StateId::Idle);

    h.irqs.raise(Irq::OutOfMemory);
    h.tick(100);
    assert_eq!(h.state(), StateId::Error);
    assert_eq!(h.alert(), 14);
    assert!(h.dev.enqueued.is_empty());
    assert_eq!(h.dev.measure_calls, 1);

    assert!(h.run_until(40, 1000, |h| h.dev.resets == 1));
    h.run(5, 1000);
    assert_eq!(h.dev.resets, 1);
}

#[test]
fn error_waits_out_the_cooldown() {
    let mut h = Harness::new(MockDevice::warm(warm_system()));
    h.boot();
    h.irqs.raise(Irq::OutOfMemory);
    h.tick(100);

    h.run(29, 1000);
    assert_eq!(h.dev.resets, 0);
    h.run(2, 1000);
    assert_eq!(h.dev.resets, 1);
}
