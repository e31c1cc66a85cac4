//! Record store tests through the full service: corruption recovery,
//! debounced writes and restart survival.

use crate::mock_device::{Harness, MockDevice, warm_system};

use trashpanda::app::commands::AppCommand;
use trashpanda::app::events::AppEvent;
use trashpanda::app::ports::ResetReason;
use trashpanda::config::DeviceConfig;
use trashpanda::error::StorageError;
use trashpanda::fsm::StateId;
use trashpanda::signals::Irq;
use trashpanda::status::{CurrentReading, SystemStatus};
use trashpanda::storage::{Corrupt, HEADER_LEN, RecordSchema};

fn reinitialized(h: &Harness) -> Vec<(&'static str, Corrupt)> {
    h.sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RecordReinitialized { record, reason } => Some((*record, *reason)),
            _ => None,
        })
        .collect()
}

/// Boot and tick until both records are on media.
fn settled(dev: MockDevice) -> Harness {
    let mut h = Harness::new(dev);
    h.boot();
    assert!(h.run_until(20, 100, |h| !h.app.status().is_dirty()));
    h
}

#[test]
fn records_occupy_separate_regions() {
    assert!(SystemStatus::OFFSET + SystemStatus::REGION_LEN <= CurrentReading::OFFSET);
    assert_ne!(SystemStatus::MAGIC, CurrentReading::MAGIC);

    let h = settled(MockDevice::new());
    assert!(h.dev.stored::<SystemStatus>().is_ok());
    assert!(h.dev.stored::<CurrentReading>().is_ok());
}

#[test]
fn corrupted_system_status_is_reset_and_rewritten() {
    let mut dev = MockDevice::warm(SystemStatus {
        open_hour: 6,
        close_hour: 20,
        ..warm_system()
    });
    dev.image[SystemStatus::OFFSET + HEADER_LEN + 2] ^= 0xFF;
    let mut h = Harness::new(dev);
    h.boot();

    assert_eq!(
        reinitialized(&h),
        vec![(SystemStatus::NAME, Corrupt::ChecksumMismatch)]
    );
    assert_eq!(h.app.status().system().open_hour, 0);
    // Defaults were written back during the load itself.
    assert_eq!(h.dev.stored::<SystemStatus>().unwrap().open_hour, 0);
}

#[test]
fn reading_outside_calibration_is_rejected() {
    let mut dev = MockDevice::warm(warm_system());
    dev.store(&CurrentReading {
        height_inches: 50,
        ..CurrentReading::default()
    });
    let mut h = Harness::new(dev);
    h.boot();

    let events = reinitialized(&h);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, CurrentReading::NAME);
    assert!(matches!(events[0].1, Corrupt::Invalid(_)));
    // The System Status was untouched.
    assert!(h.app.status().low_power_mode());
}

#[test]
fn stale_layout_version_is_discarded() {
    let mut dev = MockDevice::warm(warm_system());
    // Version field lives right after the magic.
    dev.image[SystemStatus::OFFSET + 4] = 1;
    let mut h = Harness::new(dev);
    h.boot();

    assert_eq!(
        reinitialized(&h),
        vec![(SystemStatus::NAME, Corrupt::VersionMismatch { found: 1 })]
    );
}

#[test]
fn settings_survive_a_restart() {
    let mut h = settled(MockDevice::warm(warm_system()));
    h.app
        .handle_command(AppCommand::SetOperatingHours { open: 6, close: 20 })
        .unwrap();
    h.app
        .handle_command(AppCommand::SetVerboseMode(false))
        .unwrap();
    assert!(h.run_until(10, 100, |h| !h.app.status().is_dirty()));

    h.reboot(ResetReason::PowerOn);
    assert!(reinitialized(&h).is_empty());
    let system = h.app.status().system();
    assert_eq!((system.open_hour, system.close_hour), (6, 20));
    assert!(!system.verbose_mode);
}

#[test]
fn writes_wait_for_a_quiet_period() {
    let mut h = settled(MockDevice::warm(warm_system()));
    let writes = h.dev.image_writes;

    // A burst of changes becomes one write once things settle.
    h.app
        .handle_command(AppCommand::SetVerboseMode(false))
        .unwrap();
    h.app
        .handle_command(AppCommand::SetOperatingHours { open: 7, close: 19 })
        .unwrap();
    h.tick(50);
    h.tick(40);
    assert_eq!(h.dev.image_writes, writes);
    assert_eq!(h.dev.stored::<SystemStatus>().unwrap().open_hour, 0);

    h.tick(70);
    assert_eq!(h.dev.image_writes, writes + 1);
    let stored = h.dev.stored::<SystemStatus>().unwrap();
    assert_eq!((stored.open_hour, stored.close_hour), (7, 19));
    assert!(!stored.verbose_mode);
}

#[test]
fn unchanged_values_do_not_dirty_the_record() {
    let mut h = settled(MockDevice::warm(warm_system()));
    h.app
        .handle_command(AppCommand::SetLowPowerMode(true))
        .unwrap();
    assert!(!h.app.status().is_dirty());
}

#[test]
fn restart_flushes_without_waiting() {
    let config = DeviceConfig {
        error_cooldown_ms: 0,
        ..DeviceConfig::default()
    };
    let mut h = Harness::with_config(MockDevice::warm(warm_system()), config);
    h.boot();
    assert!(h.run_until(20, 100, |h| !h.app.status().is_dirty()));

    // Alert, Error and restart all in one tick.
    h.irqs.raise(Irq::OutOfMemory);
    h.tick(10);
    assert_eq!(h.dev.resets, 1);
    assert_eq!(h.dev.stored::<CurrentReading>().unwrap().alert_code, 14);
}

#[test]
fn unreadable_storage_still_boots() {
    let mut dev = MockDevice::new();
    dev.image.truncate(32);
    let mut h = Harness::new(dev);

    assert_eq!(h.boot(), StateId::Idle);
    let events = reinitialized(&h);
    assert_eq!(events.len(), 2);
    assert!(
        events
            .iter()
            .all(|(_, why)| *why == Corrupt::Unreadable(StorageError::OutOfBounds))
    );

    // Writes keep failing, so the records stay dirty for the next try.
    h.run(5, 100);
    assert!(h.app.status().is_dirty());
    assert_eq!(h.dev.image_writes, 0);
}
