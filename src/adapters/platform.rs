//! Power and reset control.
//!
//! Implements [`PlatformPort`].
//!
//! - **`target_os = "espidf"`**: `esp_reset_reason()`, light sleep with timer
//!   and GPIO wake sources, `esp_restart()`, and a timed deep sleep as the
//!   power-down (the chip comes back through a full reset).
//! - **`not(target_os = "espidf")`**: a recorder for host runs.  Sleeps
//!   return immediately with a scripted wake reason.

use log::{info, warn};

use crate::app::ports::{PlatformPort, ResetReason, SleepRequest, WakeReason};
use crate::drivers::board;
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Map the IDF reset cause onto the reasons the lifecycle distinguishes.
/// Watchdog resets count as pin resets, as an external watchdog would.
#[cfg(target_os = "espidf")]
fn reset_reason_from_idf(reason: esp_reset_reason_t) -> ResetReason {
    match reason {
        esp_reset_reason_t_ESP_RST_POWERON => ResetReason::PowerOn,
        esp_reset_reason_t_ESP_RST_EXT
        | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_WDT => ResetReason::Pin,
        esp_reset_reason_t_ESP_RST_SW | esp_reset_reason_t_ESP_RST_PANIC => ResetReason::User,
        esp_reset_reason_t_ESP_RST_DEEPSLEEP => ResetReason::PowerDown,
        _ => ResetReason::Other,
    }
}

pub struct EspPlatform {
    reset_reason: ResetReason,
    #[cfg(not(target_os = "espidf"))]
    sim: SimPlatform,
}

/// What the host simulation records and replays.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimPlatform {
    /// Wake reasons handed out by successive sleeps; `Timer` once exhausted.
    pub wakes: Vec<WakeReason>,
    pub sleeps: Vec<SleepRequest>,
    pub resets: u32,
    pub power_downs: Vec<u32>,
}

impl EspPlatform {
    /// Latch the reset reason.  Call once at boot.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        // SAFETY: read-only query of the reset cause.
        let reason = reset_reason_from_idf(unsafe { esp_reset_reason() });
        info!("Platform: reset reason {:?}", reason);
        Self {
            reset_reason: reason,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(reset_reason: ResetReason) -> Self {
        Self {
            reset_reason,
            sim: SimPlatform::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimPlatform {
        &self.sim
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimPlatform {
        &mut self.sim
    }

    #[cfg(target_os = "espidf")]
    fn platform_sleep(&mut self, request: &SleepRequest) -> WakeReason {
        // SAFETY: wake-source configuration and light sleep are called from
        // the single control task; pins were configured by board init.
        unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(request.duration_secs) * 1_000_000);
            if request.wake_on_user_switch {
                gpio_wakeup_enable(pins::USER_SWITCH_GPIO, gpio_int_type_t_GPIO_INTR_LOW_LEVEL);
            }
            if request.wake_on_sensor {
                gpio_wakeup_enable(pins::ACCEL_INT_GPIO, gpio_int_type_t_GPIO_INTR_HIGH_LEVEL);
            }
            esp_sleep_enable_gpio_wakeup();

            let ret = esp_light_sleep_start();
            if ret != ESP_OK {
                warn!("Platform: light sleep rejected ({})", ret);
            }

            gpio_wakeup_disable(pins::USER_SWITCH_GPIO);
            gpio_wakeup_disable(pins::ACCEL_INT_GPIO);

            match esp_sleep_get_wakeup_cause() {
                esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO if board::user_switch_pressed() => {
                    WakeReason::UserSwitch
                }
                esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO => WakeReason::SensorActivity,
                _ => WakeReason::Timer,
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_sleep(&mut self, request: &SleepRequest) -> WakeReason {
        self.sim.sleeps.push(*request);
        if self.sim.wakes.is_empty() {
            WakeReason::Timer
        } else {
            self.sim.wakes.remove(0)
        }
    }
}

impl PlatformPort for EspPlatform {
    fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    fn sleep(&mut self, request: &SleepRequest) -> WakeReason {
        info!("Platform: sleeping up to {}s", request.duration_secs);
        let wake = self.platform_sleep(request);
        info!("Platform: woke by {:?}", wake);
        wake
    }

    fn reset(&mut self) {
        warn!("Platform: restarting");
        #[cfg(target_os = "espidf")]
        // SAFETY: does not return.
        unsafe {
            esp_restart();
        }
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.resets += 1;
        }
    }

    fn power_down(&mut self, secs: u32) {
        warn!("Platform: powering down for {}s", secs);
        #[cfg(target_os = "espidf")]
        // SAFETY: does not return; the chip restarts through the reset vector.
        unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000);
            esp_deep_sleep_start();
        }
        #[cfg(not(target_os = "espidf"))]
        self.sim.power_downs.push(secs);
    }

    fn user_switch_held(&self) -> bool {
        board::user_switch_pressed()
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn request(secs: u32) -> SleepRequest {
        SleepRequest {
            duration_secs: secs,
            wake_on_user_switch: true,
            wake_on_sensor: true,
        }
    }

    #[test]
    fn sleeps_replay_scripted_wakes() {
        let mut p = EspPlatform::new(ResetReason::PowerOn);
        p.sim_mut().wakes = vec![WakeReason::UserSwitch];
        assert_eq!(p.sleep(&request(60)), WakeReason::UserSwitch);
        assert_eq!(p.sleep(&request(30)), WakeReason::Timer);
        assert_eq!(p.sim().sleeps.len(), 2);
        assert_eq!(p.sim().sleeps[1].duration_secs, 30);
    }

    #[test]
    fn reset_and_power_down_are_recorded() {
        let mut p = EspPlatform::new(ResetReason::Pin);
        assert_eq!(p.reset_reason(), ResetReason::Pin);
        p.reset();
        p.power_down(30);
        assert_eq!(p.sim().resets, 1);
        assert_eq!(p.sim().power_downs, vec![30]);
    }

    #[test]
    fn sim_switch_is_released() {
        let p = EspPlatform::new(ResetReason::PowerOn);
        assert!(!p.user_switch_held());
    }
}
