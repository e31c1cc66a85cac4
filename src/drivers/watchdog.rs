//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the control loop
//! stalls.  The loop feeds it once per tick.  Before a low-power stop the
//! task unsubscribes so the watchdog is starved rather than fed while the
//! CPU is halted, and subscribes again on wake.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::WatchdogPort;

pub struct Watchdog {
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: u64,
}

impl Watchdog {
    /// Configure the TWDT with `timeout_ms` and subscribe the current task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "TWDT reconfigure returned {} (may already be configured)",
                        ret
                    );
                }
            }
            let mut wd = Self { subscribed: false };
            wd.subscribe();
            info!("Watchdog: {} ms timeout, panic on trigger", timeout_ms);
            wd
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {} ms timeout, no-op", timeout_ms);
            Self {
                subscribed: true,
                feeds: 0,
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Feeds recorded by the host simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u64 {
        self.feeds
    }

    #[cfg(target_os = "espidf")]
    fn subscribe(&mut self) {
        let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        self.subscribed = ret == ESP_OK;
        if !self.subscribed {
            log::warn!("Watchdog: failed to subscribe ({})", ret);
        }
    }

    #[cfg(target_os = "espidf")]
    fn unsubscribe(&mut self) {
        let ret = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
        if ret != ESP_OK {
            log::warn!("Watchdog: failed to unsubscribe ({})", ret);
        }
        self.subscribed = false;
    }
}

impl WatchdogPort for Watchdog {
    fn feed(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            if self.subscribed {
                self.feeds += 1;
            }
        }
    }

    fn pause(&mut self) {
        #[cfg(target_os = "espidf")]
        self.unsubscribe();

        #[cfg(not(target_os = "espidf"))]
        {
            self.subscribed = false;
        }
    }

    fn resume(&mut self) {
        #[cfg(target_os = "espidf")]
        self.subscribe();

        #[cfg(not(target_os = "espidf"))]
        {
            self.subscribed = true;
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn paused_watchdog_is_not_fed() {
        let mut wd = Watchdog::new(60_000);
        wd.feed();
        wd.pause();
        wd.feed();
        wd.feed();
        wd.resume();
        wd.feed();
        assert_eq!(wd.feeds(), 2);
        assert!(wd.is_subscribed());
    }
}
