//! Network radio adapter.
//!
//! Implements [`ConnectivityPort`], the boundary the lifecycle uses to bring
//! the uplink up and down.  Two levels of readiness are reported:
//!
//! | Level              | Station interface      | Port call          |
//! |--------------------|------------------------|--------------------|
//! | Radio ready        | associated with the AP | `is_radio_ready()` |
//! | Connected          | interface up with IP   | `is_connected()`   |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in station mode.
//!   `connect()` only starts the attempt; the lifecycle polls for the result.
//! - **all other targets**: a timed simulation for host-side runs.

use core::fmt;
use log::{info, warn};

use crate::app::ports::ConnectivityPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    InvalidSsid,
    InvalidPassword,
    Driver(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Driver(rc) => write!(f, "radio driver error (rc={})", rc),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Link state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Radio powered down.
    Off,
    /// Attempt in progress.
    Connecting,
    /// Radio refused to stop on the last disconnect.
    Stuck,
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), RadioError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(RadioError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), RadioError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(RadioError::InvalidPassword);
    }
    Ok(())
}

/// Map RSSI in dBm onto 0–100 %: −100 dBm and below is 0, −50 dBm and above is 100.
pub fn rssi_to_percent(rssi_dbm: i8) -> u8 {
    ((i16::from(rssi_dbm) + 100) * 2).clamp(0, 100) as u8
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Timing of the simulated network.  `None` means the stage never completes.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy)]
pub struct SimNetwork {
    pub associate_after: Option<std::time::Duration>,
    pub online_after: Option<std::time::Duration>,
    pub refuse_shutdown: bool,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimNetwork {
    fn default() -> Self {
        Self {
            associate_after: Some(std::time::Duration::from_millis(200)),
            online_after: Some(std::time::Duration::from_millis(500)),
            refuse_shutdown: false,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Radio adapter
// ───────────────────────────────────────────────────────────────

pub struct RadioAdapter {
    state: LinkState,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimNetwork,
    #[cfg(not(target_os = "espidf"))]
    attempt_started: Option<std::time::Instant>,
}

impl RadioAdapter {
    /// Wrap a station-mode driver and apply the credentials.
    #[cfg(target_os = "espidf")]
    pub fn new(
        mut wifi: esp_idf_svc::wifi::EspWifi<'static>,
        ssid: &str,
        password: &str,
    ) -> Result<Self, RadioError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        validate_ssid(ssid)?;
        validate_password(password)?;
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::InvalidSsid)?,
            password: password.try_into().map_err(|_| RadioError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(|e| RadioError::Driver(e.code()))?;
        info!("Radio: station configured for '{}'", ssid);
        Ok(Self {
            state: LinkState::Off,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(sim: SimNetwork) -> Self {
        Self {
            state: LinkState::Off,
            sim,
            attempt_started: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), RadioError> {
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| RadioError::Driver(e.code()))?;
        }
        self.wifi.connect().map_err(|e| RadioError::Driver(e.code()))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), RadioError> {
        self.attempt_started = Some(std::time::Instant::now());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) -> bool {
        if self.wifi.is_connected().unwrap_or(false) {
            if let Err(e) = self.wifi.disconnect() {
                warn!("Radio: disconnect failed ({})", e);
            }
        }
        match self.wifi.stop() {
            Ok(()) => true,
            Err(e) => {
                warn!("Radio: stop failed ({})", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) -> bool {
        self.attempt_started = None;
        !self.sim.refuse_shutdown
    }

    #[cfg(target_os = "espidf")]
    fn platform_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associated(&self) -> bool {
        self.sim_elapsed(self.sim.associate_after)
    }

    #[cfg(target_os = "espidf")]
    fn platform_online(&self) -> bool {
        self.platform_associated() && self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_online(&self) -> bool {
        self.platform_associated() && self.sim_elapsed(self.sim.online_after)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_elapsed(&self, stage: Option<std::time::Duration>) -> bool {
        match (self.attempt_started, stage) {
            (Some(started), Some(after)) => started.elapsed() >= after,
            _ => false,
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: plain query into a caller-owned record; the driver is started.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.platform_associated().then_some(-67)
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for RadioAdapter {
    fn connect(&mut self) {
        if self.state == LinkState::Connecting {
            return;
        }
        info!("Radio: connecting");
        match self.platform_connect() {
            Ok(()) => self.state = LinkState::Connecting,
            // The lifecycle times the attempt out and raises the alert.
            Err(e) => warn!("Radio: connect request failed ({})", e),
        }
    }

    fn is_connected(&self) -> bool {
        self.state == LinkState::Connecting && self.platform_online()
    }

    fn is_radio_ready(&self) -> bool {
        self.state == LinkState::Connecting && self.platform_associated()
    }

    fn disconnect(&mut self) -> bool {
        let stopped = self.platform_disconnect();
        self.state = if stopped { LinkState::Off } else { LinkState::Stuck };
        info!("Radio: {}", if stopped { "off" } else { "refused to stop" });
        stopped
    }

    fn signal_strength(&self) -> Option<u8> {
        if !self.is_radio_ready() {
            return None;
        }
        self.platform_rssi().map(rssi_to_percent)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn instant_network() -> SimNetwork {
        SimNetwork {
            associate_after: Some(Duration::ZERO),
            online_after: Some(Duration::ZERO),
            refuse_shutdown: false,
        }
    }

    #[test]
    fn rejects_empty_ssid() {
        assert_eq!(validate_ssid(""), Err(RadioError::InvalidSsid));
        assert_eq!(validate_ssid("bad\u{7f}"), Err(RadioError::InvalidSsid));
    }

    #[test]
    fn rejects_short_password() {
        assert_eq!(validate_password("short"), Err(RadioError::InvalidPassword));
        assert!(validate_password("").is_ok());
        assert!(validate_password("mysecret8").is_ok());
    }

    #[test]
    fn rssi_scale_is_clamped() {
        assert_eq!(rssi_to_percent(-120), 0);
        assert_eq!(rssi_to_percent(-75), 50);
        assert_eq!(rssi_to_percent(-30), 100);
    }

    #[test]
    fn off_radio_reports_nothing() {
        let r = RadioAdapter::new(instant_network());
        assert_eq!(r.state(), LinkState::Off);
        assert!(!r.is_connected());
        assert!(!r.is_radio_ready());
        assert_eq!(r.signal_strength(), None);
    }

    #[test]
    fn connect_disconnect_roundtrip() {
        let mut r = RadioAdapter::new(instant_network());
        r.connect();
        assert!(r.is_radio_ready());
        assert!(r.is_connected());
        assert_eq!(r.signal_strength(), Some(66));
        assert!(r.disconnect());
        assert!(!r.is_connected());
        assert_eq!(r.state(), LinkState::Off);
    }

    #[test]
    fn unreachable_cloud_stays_radio_ready_only() {
        let mut r = RadioAdapter::new(SimNetwork {
            online_after: None,
            ..instant_network()
        });
        r.connect();
        assert!(r.is_radio_ready());
        assert!(!r.is_connected());
    }

    #[test]
    fn refused_shutdown_is_reported() {
        let mut r = RadioAdapter::new(SimNetwork {
            refuse_shutdown: true,
            ..instant_network()
        });
        r.connect();
        assert!(!r.disconnect());
        assert_eq!(r.state(), LinkState::Stuck);
        assert!(!r.is_radio_ready());
    }

    #[test]
    fn connection_takes_time() {
        let mut r = RadioAdapter::new(SimNetwork {
            associate_after: Some(Duration::from_secs(60)),
            ..SimNetwork::default()
        });
        r.connect();
        assert_eq!(r.state(), LinkState::Connecting);
        assert!(!r.is_radio_ready());
    }
}
