//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`]: scan for the home network, start an
//! association, report link state and power the radio down again. The
//! sync manager owns the policy (how long to wait, when to give up); this
//! adapter only performs the radio operations.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side runs and tests.
//!
//! The radio stays off between sync cycles. `scan` starts it in station
//! mode, `disconnect` stops it.

use log::{debug, info, warn};

use super::utils::{validate_password, validate_ssid};
use crate::app::ports::NetworkPort;
use crate::error::NetworkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, ScanConfig};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Off,
    Scanning,
    Associating,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

/// Simulated environment: which networks are in range and how the
/// access point behaves.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimRadio {
    visible: Vec<heapless::String<32>>,
    /// `is_connected` polls before the association completes.
    associate_after: u32,
    polls: core::cell::Cell<u32>,
    reject_auth: bool,
    scans: u32,
    associated_ssid: Option<heapless::String<32>>,
}

impl WifiAdapter {
    /// Take ownership of the modem. The driver is created stopped.
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            state: WifiState::Off,
            wifi,
        })
    }

    /// Simulation: nothing in range until [`sim_set_visible`](Self::sim_set_visible).
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Off,
            sim: SimRadio::default(),
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_scan(&mut self) -> Result<Vec<heapless::String<32>>, NetworkError> {
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))
                .map_err(|_| NetworkError::ScanFailed)?;
            self.wifi.start().map_err(|_| NetworkError::ScanFailed)?;
        }
        self.wifi
            .start_scan(&ScanConfig::default(), true)
            .map_err(|_| NetworkError::ScanFailed)?;
        let aps = self
            .wifi
            .get_scan_result()
            .map_err(|_| NetworkError::ScanFailed)?;

        let mut seen = Vec::with_capacity(aps.len());
        for ap in aps {
            let mut ssid = heapless::String::new();
            if ssid.push_str(ap.ssid.as_str()).is_ok() {
                seen.push(ssid);
            }
        }
        Ok(seen)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_scan(&mut self) -> Result<Vec<heapless::String<32>>, NetworkError> {
        self.sim.scans += 1;
        Ok(self.sim.visible.clone())
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| NetworkError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| NetworkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(config))
            .map_err(|_| NetworkError::ConnectFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| NetworkError::ConnectFailed)?;
        }
        self.wifi.connect().map_err(|_| NetworkError::ConnectFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, ssid: &str, _password: &str) -> Result<(), NetworkError> {
        self.sim.polls.set(0);
        self.sim.associated_ssid = None;
        if self.sim.reject_auth {
            // The driver accepts the request; association never completes.
            info!("WiFi(sim): '{}' will reject authentication", ssid);
            return Ok(());
        }
        let mut name = heapless::String::new();
        let _ = name.push_str(ssid);
        self.sim.associated_ssid = Some(name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        let Some(ssid) = &self.sim.associated_ssid else {
            return false;
        };
        if !self.sim.visible.iter().any(|v| v == ssid) {
            return false;
        }
        let polls = self.sim.polls.get();
        self.sim.polls.set(polls.saturating_add(1));
        polls >= self.sim.associate_after
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            debug!("WiFi: disconnect: {}", e);
        }
        if let Err(e) = self.wifi.stop() {
            warn!("WiFi: stop failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.associated_ssid = None;
        info!("WiFi(sim): radio off");
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: replace the set of networks in range.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_visible(&mut self, ssids: &[&str]) {
        self.sim.visible = ssids
            .iter()
            .filter_map(|s| {
                let mut name = heapless::String::new();
                name.push_str(s).ok().map(|()| name)
            })
            .collect();
    }

    /// Simulation: association completes after `polls` status checks.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_associate_after(&mut self, polls: u32) {
        self.sim.associate_after = polls;
    }

    /// Simulation: the access point refuses every association.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_reject_auth(&mut self, reject: bool) {
        self.sim.reject_auth = reject;
    }

    /// Simulation: scans performed so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_scan_count(&self) -> u32 {
        self.sim.scans
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn scan(&mut self) -> Result<Vec<heapless::String<32>>, NetworkError> {
        self.state = WifiState::Scanning;
        let result = self.platform_scan();
        match &result {
            Ok(list) => debug!("WiFi: scan found {} networks", list.len()),
            Err(e) => warn!("WiFi: {}", e),
        }
        result
    }

    fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        if ssid.is_empty() {
            return Err(NetworkError::NoCredentials);
        }
        validate_ssid(ssid)?;
        validate_password(password)?;

        info!("WiFi: associating with '{}'", ssid);
        self.state = WifiState::Associating;
        self.platform_connect(ssid, password)
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Off;
    }
}
