//! ESP-IDF WiFi provisioning host.
//!
//! Joins the infrastructure network in station mode. Joining blocks until
//! the network is up or fails; the outcome is queued and handed to the
//! station by the main loop through [`EspWifiHost::take_event`].

use crate::config::{FormField, WifiCredentials};
use crate::provisioning::{NetworkEvent, ProvisioningHost};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::EspError;
use log::{info, warn};

/// WiFi provisioning host.
pub struct EspWifiHost<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
    event: Option<NetworkEvent>,
    /// Set while a joined network is expected to be up.
    joined: bool,
}

impl<'a> EspWifiHost<'a> {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, EspError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), None)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        Ok(Self {
            wifi,
            event: None,
            joined: false,
        })
    }

    /// Take the outcome of the last join, if any.
    pub fn take_event(&mut self) -> Option<NetworkEvent> {
        if self.event.is_none() && self.joined && !self.wifi.is_connected().unwrap_or(false) {
            self.joined = false;
            self.event = Some(NetworkEvent::Disconnected);
        }
        self.event.take()
    }

    /// Current IP address if connected.
    pub fn ip(&self) -> Option<String> {
        if !self.wifi.is_connected().unwrap_or(false) {
            return None;
        }
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| format!("{}", info.ip))
    }

    /// Configure station mode for `credentials` and block until DHCP is done.
    fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), WifiError> {
        let client = ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| WifiError::CredentialsRejected)?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| WifiError::CredentialsRejected)?,
            auth_method: if credentials.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };

        let wifi = &mut self.wifi;
        wifi.set_configuration(&Configuration::Client(client))
            .map_err(driver("configure"))?;
        wifi.start().map_err(driver("start"))?;
        wifi.connect().map_err(driver("associate"))?;
        wifi.wait_netif_up().map_err(driver("dhcp"))?;

        if let Some(ip) = self.ip() {
            info!("[station] Joined '{}' as {}", credentials.ssid, ip);
        }
        Ok(())
    }
}

impl ProvisioningHost for EspWifiHost<'_> {
    type Error = WifiError;

    fn serve_portal(&mut self, fields: &[FormField]) {
        info!(
            "[station] Configuration portal active ({} fields)",
            fields.len()
        );
    }

    fn join_network(&mut self, credentials: &WifiCredentials) -> Result<(), WifiError> {
        let event = match self.connect(credentials) {
            Ok(()) => NetworkEvent::Joined,
            Err(e) => {
                warn!("[station] Failed to join '{}': {}", credentials.ssid, e);
                NetworkEvent::JoinFailed
            }
        };
        self.joined = event == NetworkEvent::Joined;
        self.event = Some(event);
        Ok(())
    }

    fn leave_network(&mut self) {
        if let Err(e) = self.wifi.disconnect().and_then(|_| self.wifi.stop()) {
            warn!("[station] Failed to leave network: {:?}", e);
        }
        self.joined = false;
        self.event = None;
    }
}

fn driver(stage: &'static str) -> impl FnOnce(EspError) -> WifiError {
    move |source| WifiError::Driver { stage, source }
}

/// Why a join attempt failed.
#[derive(Debug)]
pub enum WifiError {
    /// Credentials do not fit the driver's configuration buffers.
    CredentialsRejected,
    /// A driver call failed at `stage`.
    Driver { stage: &'static str, source: EspError },
}

impl std::fmt::Display for WifiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialsRejected => write!(f, "credentials rejected by the WiFi driver"),
            Self::Driver { stage, source } => write!(f, "WiFi {} failed: {}", stage, source),
        }
    }
}

impl std::error::Error for WifiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver { source, .. } => Some(source),
            Self::CredentialsRejected => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_rejected_credentials_have_no_driver_source() {
        let err = WifiError::CredentialsRejected;
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "credentials rejected by the WiFi driver");
    }
}
