//! Station composition root.
//!
//! [`Station`] owns the configuration store, the mode machine and the
//! provisioning host, and wires them together on one control flow:
//!
//! ```text
//! host form ──apply_submitted_fields──► ConfigStore ──save──► storage
//!                                            │
//!                        credentials changed ▼
//!                                       ModeMachine ──join_network──► host
//!                                            ▲
//! host ──on_network_event(Joined/Failed)─────┘
//! ```
//!
//! On a successful join the station freezes a copy of the configuration;
//! operating code reads that copy through [`Station::active_config`] so
//! later form edits only take effect on the next connection.

use crate::board::DisplayProbe;
use crate::config::{
    ConfigSnapshot, ConfigStore, FieldId, FormField, InitOutcome, OperationalFlag, SubmitError,
};
use crate::mode::{DeviceMode, ModeEvent, ModeMachine};
use crate::provisioning::{ConfigPortal, NetworkEvent, ProvisioningHost};
use crate::storage::{ConfigStorage, StorageError};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Instant;

/// A ground station: configuration, mode and network host.
pub struct Station<S: ConfigStorage, H: ProvisioningHost> {
    store: ConfigStore<S>,
    mode: ModeMachine,
    host: H,
    /// Configuration frozen at the last successful join.
    active: Option<ConfigSnapshot>,
}

impl<S: ConfigStorage, H: ProvisioningHost> Station<S, H> {
    pub fn new(store: ConfigStore<S>, host: H) -> Self {
        Self::with_mode_machine(store, host, ModeMachine::new())
    }

    /// Use a preconfigured mode machine (e.g. a custom AP timeout).
    pub fn with_mode_machine(store: ConfigStore<S>, host: H, mode: ModeMachine) -> Self {
        Self {
            store,
            mode,
            host,
            active: None,
        }
    }

    /// Load the configuration, detect the board and start serving the
    /// access point.
    pub fn boot(&mut self, probe: &mut impl DisplayProbe) -> Result<InitOutcome, StorageError> {
        let outcome = self.store.init()?;
        if let Err(e) = self.store.auto_select_board(probe) {
            warn!("[station] Failed to save detected board: {}", e);
        }
        self.store.print_config();

        let credentials_present = self.store.has_credentials();
        // Boot is always the starting mode here.
        let _ = self.mode.handle(ModeEvent::BootCompleted {
            credentials_present,
        });
        self.serve_portal();
        Ok(outcome)
    }

    /// Drive timers. Call periodically from the main loop.
    pub fn poll(&mut self, now: Instant) -> Option<DeviceMode> {
        let credentials_present = self.store.has_credentials();
        let next = self.mode.poll(now, credentials_present)?;
        info!("[station] Access point timed out, joining stored network");
        self.start_join();
        Some(next)
    }

    /// Clear network credentials and return to the access point.
    pub fn reset_ap_config(&mut self) -> Result<(), StorageError> {
        self.store.reset_ap_config()?;
        self.return_to_portal(ModeEvent::ApConfigReset);
        Ok(())
    }

    /// Restore all defaults and return to the access point.
    pub fn reset_all_config(&mut self) -> Result<(), StorageError> {
        self.store.reset_all_config()?;
        self.return_to_portal(ModeEvent::ResetRequested);
        Ok(())
    }

    /// Set an operational flag (persisted immediately).
    pub fn set_flag(&mut self, flag: OperationalFlag, value: bool) -> Result<(), StorageError> {
        self.store.set_flag(flag, value)
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode.mode()
    }

    pub fn mode_machine(&self) -> &ModeMachine {
        &self.mode
    }

    /// Configuration in effect since the last successful join.
    pub fn active_config(&self) -> Option<&ConfigSnapshot> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn serve_portal(&mut self) {
        let fields = self.store.form_fields();
        self.host.serve_portal(&fields);
    }

    fn start_join(&mut self) {
        let Some(credentials) = self.store.wifi_credentials() else {
            warn!("[station] No usable credentials to join with");
            self.join_failed();
            return;
        };
        info!("[station] Joining '{}'", credentials.ssid);
        if let Err(e) = self.host.join_network(&credentials) {
            warn!("[station] Join request failed: {}", e);
            self.join_failed();
        }
    }

    fn join_failed(&mut self) {
        self.active = None;
        if self.mode.handle(ModeEvent::JoinFailed).is_ok() {
            self.serve_portal();
        }
    }

    fn return_to_portal(&mut self, event: ModeEvent) {
        if !self.mode.is_ap_mode() {
            self.host.leave_network();
        }
        self.active = None;
        if self.mode.handle(event).is_ok() {
            self.serve_portal();
        }
    }
}

impl<S: ConfigStorage, H: ProvisioningHost> ConfigPortal for Station<S, H> {
    fn form_fields(&self) -> Vec<FormField> {
        self.store.form_fields()
    }

    /// Apply a form submission. Changed network credentials trigger a
    /// (re)join.
    fn apply_submitted_fields(
        &mut self,
        submitted: &HashMap<String, String>,
    ) -> Result<Vec<FieldId>, SubmitError> {
        let changed = self.store.apply_submitted_fields(submitted)?;

        let credentials_changed = changed
            .iter()
            .any(|id| matches!(id, FieldId::WifiSsid | FieldId::WifiPassword));
        if !credentials_changed {
            return Ok(changed);
        }
        if !self.store.has_credentials() {
            if !self.mode.is_ap_mode() {
                info!("[station] SSID cleared, returning to access point");
                self.return_to_portal(ModeEvent::ApConfigReset);
            }
            return Ok(changed);
        }

        if !self.mode.is_ap_mode() {
            debug!("[station] Credentials changed while online, rejoining");
            self.host.leave_network();
            self.active = None;
            let _ = self.mode.handle(ModeEvent::ResetRequested);
        }
        if self.mode.handle(ModeEvent::CredentialsApplied).is_ok() {
            self.start_join();
        }
        Ok(changed)
    }

    fn is_ap_mode(&self) -> bool {
        self.mode.is_ap_mode()
    }

    fn is_connected(&self) -> bool {
        self.mode.is_connected()
    }

    fn on_network_event(&mut self, event: NetworkEvent) {
        info!("[station] Network {}", event);
        match event {
            NetworkEvent::Joined => {
                if self.mode.handle(ModeEvent::JoinSucceeded).is_ok() {
                    self.active = Some(self.store.snapshot().clone());
                    info!("[station] Online as '{}'", self.store.thing_name());
                }
            }
            NetworkEvent::JoinFailed | NetworkEvent::Disconnected => self.join_failed(),
        }
    }
}
