//! Configuration store.
//!
//! [`ConfigStore`] owns the in-memory [`ConfigSnapshot`], the board table and
//! the storage backend. Every accepted mutation is persisted immediately as a
//! complete record; a single field is never written on its own.
//!
//! # Example
//!
//! ```
//! use groundstation_esp32::config::{ConfigStore, InitOutcome};
//! use groundstation_esp32::storage::MemoryStorage;
//!
//! let mut store = ConfigStore::new(MemoryStorage::new());
//! assert_eq!(store.init().unwrap(), InitOutcome::Defaulted);
//!
//! store.set_test_mode(true).unwrap();
//! assert!(store.test_mode());
//! assert_eq!(store.mqtt_port(), 8883);
//! ```

use super::codec::{decode_flag, decode_float, decode_int, encode_flag};
use super::fields::{FieldGroup, FieldId, FieldKind, CONFIG_VERSION};
use super::form::{self, FieldError, FormField, SubmitError};
use super::snapshot::{ConfigSnapshot, RecordError};
use super::wifi::WifiCredentials;
use crate::board::{detect_board, BoardId, BoardProfile, BoardTable, DisplayProbe, DEFAULT_BOARD};
use crate::storage::{ConfigStorage, StorageError};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;

/// Highest display brightness.
const MAX_OLED_BRIGHT: i64 = 100;

/// Result of [`ConfigStore::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A valid stored record was loaded.
    Loaded,
    /// Defaults were restored and persisted.
    Defaulted,
}

/// Result of [`ConfigStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The stored record replaced the in-memory snapshot.
    Loaded,
    /// Nothing is stored yet.
    Missing,
    /// The stored record was rejected; the in-memory snapshot is unchanged.
    Rejected(RecordError),
}

/// One of the five operational flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalFlag {
    AllowTx,
    RemoteTune,
    Telemetry3rd,
    TestMode,
    AutoUpdate,
}

impl OperationalFlag {
    pub const ALL: [OperationalFlag; 5] = [
        Self::AllowTx,
        Self::RemoteTune,
        Self::Telemetry3rd,
        Self::TestMode,
        Self::AutoUpdate,
    ];

    /// Field holding this flag.
    pub fn field(self) -> FieldId {
        match self {
            Self::AllowTx => FieldId::AllowTx,
            Self::RemoteTune => FieldId::RemoteTune,
            Self::Telemetry3rd => FieldId::Telemetry3rd,
            Self::TestMode => FieldId::TestMode,
            Self::AutoUpdate => FieldId::AutoUpdate,
        }
    }
}

impl fmt::Display for OperationalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field().spec().label)
    }
}

/// Persistent, typed station configuration.
pub struct ConfigStore<S: ConfigStorage> {
    storage: S,
    snapshot: ConfigSnapshot,
    boards: BoardTable,
}

impl<S: ConfigStorage> ConfigStore<S> {
    /// Create a store holding defaults. Call [`init`](Self::init) before use.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            snapshot: ConfigSnapshot::defaults(),
            boards: BoardTable::build(),
        }
    }

    /// Load the stored configuration, restoring and persisting defaults when
    /// nothing usable is stored.
    ///
    /// Fails only when the storage backend is unavailable.
    pub fn init(&mut self) -> Result<InitOutcome, StorageError> {
        match self.load()? {
            LoadOutcome::Loaded => {
                info!("[config] Loaded configuration (version {})", CONFIG_VERSION);
                Ok(InitOutcome::Loaded)
            }
            LoadOutcome::Missing => {
                info!("[config] No stored configuration, using defaults");
                self.restore_defaults()?;
                Ok(InitOutcome::Defaulted)
            }
            LoadOutcome::Rejected(e) => {
                warn!("[config] Stored configuration rejected ({}), using defaults", e);
                self.restore_defaults()?;
                Ok(InitOutcome::Defaulted)
            }
        }
    }

    /// Read the complete record from storage.
    pub fn load(&mut self) -> Result<LoadOutcome, StorageError> {
        let Some(bytes) = self.storage.read()? else {
            return Ok(LoadOutcome::Missing);
        };
        match ConfigSnapshot::from_record(&bytes) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                Ok(LoadOutcome::Loaded)
            }
            Err(e) => Ok(LoadOutcome::Rejected(e)),
        }
    }

    /// Write the complete record to storage.
    pub fn save(&mut self) -> Result<(), StorageError> {
        let record = self.snapshot.to_record();
        self.storage.write(&record)?;
        debug!("[config] Saved {} byte record", record.len());
        Ok(())
    }

    /// Clear the network credentials (AP password, WiFi SSID and password).
    ///
    /// Station name, location, broker, board and flags are kept.
    pub fn reset_ap_config(&mut self) -> Result<(), StorageError> {
        info!("[config] Resetting network credentials");
        self.snapshot.reset_group(FieldGroup::Provisioning);
        self.save()
    }

    /// Restore every field to its default and persist with the current
    /// version tag.
    pub fn reset_all_config(&mut self) -> Result<(), StorageError> {
        info!("[config] Resetting all configuration");
        self.restore_defaults()
    }

    fn restore_defaults(&mut self) -> Result<(), StorageError> {
        self.snapshot = ConfigSnapshot::defaults();
        self.save()
    }

    // ==================== Getters ====================

    /// Station name shown on the map.
    pub fn thing_name(&self) -> &str {
        self.snapshot.raw(FieldId::ThingName)
    }

    pub fn ap_password(&self) -> &str {
        self.snapshot.raw(FieldId::ApPassword)
    }

    pub fn wifi_ssid(&self) -> &str {
        self.snapshot.raw(FieldId::WifiSsid)
    }

    /// Whether a network to join has been configured.
    pub fn has_credentials(&self) -> bool {
        !self.wifi_ssid().is_empty()
    }

    /// Credentials for joining the configured network.
    ///
    /// `None` when no SSID is stored or the stored pair is invalid.
    pub fn wifi_credentials(&self) -> Option<WifiCredentials> {
        if !self.has_credentials() {
            return None;
        }
        WifiCredentials::new(self.wifi_ssid(), self.snapshot.raw(FieldId::WifiPassword))
            .map_err(|e| warn!("[config] Stored WiFi credentials invalid: {}", e))
            .ok()
    }

    pub fn latitude(&self) -> f32 {
        decode_float(self.snapshot.raw(FieldId::Latitude))
    }

    pub fn longitude(&self) -> f32 {
        decode_float(self.snapshot.raw(FieldId::Longitude))
    }

    /// POSIX time zone string.
    pub fn tz(&self) -> &str {
        self.snapshot.raw(FieldId::Tz)
    }

    pub fn mqtt_server(&self) -> &str {
        self.snapshot.raw(FieldId::MqttServer)
    }

    /// Broker port, `0` when the stored value is not a valid port.
    pub fn mqtt_port(&self) -> u16 {
        let port = decode_int(self.snapshot.raw(FieldId::MqttPort));
        u16::try_from(port).unwrap_or_else(|_| {
            warn!("[config] MQTT port {} out of range, using 0", port);
            0
        })
    }

    pub fn mqtt_user(&self) -> &str {
        self.snapshot.raw(FieldId::MqttUser)
    }

    pub fn mqtt_pass(&self) -> &str {
        self.snapshot.raw(FieldId::MqttPass)
    }

    /// Whether a board has been chosen (manually or by detection).
    pub fn board_selected(&self) -> bool {
        !self.snapshot.raw(FieldId::Board).is_empty()
    }

    /// Selected board.
    ///
    /// An unselected or out-of-range board index resolves to
    /// [`DEFAULT_BOARD`].
    pub fn board(&self) -> BoardId {
        if !self.board_selected() {
            return DEFAULT_BOARD;
        }
        let index = decode_int(self.snapshot.raw(FieldId::Board));
        match self.boards.resolve(index) {
            Ok(profile) => profile.id,
            Err(e) => {
                warn!("[config] {}, using {:?}", e, DEFAULT_BOARD);
                DEFAULT_BOARD
            }
        }
    }

    /// Pin map of the selected board.
    pub fn board_profile(&self) -> &BoardProfile {
        self.boards.get(self.board())
    }

    pub fn boards(&self) -> &BoardTable {
        &self.boards
    }

    /// Display brightness in percent, clamped to `0..=100`.
    pub fn oled_bright(&self) -> u8 {
        let bright = decode_int(self.snapshot.raw(FieldId::OledBright));
        // Bounded by the clamp.
        bright.clamp(0, MAX_OLED_BRIGHT) as u8
    }

    /// Current value of an operational flag.
    pub fn flag(&self, flag: OperationalFlag) -> bool {
        decode_flag(self.snapshot.raw(flag.field()))
    }

    pub fn allow_tx(&self) -> bool {
        self.flag(OperationalFlag::AllowTx)
    }

    pub fn remote_tune(&self) -> bool {
        self.flag(OperationalFlag::RemoteTune)
    }

    pub fn telemetry3rd(&self) -> bool {
        self.flag(OperationalFlag::Telemetry3rd)
    }

    pub fn test_mode(&self) -> bool {
        self.flag(OperationalFlag::TestMode)
    }

    pub fn auto_update(&self) -> bool {
        self.flag(OperationalFlag::AutoUpdate)
    }

    // ==================== Setters ====================

    /// Set an operational flag and save the full record.
    ///
    /// On a save failure the new value stays in memory.
    pub fn set_flag(&mut self, flag: OperationalFlag, value: bool) -> Result<(), StorageError> {
        // The sentinel always fits a checkbox buffer.
        let _ = self.snapshot.set_raw(flag.field(), encode_flag(value));
        info!("[config] {} = {}", flag, value);
        self.save()
    }

    pub fn set_allow_tx(&mut self, value: bool) -> Result<(), StorageError> {
        self.set_flag(OperationalFlag::AllowTx, value)
    }

    pub fn set_remote_tune(&mut self, value: bool) -> Result<(), StorageError> {
        self.set_flag(OperationalFlag::RemoteTune, value)
    }

    pub fn set_telemetry3rd(&mut self, value: bool) -> Result<(), StorageError> {
        self.set_flag(OperationalFlag::Telemetry3rd, value)
    }

    pub fn set_test_mode(&mut self, value: bool) -> Result<(), StorageError> {
        self.set_flag(OperationalFlag::TestMode, value)
    }

    pub fn set_auto_update(&mut self, value: bool) -> Result<(), StorageError> {
        self.set_flag(OperationalFlag::AutoUpdate, value)
    }

    /// Select a board and save.
    pub fn set_board(&mut self, board: BoardId) -> Result<(), StorageError> {
        let _ = self
            .snapshot
            .set_raw(FieldId::Board, &board.index().to_string());
        info!("[config] Board set to {}", self.boards.get(board).label);
        self.save()
    }

    /// Detect the board by probing display buses when none is selected yet.
    ///
    /// Returns the detected board, `None` when a board was already selected
    /// or nothing answered.
    pub fn auto_select_board(
        &mut self,
        probe: &mut impl DisplayProbe,
    ) -> Result<Option<BoardId>, StorageError> {
        if self.board_selected() {
            debug!("[config] Board already selected, skipping detection");
            return Ok(None);
        }
        match detect_board(&self.boards, probe) {
            Some(board) => {
                self.set_board(board)?;
                Ok(Some(board))
            }
            None => Ok(None),
        }
    }

    // ==================== Provisioning form ====================

    /// Describe every field for the provisioning form.
    pub fn form_fields(&self) -> Vec<FormField> {
        form::form_fields(&self.snapshot, &self.boards)
    }

    /// Validate and apply a form submission, then save once.
    ///
    /// Either every submitted field is applied or none is. Returns the
    /// fields whose stored value changed.
    pub fn apply_submitted_fields(
        &mut self,
        submitted: &HashMap<String, String>,
    ) -> Result<Vec<FieldId>, SubmitError> {
        let changes = form::validate_submission(&self.snapshot, submitted).map_err(|errors| {
            for error in &errors {
                warn!("[config] Rejected {}", error);
            }
            SubmitError::Rejected(errors)
        })?;

        if changes.is_empty() {
            debug!("[config] Submission changed nothing");
            return Ok(Vec::new());
        }

        let mut next = self.snapshot.clone();
        for (id, text) in &changes {
            next.set_raw(*id, text).map_err(|e| {
                SubmitError::Rejected(vec![FieldError {
                    field: *id,
                    kind: e.into(),
                }])
            })?;
        }
        self.snapshot = next;

        let changed: Vec<FieldId> = changes.into_iter().map(|(id, _)| id).collect();
        info!("[config] Applied {} changed field(s)", changed.len());
        self.save()?;
        Ok(changed)
    }

    // ==================== Inspection ====================

    /// Current in-memory snapshot.
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Decoded view of the configuration with secrets left out.
    pub fn report(&self) -> ConfigReport {
        let profile = self.board_profile();
        ConfigReport {
            version: CONFIG_VERSION,
            thing_name: self.thing_name().to_string(),
            wifi_ssid: self.wifi_ssid().to_string(),
            latitude: self.latitude(),
            longitude: self.longitude(),
            tz: self.tz().to_string(),
            mqtt_server: self.mqtt_server().to_string(),
            mqtt_port: self.mqtt_port(),
            mqtt_user: self.mqtt_user().to_string(),
            board: profile.id,
            board_label: profile.label,
            oled_bright: self.oled_bright(),
            allow_tx: self.allow_tx(),
            remote_tune: self.remote_tune(),
            telemetry3rd: self.telemetry3rd(),
            test_mode: self.test_mode(),
            auto_update: self.auto_update(),
        }
    }

    /// Log every field with its decoded value. Passwords are masked.
    pub fn print_config(&self) {
        info!("[config] Configuration (version {}):", CONFIG_VERSION);
        for (id, raw) in self.snapshot.iter() {
            let spec = id.spec();
            let shown = match spec.kind {
                FieldKind::Password if raw.is_empty() => "<unset>".to_string(),
                FieldKind::Password => "********".to_string(),
                FieldKind::Float => decode_float(raw).to_string(),
                FieldKind::Integer => decode_int(raw).to_string(),
                FieldKind::Select => self.board_profile().label.to_string(),
                FieldKind::Flag => decode_flag(raw).to_string(),
                FieldKind::Text => raw.to_string(),
            };
            info!("[config]   {:<14} {}", spec.name, shown);
        }
    }
}

/// Decoded configuration for diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(target_os = "espidf"), derive(serde::Serialize))]
pub struct ConfigReport {
    pub version: &'static str,
    pub thing_name: String,
    pub wifi_ssid: String,
    pub latitude: f32,
    pub longitude: f32,
    pub tz: String,
    pub mqtt_server: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub board: BoardId,
    pub board_label: &'static str,
    pub oled_bright: u8,
    pub allow_tx: bool,
    pub remote_tune: bool,
    pub telemetry3rd: bool,
    pub test_mode: bool,
    pub auto_update: bool,
}

impl ConfigReport {
    /// Render as pretty-printed JSON.
    #[cfg(not(target_os = "espidf"))]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Station:   {}", self.thing_name)?;
        writeln!(f, "WiFi SSID: {}", self.wifi_ssid)?;
        writeln!(f, "Location:  {}, {} ({})", self.latitude, self.longitude, self.tz)?;
        writeln!(
            f,
            "Broker:    {}@{}:{}",
            self.mqtt_user, self.mqtt_server, self.mqtt_port
        )?;
        writeln!(f, "Board:     {} (OLED {}%)", self.board_label, self.oled_bright)?;
        write!(
            f,
            "Flags:     tx={} tune={} telemetry={} test={} update={}",
            self.allow_tx, self.remote_tune, self.telemetry3rd, self.test_mode, self.auto_update
        )
    }
}
