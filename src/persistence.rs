//! Configuration persistence in ESP32 Non-Volatile Storage (NVS).
//!
//! The whole configuration record is stored as one blob under a single key,
//! so a write either replaces the complete record or leaves the previous one.
//!
//! # Usage
//!
//! ```ignore
//! use groundstation_esp32::config::ConfigStore;
//! use groundstation_esp32::persistence::NvsStorage;
//!
//! let mut store = ConfigStore::new(NvsStorage::init()?);
//! store.init()?;
//! ```

use crate::config::fields::record_len;
use crate::storage::{ConfigStorage, StorageError};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_sys::EspError;
use log::info;

/// NVS namespace for station configuration.
const NVS_NAMESPACE: &str = "gs_config";

/// NVS key for the configuration record.
const NVS_KEY: &str = "record";

/// Extra read room for records written with another layout.
const READ_SLACK: usize = 64;

/// NVS-backed configuration storage.
pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    /// Open the configuration namespace on the default NVS partition.
    pub fn init() -> Result<Self, EspError> {
        let partition = EspNvsPartition::<NvsDefault>::take()?;
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    /// Wrap an already opened namespace.
    pub fn from_nvs(nvs: EspNvs<NvsDefault>) -> Self {
        Self { nvs }
    }
}

impl ConfigStorage for NvsStorage {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        let mut buf = vec![0u8; record_len() + READ_SLACK];
        match self.nvs.get_raw(NVS_KEY, &mut buf) {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => {
                log::debug!("[storage] No config record in NVS");
                Ok(None)
            }
            Err(e) => {
                log::warn!("[storage] Failed to read config from NVS: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Save the record with read-back verification.
    ///
    /// Reads the record back after writing to catch flash write failures
    /// that do not return an error code.
    fn write(&mut self, record: &[u8]) -> Result<(), StorageError> {
        self.nvs.set_raw(NVS_KEY, record)?;

        let mut verify_buf = vec![0u8; record.len() + 1];
        let read_bytes = self
            .nvs
            .get_raw(NVS_KEY, &mut verify_buf)
            .map_err(|e| {
                log::error!("[storage] Failed to read back config after save: {:?}", e);
                e
            })?
            .ok_or_else(|| {
                log::error!("[storage] Config not found after save - possible flash failure");
                StorageError::VerificationFailed
            })?;

        if read_bytes != record {
            log::error!("[storage] Config verification failed - data mismatch after save");
            return Err(StorageError::VerificationFailed);
        }

        info!("[storage] Config saved and verified in NVS");
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        self.nvs.remove(NVS_KEY)?;
        log::warn!("[storage] Config record erased from NVS");
        Ok(())
    }
}
