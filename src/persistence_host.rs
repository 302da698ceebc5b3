//! Configuration persistence for host (development) builds.
//!
//! Stores the configuration record in a file so it persists across runs.
//! Uses `~/.groundstation-esp32/config.bin` by default.
//!
//! # Usage
//!
//! ```ignore
//! use groundstation_esp32::config::ConfigStore;
//! use groundstation_esp32::persistence_host::FileStorage;
//!
//! let mut store = ConfigStore::new(FileStorage::at_default_path()?);
//! store.init()?;
//! store.print_config();
//! ```

use crate::storage::{ConfigStorage, StorageError};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default configuration file path.
///
/// Returns `~/.groundstation-esp32/config.bin`
pub fn default_config_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".groundstation-esp32")
        .join("config.bin"))
}

/// File-backed configuration storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at a specific path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at [`default_config_path`].
    pub fn at_default_path() -> Result<Self, StorageError> {
        let path = default_config_path()
            .map_err(|e| StorageError::Unavailable(format!("no config path: {}", e)))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for FileStorage {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("[storage] No config file found at {:?}", self.path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, record: &[u8]) -> Result<(), StorageError> {
        // Create parent directory if needed
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Replace the record in one rename step
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, record)?;
        fs::rename(&tmp, &self.path)?;

        // Verify write by reading back
        let read_back = fs::read(&self.path)?;
        if read_back != record {
            return Err(StorageError::VerificationFailed);
        }

        info!("[storage] Config saved to {:?}", self.path);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_config_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir()
            .join(format!("groundstation-test-{}-{}", pid, id))
            .join("config.bin")
    }

    #[test]
    fn test_missing_file_reads_none() {
        let mut storage = FileStorage::new(unique_config_path());
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let path = unique_config_path();
        let mut storage = FileStorage::new(&path);

        storage.write(b"0.04record").expect("Failed to save");
        let loaded = storage.read().expect("Failed to load");
        assert_eq!(loaded.as_deref(), Some(&b"0.04record"[..]));
        assert!(!path.with_extension("tmp").exists());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let path = unique_config_path();
        let mut storage = FileStorage::new(&path);

        storage.write(b"first record").unwrap();
        storage.write(b"second").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some(&b"second"[..]));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_erase() {
        let path = unique_config_path();
        let mut storage = FileStorage::new(&path);

        storage.write(b"record").unwrap();
        storage.erase().unwrap();
        assert!(storage.read().unwrap().is_none());
        // Erasing twice is fine
        storage.erase().unwrap();

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
