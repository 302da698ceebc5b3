//! Persistent storage for the configuration record.
//!
//! The store always reads and writes the complete record through a
//! [`ConfigStorage`] backend:
//!
//! - [`MemoryStorage`] - in-memory backend for tests and storage-less sessions
//! - [`FileStorage`](crate::persistence_host::FileStorage) - host file backend
//! - `NvsStorage` - ESP32 NVS backend (`esp32` feature)

use std::fmt;

/// Backend holding one configuration record.
pub trait ConfigStorage {
    /// Read the stored record, `None` if nothing has been stored.
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the stored record.
    ///
    /// Must complete (or fail) before returning.
    fn write(&mut self, record: &[u8]) -> Result<(), StorageError>;

    /// Remove the stored record.
    fn erase(&mut self) -> Result<(), StorageError>;
}

impl<S: ConfigStorage + ?Sized> ConfigStorage for &mut S {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read()
    }

    fn write(&mut self, record: &[u8]) -> Result<(), StorageError> {
        (**self).write(record)
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        (**self).erase()
    }
}

/// In-memory storage backend.
///
/// Counts writes so callers can observe persistence traffic. Can be switched
/// offline to simulate an unavailable medium.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    record: Option<Vec<u8>>,
    writes: usize,
    offline: bool,
}

impl MemoryStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend already holding `record`.
    pub fn with_record(record: Vec<u8>) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Currently stored record.
    pub fn record(&self) -> Option<&[u8]> {
        self.record.as_deref()
    }

    /// Make every following operation fail with [`StorageError::Unavailable`].
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline {
            return Err(StorageError::Unavailable("memory storage offline".into()));
        }
        Ok(())
    }
}

impl ConfigStorage for MemoryStorage {
    fn read(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_online()?;
        Ok(self.record.clone())
    }

    fn write(&mut self, record: &[u8]) -> Result<(), StorageError> {
        self.check_online()?;
        self.record = Some(record.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        self.check_online()?;
        self.record = None;
        Ok(())
    }
}

/// Storage failures. These are the only hard errors of the store.
#[derive(Debug)]
pub enum StorageError {
    /// Storage medium cannot be used.
    Unavailable(String),
    /// Data read back after a write did not match.
    VerificationFailed,
    /// I/O error from a file backend.
    Io(std::io::Error),
    /// ESP-IDF error from the NVS backend.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "storage unavailable: {}", msg),
            Self::VerificationFailed => write!(f, "storage verification failed"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_roundtrip() {
        let mut storage = MemoryStorage::new();
        assert!(storage.read().unwrap().is_none());

        storage.write(b"record").unwrap();
        assert_eq!(storage.read().unwrap().as_deref(), Some(&b"record"[..]));
        assert_eq!(storage.writes(), 1);

        storage.erase().unwrap();
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_memory_offline() {
        let mut storage = MemoryStorage::new();
        storage.set_offline(true);
        assert!(matches!(storage.read(), Err(StorageError::Unavailable(_))));
        assert!(matches!(
            storage.write(b"x"),
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn test_borrowed_backend() {
        let mut storage = MemoryStorage::new();
        {
            let mut borrowed = &mut storage;
            ConfigStorage::write(&mut borrowed, b"abc").unwrap();
        }
        assert_eq!(storage.record(), Some(&b"abc"[..]));
    }
}
