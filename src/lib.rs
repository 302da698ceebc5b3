//! Ground station ESP32 firmware library.
//!
//! This library contains the configuration core of the station: the field
//! codec, the board profile table, the persistent configuration store and
//! the device mode machine. Everything except the storage and WiFi backends
//! is platform-independent and tested on the host.

pub mod board;
pub mod config;
pub mod console;
#[cfg(feature = "esp32")]
pub mod esp_host;
pub mod mode;
#[cfg(feature = "esp32")]
pub mod persistence;
#[cfg(not(target_os = "espidf"))]
pub mod persistence_host;
pub mod provisioning;
pub mod station;
pub mod storage;

// Re-export commonly used items
pub use board::{BoardId, BoardProfile, BoardTable, DisplayProbe};
pub use config::{ConfigReport, ConfigStore, FieldId, InitOutcome, OperationalFlag};
pub use mode::{DeviceMode, ModeEvent, ModeMachine, TransitionError, AP_TIMEOUT};
pub use provisioning::{ConfigPortal, NetworkEvent, ProvisioningHost};
pub use station::Station;
pub use storage::{ConfigStorage, MemoryStorage, StorageError};
