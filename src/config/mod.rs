//! Station configuration management.
//!
//! # Components
//!
//! - [`codec`] - typed values to/from fixed-capacity text buffers
//! - [`fields`] - field declarations, capacities and defaults
//! - [`snapshot`] - in-memory field buffers and the persisted record
//! - [`form`] - provisioning form descriptors and submission validation
//! - [`wifi`] - WiFi credential rules
//! - [`store`] - [`ConfigStore`] lifecycle and typed accessors

pub mod codec;
pub mod fields;
pub mod form;
pub mod snapshot;
pub mod store;
pub mod wifi;

pub use codec::{CodecError, FieldBuffer, Value};
pub use fields::{FieldGroup, FieldId, FieldKind, FieldSpec, CONFIG_VERSION, FIELDS};
pub use form::{FieldError, FieldErrorKind, FormField, SubmitError};
pub use snapshot::{ConfigSnapshot, RecordError};
pub use store::{ConfigReport, ConfigStore, InitOutcome, LoadOutcome, OperationalFlag};
pub use wifi::{
    CredentialError, WifiCredentials, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN,
};
