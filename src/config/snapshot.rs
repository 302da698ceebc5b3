//! Configuration snapshot and its persisted record.
//!
//! Record layout, all slots fixed size and NUL padded:
//!
//! ```text
//! [version:4][field_0:cap_0]...[field_17:cap_17][crc32:4 LE]
//! ```
//!
//! Fields appear in the declared order of [`FIELDS`](super::fields::FIELDS).
//! The CRC covers everything before it. A record whose length, version tag
//! or checksum does not match is rejected as a whole; there is no partial
//! migration.

use super::codec::{self, FieldBuffer};
use super::fields::{
    record_len, FieldGroup, FieldId, CONFIG_VERSION, CONFIG_VERSION_LEN, FIELDS, FIELD_COUNT,
};
use crc::{Crc, CRC_32_ISO_HDLC};
use log::warn;
use std::fmt;

/// CRC32 algorithm (ISO HDLC / Ethernet / ZIP).
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// All configuration field buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    buffers: [FieldBuffer; FIELD_COUNT],
}

impl ConfigSnapshot {
    /// A snapshot holding the compiled-in defaults.
    pub fn defaults() -> Self {
        Self {
            buffers: std::array::from_fn(|i| {
                let spec = &FIELDS[i];
                let mut buf = FieldBuffer::new(spec.capacity);
                // Defaults are checked against capacity by the field table tests.
                let _ = buf.set(spec.default);
                buf
            }),
        }
    }

    /// Raw buffer contents of a field.
    pub fn raw(&self, id: FieldId) -> &str {
        self.buffers[id.index()].as_str()
    }

    /// Replace the raw contents of a field.
    ///
    /// Only capacity is checked here; semantic validation belongs to the form.
    pub fn set_raw(&mut self, id: FieldId, text: &str) -> Result<(), codec::CodecError> {
        self.buffers[id.index()].set(text)
    }

    /// Restore one field to its default.
    pub fn reset_field(&mut self, id: FieldId) {
        let spec = id.spec();
        let buf = &mut self.buffers[id.index()];
        buf.clear();
        let _ = buf.set(spec.default);
    }

    /// Restore every field of `group` to its default.
    pub fn reset_group(&mut self, group: FieldGroup) {
        for id in FieldId::ALL {
            if id.spec().group == group {
                self.reset_field(id);
            }
        }
    }

    /// Iterate fields with their raw contents, in record order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &str)> {
        FieldId::ALL
            .iter()
            .map(move |&id| (id, self.buffers[id.index()].as_str()))
    }

    /// Serialize to a persisted record tagged with [`CONFIG_VERSION`].
    pub fn to_record(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(record_len());
        let mut tag = [0u8; CONFIG_VERSION_LEN];
        tag[..CONFIG_VERSION.len()].copy_from_slice(CONFIG_VERSION.as_bytes());
        out.extend_from_slice(&tag);
        for buf in &self.buffers {
            buf.write_padded(&mut out);
        }
        let crc = CRC32.checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Deserialize a persisted record.
    ///
    /// Buffers whose text does not satisfy their field's decode rule are
    /// cleared, so every loaded buffer is either empty or decodable.
    pub fn from_record(bytes: &[u8]) -> Result<Self, RecordError> {
        let expected = record_len();
        if bytes.len() != expected {
            return Err(RecordError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let tag = read_tag(&bytes[..CONFIG_VERSION_LEN]);
        if tag != CONFIG_VERSION {
            return Err(RecordError::VersionMismatch { found: tag });
        }

        let (body, crc_bytes) = bytes.split_at(expected - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(crc_bytes);
        let stored = u32::from_le_bytes(stored);
        let computed = CRC32.checksum(body);
        if stored != computed {
            return Err(RecordError::ChecksumMismatch { stored, computed });
        }

        let mut offset = CONFIG_VERSION_LEN;
        let buffers = std::array::from_fn(|i| {
            let spec = &FIELDS[i];
            let mut buf = FieldBuffer::read_padded(spec.capacity, &body[offset..]);
            offset += spec.capacity;
            if !codec::is_well_formed(buf.as_str(), spec.kind) {
                warn!(
                    "[config] Stored value of '{}' is malformed, clearing",
                    spec.name
                );
                buf.clear();
            }
            buf
        });

        Ok(Self { buffers })
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::defaults()
    }
}

fn read_tag(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Reasons a persisted record is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Record size differs from the current layout.
    LengthMismatch { expected: usize, actual: usize },
    /// Record was written by firmware with another version tag.
    VersionMismatch { found: String },
    /// Record is corrupted (e.g. interrupted write).
    ChecksumMismatch { stored: u32, computed: u32 },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "record length {} (expected {})", actual, expected)
            }
            Self::VersionMismatch { found } => write!(
                f,
                "record version '{}' (expected '{}')",
                found, CONFIG_VERSION
            ),
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "record checksum {:08x} (computed {:08x})",
                stored, computed
            ),
        }
    }
}

impl std::error::Error for RecordError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::defaults();
        snap.set_raw(FieldId::Latitude, "40.4168").unwrap();
        snap.set_raw(FieldId::Longitude, "-3.7038").unwrap();
        snap.set_raw(FieldId::MqttUser, "station").unwrap();
        snap.set_raw(FieldId::MqttPass, "hunter22").unwrap();
        snap.set_raw(FieldId::Board, "4").unwrap();
        snap.set_raw(FieldId::TestMode, "selected").unwrap();
        snap
    }

    #[test]
    fn test_defaults() {
        let snap = ConfigSnapshot::defaults();
        assert_eq!(snap.raw(FieldId::MqttServer), "mqtt.tinygs.com");
        assert_eq!(snap.raw(FieldId::MqttPort), "8883");
        assert_eq!(snap.raw(FieldId::OledBright), "100");
        assert_eq!(snap.raw(FieldId::AllowTx), "selected");
        assert_eq!(snap.raw(FieldId::TestMode), "");
        assert_eq!(snap.raw(FieldId::Latitude), "");
    }

    #[test]
    fn test_record_has_fixed_size() {
        assert_eq!(ConfigSnapshot::defaults().to_record().len(), record_len());
        assert_eq!(configured().to_record().len(), record_len());
    }

    #[test]
    fn test_record_restores_snapshot() {
        let snap = configured();
        let restored = ConfigSnapshot::from_record(&snap.to_record()).unwrap();
        assert_eq!(restored, snap);
    }

    #[test]
    fn test_record_starts_with_version() {
        let record = ConfigSnapshot::defaults().to_record();
        assert_eq!(&record[..4], CONFIG_VERSION.as_bytes());
    }

    #[test]
    fn test_stale_version_rejected() {
        let mut record = configured().to_record();
        record[..4].copy_from_slice(b"0.03");
        assert_eq!(
            ConfigSnapshot::from_record(&record),
            Err(RecordError::VersionMismatch {
                found: "0.03".to_string()
            })
        );
    }

    #[test]
    fn test_truncated_record_rejected() {
        let record = configured().to_record();
        let result = ConfigSnapshot::from_record(&record[..record.len() - 1]);
        assert!(matches!(result, Err(RecordError::LengthMismatch { .. })));
    }

    #[test]
    fn test_corrupted_record_rejected() {
        let mut record = configured().to_record();
        record[10] ^= 0x5a;
        let result = ConfigSnapshot::from_record(&record);
        assert!(matches!(result, Err(RecordError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_malformed_numeric_cleared_on_load() {
        // Build a record by hand with garbage in the port slot.
        let mut snap = configured();
        snap.set_raw(FieldId::MqttPort, "abc").unwrap();
        let restored = ConfigSnapshot::from_record(&snap.to_record()).unwrap();
        assert_eq!(restored.raw(FieldId::MqttPort), "");
        assert_eq!(restored.raw(FieldId::MqttUser), "station");
    }

    #[test]
    fn test_reset_group_only_touches_group() {
        let mut snap = configured();
        snap.set_raw(FieldId::WifiSsid, "HomeNet").unwrap();
        snap.set_raw(FieldId::WifiPassword, "password123").unwrap();
        snap.reset_group(FieldGroup::Provisioning);

        assert_eq!(snap.raw(FieldId::WifiSsid), "");
        assert_eq!(snap.raw(FieldId::WifiPassword), "");
        assert_eq!(snap.raw(FieldId::Latitude), "40.4168");
        assert_eq!(snap.raw(FieldId::Board), "4");
    }

    #[test]
    fn test_iter_in_record_order() {
        let snap = ConfigSnapshot::defaults();
        let ids: Vec<FieldId> = snap.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, FieldId::ALL.to_vec());
    }
}
