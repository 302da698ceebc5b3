//! Provisioning form contract.
//!
//! The provisioning host renders [`FormField`] descriptors and posts back the
//! raw text of each input. [`validate_submission`] checks every submitted
//! value against its field declaration and either returns the complete set
//! of changes or every field that failed; nothing is applied on failure.
//!
//! Form semantics:
//! - fields missing from the submission keep their stored value, unless the
//!   field is required and nothing is stored yet
//! - numeric input is trimmed; text and passwords are kept byte for byte
//! - an empty password keeps the stored secret (secrets are never echoed)
//! - a flag is set when present with any non-empty value, cleared when absent

use super::codec::{self, encode_flag, CodecError};
use super::fields::{FieldGroup, FieldId, FieldKind, MIN_AP_PASSWORD_LEN};
use super::snapshot::ConfigSnapshot;
use super::wifi::{self, CredentialError};
use crate::board::BoardTable;
use crate::storage::StorageError;
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// One input of the provisioning form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub id: FieldId,
    /// Input name.
    pub name: &'static str,
    pub label: &'static str,
    pub group: FieldGroup,
    pub kind: FieldKind,
    /// Current contents (always empty for passwords).
    pub value: String,
    pub max_len: usize,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    /// `(value, label)` pairs for select inputs.
    pub options: Vec<(String, &'static str)>,
}

/// Describe every field of `snapshot` for rendering.
pub fn form_fields(snapshot: &ConfigSnapshot, boards: &BoardTable) -> Vec<FormField> {
    snapshot
        .iter()
        .map(|(id, raw)| {
            let spec = id.spec();
            let value = match spec.kind {
                FieldKind::Password => String::new(),
                _ => raw.to_string(),
            };
            let options = match spec.kind {
                FieldKind::Select => boards
                    .iter()
                    .map(|b| (b.id.index().to_string(), b.label))
                    .collect(),
                _ => Vec::new(),
            };
            FormField {
                id,
                name: spec.name,
                label: spec.label,
                group: spec.group,
                kind: spec.kind,
                value,
                max_len: spec.max_len(),
                required: spec.required,
                min: spec.range.map(|(min, _)| min),
                max: spec.range.map(|(_, max)| max),
                step: spec.step,
                options,
            }
        })
        .collect()
}

/// Validate a form submission against the current snapshot.
///
/// Returns the `(field, new raw text)` pairs to store, or every field error.
pub fn validate_submission(
    current: &ConfigSnapshot,
    submitted: &HashMap<String, String>,
) -> Result<Vec<(FieldId, String)>, Vec<FieldError>> {
    for key in submitted.keys() {
        if FieldId::from_name(key).is_none() {
            debug!("[config] Ignoring unknown form field '{}'", key);
        }
    }

    let mut changes = Vec::new();
    let mut errors = Vec::new();

    for id in FieldId::ALL {
        let spec = id.spec();
        // Text and secrets are stored byte for byte.
        let raw = submitted.get(spec.name).map(|v| match spec.kind {
            FieldKind::Float | FieldKind::Integer | FieldKind::Select => v.trim(),
            _ => v.as_str(),
        });
        let missing = spec.required && current.raw(id).is_empty();

        let text = match (spec.kind, raw) {
            (FieldKind::Flag, raw) => {
                Ok(Some(encode_flag(raw.map_or(false, |v| !v.is_empty())).to_string()))
            }
            (FieldKind::Password, None | Some("")) if missing => Err(FieldErrorKind::Required),
            (FieldKind::Password, None | Some("")) => Ok(None),
            (_, None) if missing => Err(FieldErrorKind::Required),
            (_, None) => Ok(None),
            (_, Some(value)) if spec.required && value.trim().is_empty() => {
                Err(FieldErrorKind::Required)
            }
            (_, Some("")) => Ok(Some(String::new())),
            (_, Some(value)) => validate_value(id, value).map(Some),
        };

        match text {
            Ok(Some(text)) if text != current.raw(id) => changes.push((id, text)),
            Ok(_) => {}
            Err(kind) => errors.push(FieldError { field: id, kind }),
        }
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(errors)
    }
}

/// Validate one non-empty submitted value and return the text to store.
fn validate_value(id: FieldId, value: &str) -> Result<String, FieldErrorKind> {
    let spec = id.spec();

    let text = match spec.kind {
        FieldKind::Float => {
            let number = value
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or(FieldErrorKind::NotANumber)?;
            check_range(spec.range, number as f64)?;
            if value.len() <= spec.max_len() {
                value.to_string()
            } else {
                codec::encode_float(number, spec.max_len()).map_err(|_| {
                    FieldErrorKind::TooLong {
                        len: value.len(),
                        max: spec.max_len(),
                    }
                })?
            }
        }
        FieldKind::Integer | FieldKind::Select => {
            let number = value
                .parse::<i64>()
                .map_err(|_| FieldErrorKind::NotANumber)?;
            check_range(spec.range, number as f64).map_err(|e| match spec.kind {
                FieldKind::Select => FieldErrorKind::UnknownOption,
                _ => e,
            })?;
            codec::encode_int(number)
        }
        FieldKind::Text | FieldKind::Password | FieldKind::Flag => value.to_string(),
    };

    if text.len() > spec.max_len() {
        return Err(FieldErrorKind::TooLong {
            len: text.len(),
            max: spec.max_len(),
        });
    }
    if text.contains('\0') {
        return Err(FieldErrorKind::InvalidText);
    }

    match id {
        FieldId::WifiSsid => wifi::validate_ssid(&text).map_err(FieldErrorKind::Credential)?,
        FieldId::WifiPassword => {
            wifi::validate_password(&text).map_err(FieldErrorKind::Credential)?
        }
        FieldId::ApPassword if text.len() < MIN_AP_PASSWORD_LEN => {
            return Err(FieldErrorKind::TooShort {
                len: text.len(),
                min: MIN_AP_PASSWORD_LEN,
            })
        }
        _ => {}
    }

    Ok(text)
}

fn check_range(range: Option<(f64, f64)>, number: f64) -> Result<(), FieldErrorKind> {
    match range {
        Some((min, max)) if number < min || number > max => {
            Err(FieldErrorKind::OutOfRange { min, max })
        }
        _ => Ok(()),
    }
}

/// Why a submitted field was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldErrorKind {
    /// Field is required but was empty.
    Required,
    /// Value is not a number.
    NotANumber,
    /// Number outside the allowed range.
    OutOfRange { min: f64, max: f64 },
    /// Text does not fit the field.
    TooLong { len: usize, max: usize },
    /// Text shorter than allowed.
    TooShort { len: usize, min: usize },
    /// Text contains a NUL byte.
    InvalidText,
    /// Select value is not one of the options.
    UnknownOption,
    /// WiFi credential rule violated.
    Credential(CredentialError),
}

impl From<CodecError> for FieldErrorKind {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::TooLong { len, max } => Self::TooLong { len, max },
            _ => Self::InvalidText,
        }
    }
}

/// A rejected form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: FieldId,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.field)?;
        match &self.kind {
            FieldErrorKind::Required => write!(f, "required"),
            FieldErrorKind::NotANumber => write!(f, "not a number"),
            FieldErrorKind::OutOfRange { min, max } => {
                write!(f, "out of range ({} to {})", min, max)
            }
            FieldErrorKind::TooLong { len, max } => {
                write!(f, "too long: {} bytes (max {})", len, max)
            }
            FieldErrorKind::TooShort { len, min } => {
                write!(f, "too short: {} bytes (min {})", len, min)
            }
            FieldErrorKind::InvalidText => write!(f, "contains a NUL byte"),
            FieldErrorKind::UnknownOption => write!(f, "unknown option"),
            FieldErrorKind::Credential(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FieldError {}

/// Failure to apply a form submission.
#[derive(Debug)]
pub enum SubmitError {
    /// One or more fields were rejected; nothing was changed.
    Rejected(Vec<FieldError>),
    /// Fields were accepted but could not be persisted.
    Storage(StorageError),
}

impl SubmitError {
    /// Field errors, empty for storage failures.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Rejected(errors) => errors,
            Self::Storage(_) => &[],
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(errors) => {
                write!(f, "{} field(s) rejected", errors.len())?;
                for error in errors {
                    write!(f, "; {}", error)?;
                }
                Ok(())
            }
            Self::Storage(e) => write!(f, "failed to save configuration: {}", e),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Rejected(_) => None,
        }
    }
}

impl From<StorageError> for SubmitError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn configured() -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::defaults();
        snap.set_raw(FieldId::Latitude, "40.4168").unwrap();
        snap.set_raw(FieldId::Longitude, "-3.7038").unwrap();
        snap.set_raw(FieldId::MqttUser, "station").unwrap();
        snap.set_raw(FieldId::MqttPass, "hunter22").unwrap();
        snap
    }

    /// The flags as a browser would post them for the defaults.
    fn default_flags() -> Vec<(&'static str, &'static str)> {
        vec![
            ("tx", "selected"),
            ("remote_tune", "selected"),
            ("telemetry3rd", "selected"),
            ("auto_update", "selected"),
        ]
    }

    #[test]
    fn test_unchanged_submission_has_no_changes() {
        let snap = configured();
        let changes = validate_submission(&snap, &submission(&default_flags())).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_latitude_out_of_range() {
        let snap = configured();
        let errors = validate_submission(&snap, &submission(&[("lat", "95.0")])).unwrap_err();
        assert_eq!(
            errors,
            vec![FieldError {
                field: FieldId::Latitude,
                kind: FieldErrorKind::OutOfRange {
                    min: -90.0,
                    max: 90.0
                },
            }]
        );
    }

    #[test]
    fn test_longitude_accepts_full_range() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("lng", "-179.5"));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(changes, vec![(FieldId::Longitude, "-179.5".to_string())]);
    }

    #[test]
    fn test_long_float_is_shortened() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("lat", "12.25000000001"));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(changes, vec![(FieldId::Latitude, "12.25".to_string())]);
    }

    #[test]
    fn test_port_not_a_number() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("mqtt_port", "abc")])).unwrap_err();
        assert_eq!(errors[0].field, FieldId::MqttPort);
        assert_eq!(errors[0].kind, FieldErrorKind::NotANumber);
    }

    #[test]
    fn test_port_out_of_range() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("mqtt_port", "65536")])).unwrap_err();
        assert!(matches!(errors[0].kind, FieldErrorKind::OutOfRange { .. }));
    }

    #[test]
    fn test_board_must_exist() {
        let snap = configured();
        let errors = validate_submission(&snap, &submission(&[("board", "10")])).unwrap_err();
        assert_eq!(errors[0].field, FieldId::Board);
        assert_eq!(errors[0].kind, FieldErrorKind::UnknownOption);

        let mut pairs = default_flags();
        pairs.push(("board", "9"));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(changes, vec![(FieldId::Board, "9".to_string())]);
    }

    #[test]
    fn test_all_errors_reported() {
        let snap = configured();
        let errors = validate_submission(
            &snap,
            &submission(&[("lat", "95"), ("oled_bright", "101"), ("mqtt_user", "")]),
        )
        .unwrap_err();
        let fields: Vec<FieldId> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![FieldId::Latitude, FieldId::MqttUser, FieldId::OledBright]
        );
    }

    #[test]
    fn test_empty_password_keeps_secret() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("mqtt_pass", ""));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_required_password_missing() {
        let snap = ConfigSnapshot::defaults();
        let errors = validate_submission(&snap, &submission(&[])).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == FieldId::MqttPass && e.kind == FieldErrorKind::Required));
    }

    #[test]
    fn test_required_fields_missing_on_first_submission() {
        let snap = ConfigSnapshot::defaults();
        let errors = validate_submission(
            &snap,
            &submission(&[
                ("wifi_ssid", "HomeNet"),
                ("wifi_password", "password123"),
                ("mqtt_pass", "hunter22"),
            ]),
        )
        .unwrap_err();
        let fields: Vec<FieldId> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![FieldId::Latitude, FieldId::Longitude, FieldId::MqttUser]
        );
        assert!(errors.iter().all(|e| e.kind == FieldErrorKind::Required));
    }

    #[test]
    fn test_blank_required_text_rejected() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("mqtt_user", "   ")])).unwrap_err();
        assert_eq!(errors[0].field, FieldId::MqttUser);
        assert_eq!(errors[0].kind, FieldErrorKind::Required);
    }

    #[test]
    fn test_credentials_kept_byte_for_byte() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("wifi_ssid", " Cafe Net "));
        pairs.push(("wifi_password", " pass word 1 "));
        pairs.push(("mqtt_pass", "  p  "));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(
            changes,
            vec![
                (FieldId::WifiSsid, " Cafe Net ".to_string()),
                (FieldId::WifiPassword, " pass word 1 ".to_string()),
                (FieldId::MqttPass, "  p  ".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_input_trimmed() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("mqtt_port", " 1883 "));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(changes, vec![(FieldId::MqttPort, "1883".to_string())]);
    }

    #[test]
    fn test_absent_flag_clears() {
        let snap = configured();
        let changes = validate_submission(&snap, &submission(&[])).unwrap();
        let cleared: Vec<FieldId> = changes.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            cleared,
            vec![
                FieldId::AllowTx,
                FieldId::RemoteTune,
                FieldId::Telemetry3rd,
                FieldId::AutoUpdate
            ]
        );
        assert!(changes.iter().all(|(_, text)| text.is_empty()));
    }

    #[test]
    fn test_any_checkbox_value_sets_flag() {
        let snap = configured();
        let mut pairs = default_flags();
        pairs.push(("test", "on"));
        let changes = validate_submission(&snap, &submission(&pairs)).unwrap();
        assert_eq!(changes, vec![(FieldId::TestMode, "selected".to_string())]);
    }

    #[test]
    fn test_wifi_password_rules() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("wifi_password", "short")])).unwrap_err();
        assert!(matches!(
            errors[0].kind,
            FieldErrorKind::Credential(CredentialError::PasswordTooShort { .. })
        ));
    }

    #[test]
    fn test_ap_password_too_short() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("ap_password", "1234")])).unwrap_err();
        assert_eq!(
            errors[0].kind,
            FieldErrorKind::TooShort { len: 4, min: 8 }
        );
    }

    #[test]
    fn test_text_too_long() {
        let snap = configured();
        let long = "a".repeat(31);
        let errors =
            validate_submission(&snap, &submission(&[("mqtt_server", &long)])).unwrap_err();
        assert_eq!(
            errors[0].kind,
            FieldErrorKind::TooLong { len: 31, max: 30 }
        );
    }

    #[test]
    fn test_nul_rejected() {
        let snap = configured();
        let errors =
            validate_submission(&snap, &submission(&[("tz", "CET\0")])).unwrap_err();
        assert_eq!(errors[0].kind, FieldErrorKind::InvalidText);
    }

    #[test]
    fn test_form_fields_hide_passwords() {
        let snap = configured();
        let fields = form_fields(&snap, &BoardTable::build());
        let pass = fields.iter().find(|f| f.id == FieldId::MqttPass).unwrap();
        assert!(pass.value.is_empty());
        let user = fields.iter().find(|f| f.id == FieldId::MqttUser).unwrap();
        assert_eq!(user.value, "station");
    }

    #[test]
    fn test_form_fields_constraints() {
        let fields = form_fields(&ConfigSnapshot::defaults(), &BoardTable::build());
        assert_eq!(fields.len(), FieldId::ALL.len());

        let lat = fields.iter().find(|f| f.id == FieldId::Latitude).unwrap();
        assert!(lat.required);
        assert_eq!(lat.min, Some(-90.0));
        assert_eq!(lat.max, Some(90.0));
        assert_eq!(lat.max_len, 9);

        let board = fields.iter().find(|f| f.id == FieldId::Board).unwrap();
        assert_eq!(board.options.len(), crate::board::NUM_BOARDS);
        assert_eq!(board.options[0].0, "0");
    }
}
