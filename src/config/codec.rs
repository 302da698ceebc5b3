//! Field codec.
//!
//! Converts between typed values and the fixed-capacity text buffers used
//! both in the persisted record and in form transport. Decoding is forgiving:
//! malformed text yields a zero/false fallback instead of an error, so a
//! corrupted buffer can never take the device down.
//!
//! # Example
//!
//! ```
//! use groundstation_esp32::config::codec::{decode_flag, decode_int, encode_flag};
//!
//! assert!(decode_flag(encode_flag(true)));
//! assert!(!decode_flag("yes"));
//! assert_eq!(decode_int("abc"), 0);
//! ```

use super::fields::{FieldKind, FieldSpec, CB_SELECTED_STR};
use std::fmt;
use zeroize::Zeroize;

/// Decimal places tried when encoding a float, most precise first.
const MAX_FLOAT_DECIMALS: usize = 6;

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i64),
    Flag(bool),
    Text(String),
}

/// Decode a float buffer. Malformed or non-finite input decodes to `0.0`.
pub fn decode_float(buf: &str) -> f32 {
    buf.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Decode an integer buffer. Malformed input decodes to `0`.
///
/// The result is not range checked; callers indexing a table must guard it.
pub fn decode_int(buf: &str) -> i64 {
    buf.trim().parse::<i64>().unwrap_or(0)
}

/// Decode a flag buffer. Only the exact sentinel is `true`.
pub fn decode_flag(buf: &str) -> bool {
    buf == CB_SELECTED_STR
}

/// Encode a flag: the sentinel for `true`, empty for `false`.
pub fn encode_flag(value: bool) -> &'static str {
    if value {
        CB_SELECTED_STR
    } else {
        ""
    }
}

/// Encode an integer as decimal text.
pub fn encode_int(value: i64) -> String {
    value.to_string()
}

/// Encode a float in at most `max_len` characters.
///
/// Precision is reduced until the text fits; trailing zeros are dropped.
pub fn encode_float(value: f32, max_len: usize) -> Result<String, CodecError> {
    if !value.is_finite() {
        return Err(CodecError::NotFinite);
    }
    for decimals in (0..=MAX_FLOAT_DECIMALS).rev() {
        let mut text = format!("{:.*}", decimals, value);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        if text == "-0" {
            text = "0".to_string();
        }
        if text.len() <= max_len {
            return Ok(text);
        }
    }
    Err(CodecError::TooLong {
        len: format!("{:.0}", value).len(),
        max: max_len,
    })
}

/// Decode a buffer according to its field kind.
pub fn decode(buf: &str, kind: FieldKind) -> Value {
    match kind {
        FieldKind::Float => Value::Float(decode_float(buf)),
        FieldKind::Integer | FieldKind::Select => Value::Int(decode_int(buf)),
        FieldKind::Flag => Value::Flag(decode_flag(buf)),
        FieldKind::Text | FieldKind::Password => Value::Text(buf.to_string()),
    }
}

/// Encode a value into buffer text for the given field.
pub fn encode(value: &Value, spec: &FieldSpec) -> Result<String, CodecError> {
    let text = match (value, spec.kind) {
        (Value::Float(v), FieldKind::Float) => encode_float(*v, spec.max_len())?,
        (Value::Int(v), FieldKind::Integer | FieldKind::Select) => encode_int(*v),
        (Value::Flag(v), FieldKind::Flag) => encode_flag(*v).to_string(),
        (Value::Text(v), FieldKind::Text | FieldKind::Password) => v.clone(),
        _ => return Err(CodecError::KindMismatch { expected: spec.kind }),
    };
    if text.len() > spec.max_len() {
        return Err(CodecError::TooLong {
            len: text.len(),
            max: spec.max_len(),
        });
    }
    Ok(text)
}

/// Whether `buf` satisfies the decode rule of `kind` (or is empty).
pub fn is_well_formed(buf: &str, kind: FieldKind) -> bool {
    if buf.is_empty() {
        return true;
    }
    match kind {
        FieldKind::Float => buf.trim().parse::<f32>().map_or(false, f32::is_finite),
        FieldKind::Integer | FieldKind::Select => buf.trim().parse::<i64>().is_ok(),
        FieldKind::Flag => decode_flag(buf),
        FieldKind::Text | FieldKind::Password => true,
    }
}

/// A bounded text buffer.
///
/// Holds at most `capacity - 1` bytes so the persisted form always has room
/// for a terminating NUL. Contents are zeroed when overwritten or dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldBuffer {
    text: String,
    capacity: usize,
}

impl FieldBuffer {
    /// Create an empty buffer.
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a buffer holding `text`.
    pub fn with_text(capacity: usize, text: &str) -> Result<Self, CodecError> {
        let mut buf = Self::new(capacity);
        buf.set(text)?;
        Ok(buf)
    }

    /// Replace the contents. Rejects text that does not fit.
    pub fn set(&mut self, text: &str) -> Result<(), CodecError> {
        if text.len() > self.max_len() {
            return Err(CodecError::TooLong {
                len: text.len(),
                max: self.max_len(),
            });
        }
        if text.as_bytes().contains(&0) {
            return Err(CodecError::EmbeddedNul);
        }
        self.text.zeroize();
        self.text.push_str(text);
        Ok(())
    }

    /// Empty the buffer.
    pub fn clear(&mut self) {
        self.text.zeroize();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Size of the buffer in bytes including the terminating NUL.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_len(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    /// Append the fixed-size, NUL-padded form of this buffer to `out`.
    pub fn write_padded(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.text.as_bytes());
        out.resize(out.len() + self.capacity - self.text.len(), 0);
    }

    /// Read a buffer from its fixed-size, NUL-padded form.
    ///
    /// Text ends at the first NUL. Content that is not valid UTF-8 reads as
    /// empty.
    pub fn read_padded(capacity: usize, bytes: &[u8]) -> Self {
        let window = &bytes[..bytes.len().min(capacity.saturating_sub(1))];
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        let text = std::str::from_utf8(&window[..end]).unwrap_or("");
        let mut buf = Self::new(capacity);
        buf.text.push_str(text);
        buf
    }
}

impl Drop for FieldBuffer {
    fn drop(&mut self) {
        self.text.zeroize();
    }
}

impl fmt::Debug for FieldBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBuffer")
            .field("len", &self.text.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Errors from encoding a value into a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Text does not fit the buffer.
    TooLong { len: usize, max: usize },
    /// Text contains a NUL byte.
    EmbeddedNul,
    /// Float value is NaN or infinite.
    NotFinite,
    /// Value kind does not match the field kind.
    KindMismatch { expected: FieldKind },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len, max } => {
                write!(f, "value too long: {} bytes (max {})", len, max)
            }
            Self::EmbeddedNul => write!(f, "value contains a NUL byte"),
            Self::NotFinite => write!(f, "value is not a finite number"),
            Self::KindMismatch { expected } => {
                write!(f, "value does not match field kind {:?}", expected)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fields::FieldId;

    // ==================== Flag Tests ====================

    #[test]
    fn test_flag_round_trip() {
        assert!(decode_flag(encode_flag(true)));
        assert!(!decode_flag(encode_flag(false)));
        assert_eq!(encode_flag(false), "");
    }

    #[test]
    fn test_flag_malformed_is_false() {
        for buf in ["on", "true", "1", "Selected", "selected ", " selected", "sel"] {
            assert!(!decode_flag(buf), "{:?} should decode to false", buf);
        }
    }

    // ==================== Numeric Tests ====================

    #[test]
    fn test_decode_float() {
        assert_eq!(decode_float("41.5"), 41.5);
        assert_eq!(decode_float(" -3.25 "), -3.25);
        assert_eq!(decode_float(""), 0.0);
        assert_eq!(decode_float("north"), 0.0);
        assert_eq!(decode_float("NaN"), 0.0);
        assert_eq!(decode_float("inf"), 0.0);
    }

    #[test]
    fn test_decode_int() {
        assert_eq!(decode_int("8883"), 8883);
        assert_eq!(decode_int("abc"), 0);
        assert_eq!(decode_int(""), 0);
        assert_eq!(decode_int("12abc"), 0);
        assert_eq!(decode_int("-4"), -4);
    }

    #[test]
    fn test_encode_float_fits_capacity() {
        assert_eq!(encode_float(40.5, 9).unwrap(), "40.5");
        assert_eq!(encode_float(-179.123456, 9).unwrap(), "-179.1235");
        assert_eq!(encode_float(2.0, 9).unwrap(), "2");
        assert_eq!(encode_float(-0.0, 9).unwrap(), "0");
    }

    #[test]
    fn test_encode_float_rejects_non_finite() {
        assert_eq!(encode_float(f32::NAN, 9), Err(CodecError::NotFinite));
    }

    #[test]
    fn test_encode_float_too_large() {
        assert!(matches!(
            encode_float(1.0e12, 9),
            Err(CodecError::TooLong { .. })
        ));
    }

    // ==================== Typed Encode/Decode Tests ====================

    #[test]
    fn test_encode_checks_kind() {
        let spec = FieldId::MqttPort.spec();
        assert_eq!(encode(&Value::Int(1883), spec).unwrap(), "1883");
        assert!(matches!(
            encode(&Value::Flag(true), spec),
            Err(CodecError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_encode_checks_capacity() {
        let spec = FieldId::MqttPort.spec();
        assert!(matches!(
            encode(&Value::Int(1_000_000), spec),
            Err(CodecError::TooLong { len: 7, max: 5 })
        ));
    }

    #[test]
    fn test_decode_by_kind() {
        assert_eq!(decode("selected", FieldKind::Flag), Value::Flag(true));
        assert_eq!(decode("7", FieldKind::Select), Value::Int(7));
        assert_eq!(decode("x", FieldKind::Float), Value::Float(0.0));
        assert_eq!(
            decode("broker", FieldKind::Text),
            Value::Text("broker".to_string())
        );
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed("", FieldKind::Float));
        assert!(is_well_formed("1.5", FieldKind::Float));
        assert!(!is_well_formed("1.5.2", FieldKind::Float));
        assert!(!is_well_formed("on", FieldKind::Flag));
        assert!(is_well_formed("anything", FieldKind::Text));
    }

    // ==================== FieldBuffer Tests ====================

    #[test]
    fn test_buffer_capacity_enforced() {
        let mut buf = FieldBuffer::new(6);
        assert!(buf.set("65535").is_ok());
        assert_eq!(
            buf.set("655350"),
            Err(CodecError::TooLong { len: 6, max: 5 })
        );
        assert_eq!(buf.as_str(), "65535");
    }

    #[test]
    fn test_buffer_rejects_nul() {
        let mut buf = FieldBuffer::new(9);
        assert_eq!(buf.set("a\0b"), Err(CodecError::EmbeddedNul));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_buffer_padded_layout() {
        let buf = FieldBuffer::with_text(6, "8883").unwrap();
        let mut out = Vec::new();
        buf.write_padded(&mut out);
        assert_eq!(out, b"8883\0\0");

        let restored = FieldBuffer::read_padded(6, &out);
        assert_eq!(restored, buf);
    }

    #[test]
    fn test_buffer_read_without_terminator() {
        // A full slot with no NUL still leaves room for one.
        let restored = FieldBuffer::read_padded(4, b"abcd");
        assert_eq!(restored.as_str(), "abc");
    }

    #[test]
    fn test_buffer_read_invalid_utf8() {
        let restored = FieldBuffer::read_padded(4, &[0xff, 0xfe, 0, 0]);
        assert!(restored.is_empty());
    }
}
