//! # Binary Telemetry Codec
//!
//! Encodes named integer, float and string values into a compact
//! self-describing byte sequence, and decodes such sequences back.
//!
//! Field names are not transmitted. Each record carries a 32-bit hash of its
//! name; the encoder records `hash -> name` in a key map that must be shared
//! out-of-band with the decoder. Without it, decoded fields are exposed under
//! synthetic names of the form `field_<hex hash>`.
//!
//! ## Record Layout
//! ```text
//! [KeyHash(4)] [TypeId(1)] [Payload]
//! ```
//! | type_id | payload |
//! |---|---|
//! | 0 | 1-byte length + UTF-8 bytes |
//! | 1 / 11 | i8 / u8 |
//! | 2 / 12 | i16 / u16 |
//! | 3 / 13 | i32 / u32 |
//! | 4 / 14 | i64 / u64 |
//! | 5 / 6 | f32 / f64 |
//!
//! ## Usage
//! ```rust
//! use cubesat_link::core::codec::{BinaryDecoder, BinaryEncoder};
//!
//! # fn main() -> cubesat_link::error::Result<()> {
//! let mut encoder = BinaryEncoder::new();
//! encoder.add_float("temperature", 23.5, false);
//! encoder.add_int("battery_level", 85, None)?;
//! let data = encoder.to_bytes();
//!
//! let decoder = BinaryDecoder::new(&data, Some(&encoder.key_map()));
//! assert_eq!(decoder.get_float("temperature"), Some(23.5));
//! assert_eq!(decoder.get_int("battery_level"), Some(85));
//! # Ok(())
//! # }
//! ```

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Size of the `key_hash + type_id` prefix of every record
pub const RECORD_HEADER_SIZE: usize = 5;

/// Default and absolute maximum encoded string length (1-byte length prefix)
pub const MAX_STRING_LENGTH: usize = 255;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Wire type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    String = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    F32 = 5,
    F64 = 6,
    U8 = 11,
    U16 = 12,
    U32 = 13,
    U64 = 14,
}

impl TypeId {
    /// Get the tag byte written on the wire
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Look up a tag byte; `None` for unrecognized tags
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TypeId::String),
            1 => Some(TypeId::I8),
            2 => Some(TypeId::I16),
            3 => Some(TypeId::I32),
            4 => Some(TypeId::I64),
            5 => Some(TypeId::F32),
            6 => Some(TypeId::F64),
            11 => Some(TypeId::U8),
            12 => Some(TypeId::U16),
            13 => Some(TypeId::U32),
            14 => Some(TypeId::U64),
            _ => None,
        }
    }

    /// Payload size for fixed-width types; `None` for length-prefixed strings
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            TypeId::String => None,
            TypeId::I8 | TypeId::U8 => Some(1),
            TypeId::I16 | TypeId::U16 => Some(2),
            TypeId::I32 | TypeId::U32 | TypeId::F32 => Some(4),
            TypeId::I64 | TypeId::U64 | TypeId::F64 => Some(8),
        }
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Any integer width; `i128` holds both `i64::MIN` and `u64::MAX`
    Int(i128),
    Float(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Hash a field name into its 32-bit wire key (FNV-1a over the UTF-8 bytes).
///
/// Collisions are not disambiguated: two names with the same hash decode to
/// whichever name the key map holds.
pub fn key_hash(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Synthetic name used when a hash is missing from the key map
pub fn synthetic_name(hash: u32) -> String {
    format!("field_{hash:08x}")
}

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Int { value: i128, type_id: TypeId },
    Float { value: f64, double_precision: bool },
    Str(Vec<u8>),
}

/// Encodes named values into the compact record format.
///
/// Insertion order is preserved; re-adding a key replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct BinaryEncoder {
    fields: Vec<(String, Field)>,
    positions: HashMap<String, usize>,
    key_map: HashMap<u32, String>,
}

impl BinaryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the `hash -> name` map built by [`to_bytes`](Self::to_bytes).
    pub fn key_map(&self) -> HashMap<u32, String> {
        self.key_map.clone()
    }

    /// Number of fields added so far
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Add an integer value.
    ///
    /// With `size == None` the smallest width that can hold the value is
    /// chosen: 1 byte for `-128..=255`, 2 for `-32768..=65535`, 4 for
    /// `-2^31..=2^32-1`, 8 otherwise. Within the width the signed variant is
    /// used when the value fits it, the unsigned variant otherwise.
    pub fn add_int(
        &mut self,
        key: impl Into<String>,
        value: impl Into<i128>,
        size: Option<u8>,
    ) -> Result<()> {
        let value = value.into();
        let size = size.unwrap_or_else(|| determine_int_size(value));
        let type_id = int_type_for(size, value)?;
        self.insert(key.into(), Field::Int { value, type_id });
        Ok(())
    }

    /// Add a float value, as `f32` unless `double_precision` is set.
    pub fn add_float(&mut self, key: impl Into<String>, value: f64, double_precision: bool) {
        self.insert(
            key.into(),
            Field::Float {
                value,
                double_precision,
            },
        );
    }

    /// Add a length-prefixed UTF-8 string.
    ///
    /// `max_length` defaults to 255. Strings longer than the 1-byte prefix can
    /// describe are rejected regardless of `max_length`.
    pub fn add_string(
        &mut self,
        key: impl Into<String>,
        value: &str,
        max_length: Option<usize>,
    ) -> Result<()> {
        self.add_bytes(key, value.as_bytes(), max_length)
    }

    /// Add raw bytes, encoded with the string record layout.
    pub fn add_bytes(
        &mut self,
        key: impl Into<String>,
        value: &[u8],
        max_length: Option<usize>,
    ) -> Result<()> {
        let max = max_length.unwrap_or(MAX_STRING_LENGTH);
        if value.len() > max {
            return Err(ProtocolError::StringTooLong {
                len: value.len(),
                max,
            });
        }
        if value.len() > MAX_STRING_LENGTH {
            return Err(ProtocolError::StringTooLong {
                len: value.len(),
                max: MAX_STRING_LENGTH,
            });
        }
        self.insert(key.into(), Field::Str(value.to_vec()));
        Ok(())
    }

    /// Serialize all fields in insertion order, updating the key map.
    pub fn to_bytes(&mut self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        for (key, field) in &self.fields {
            let hash = key_hash(key);
            self.key_map.insert(hash, key.clone());
            encode_field(&mut buf, hash, field);
        }

        trace!(
            fields = self.fields.len(),
            bytes = buf.len(),
            "Encoded telemetry fields"
        );
        buf.freeze()
    }

    /// Exact size of the blob [`to_bytes`](Self::to_bytes) will produce
    pub fn encoded_len(&self) -> usize {
        self.fields
            .iter()
            .map(|(_, field)| {
                RECORD_HEADER_SIZE
                    + match field {
                        Field::Int { type_id, .. } => type_id.fixed_size().unwrap_or(0),
                        Field::Float {
                            double_precision, ..
                        } => {
                            if *double_precision {
                                8
                            } else {
                                4
                            }
                        }
                        Field::Str(bytes) => 1 + bytes.len(),
                    }
            })
            .sum()
    }

    fn insert(&mut self, key: String, field: Field) {
        match self.positions.get(&key) {
            Some(&index) => self.fields[index].1 = field,
            None => {
                self.positions.insert(key.clone(), self.fields.len());
                self.fields.push((key, field));
            }
        }
    }
}

// A width is taken when the value fits either its signed or unsigned range.
fn determine_int_size(value: i128) -> u8 {
    if (i128::from(i8::MIN)..=i128::from(u8::MAX)).contains(&value) {
        1
    } else if (i128::from(i16::MIN)..=i128::from(u16::MAX)).contains(&value) {
        2
    } else if (i128::from(i32::MIN)..=i128::from(u32::MAX)).contains(&value) {
        4
    } else {
        8
    }
}

fn int_type_for(size: u8, value: i128) -> Result<TypeId> {
    let (signed, unsigned, min, max, umax) = match size {
        1 => (
            TypeId::I8,
            TypeId::U8,
            i128::from(i8::MIN),
            i128::from(i8::MAX),
            i128::from(u8::MAX),
        ),
        2 => (
            TypeId::I16,
            TypeId::U16,
            i128::from(i16::MIN),
            i128::from(i16::MAX),
            i128::from(u16::MAX),
        ),
        4 => (
            TypeId::I32,
            TypeId::U32,
            i128::from(i32::MIN),
            i128::from(i32::MAX),
            i128::from(u32::MAX),
        ),
        8 => (
            TypeId::I64,
            TypeId::U64,
            i128::from(i64::MIN),
            i128::from(i64::MAX),
            i128::from(u64::MAX),
        ),
        other => return Err(ProtocolError::UnsupportedIntSize(other)),
    };

    if (min..=max).contains(&value) {
        Ok(signed)
    } else if (0..=umax).contains(&value) {
        Ok(unsigned)
    } else {
        Err(ProtocolError::IntOutOfRange { value, size })
    }
}

// Range was checked by int_type_for, so the narrowing casts below are exact.
fn encode_field(buf: &mut BytesMut, hash: u32, field: &Field) {
    buf.put_u32(hash);
    match field {
        Field::Str(bytes) => {
            buf.put_u8(TypeId::String.as_byte());
            buf.put_u8(bytes.len() as u8);
            buf.put_slice(bytes);
        }
        Field::Int { value, type_id } => {
            buf.put_u8(type_id.as_byte());
            let v = *value;
            match type_id {
                TypeId::I8 => buf.put_i8(v as i8),
                TypeId::U8 => buf.put_u8(v as u8),
                TypeId::I16 => buf.put_i16(v as i16),
                TypeId::U16 => buf.put_u16(v as u16),
                TypeId::I32 => buf.put_i32(v as i32),
                TypeId::U32 => buf.put_u32(v as u32),
                TypeId::I64 => buf.put_i64(v as i64),
                TypeId::U64 => buf.put_u64(v as u64),
                TypeId::String | TypeId::F32 | TypeId::F64 => {}
            }
        }
        Field::Float {
            value,
            double_precision,
        } => {
            if *double_precision {
                buf.put_u8(TypeId::F64.as_byte());
                buf.put_f64(*value);
            } else {
                buf.put_u8(TypeId::F32.as_byte());
                buf.put_f32(*value as f32);
            }
        }
    }
}

/// Decodes a record blob into named values.
///
/// Parsing stops silently at the first truncated record or unknown type id;
/// everything before it is kept. Invalid UTF-8 in strings is replaced.
#[derive(Debug, Clone, Default)]
pub struct BinaryDecoder {
    fields: HashMap<String, Value>,
    order: Vec<String>,
}

impl BinaryDecoder {
    /// Parse `data`, naming fields through `key_map` when given.
    pub fn new(data: &[u8], key_map: Option<&HashMap<u32, String>>) -> Self {
        let mut decoder = Self::default();
        decoder.parse(data, key_map);
        decoder
    }

    fn parse(&mut self, data: &[u8], key_map: Option<&HashMap<u32, String>>) {
        let mut buf = data;

        while buf.remaining() >= RECORD_HEADER_SIZE {
            let hash = buf.get_u32();
            let tag = buf.get_u8();

            let Some(value) = decode_value(&mut buf, tag) else {
                trace!(
                    type_id = tag,
                    remaining = buf.remaining(),
                    "Stopping decode at malformed record"
                );
                break;
            };

            let name = key_map
                .and_then(|map| map.get(&hash).cloned())
                .unwrap_or_else(|| synthetic_name(hash));

            if self.fields.insert(name.clone(), value).is_none() {
                self.order.push(name);
            }
        }
    }

    /// Get the raw decoded value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a value as an integer. Floats truncate toward zero, strings are parsed.
    pub fn get_int(&self, key: &str) -> Option<i128> {
        match self.fields.get(key)? {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.is_finite() => Some(v.trunc() as i128),
            Value::Float(_) => None,
            Value::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Get a value as a float. Strings are parsed.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Get a value rendered as a string
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(ToString::to_string)
    }

    /// Get all decoded fields
    pub fn get_all(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    /// Iterate fields in the order they first appeared in the blob
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|name| self.fields.get(name).map(|value| (name.as_str(), value)))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the decoder, returning its fields
    pub fn into_map(self) -> HashMap<String, Value> {
        self.fields
    }
}

fn decode_value(buf: &mut &[u8], tag: u8) -> Option<Value> {
    let type_id = TypeId::from_byte(tag)?;

    let Some(size) = type_id.fixed_size() else {
        if buf.remaining() < 1 {
            return None;
        }
        let len = usize::from(buf.get_u8());
        if buf.remaining() < len {
            return None;
        }
        let text = String::from_utf8_lossy(&buf[..len]).into_owned();
        buf.advance(len);
        return Some(Value::Str(text));
    };

    if buf.remaining() < size {
        return None;
    }

    let value = match type_id {
        TypeId::I8 => Value::Int(i128::from(buf.get_i8())),
        TypeId::U8 => Value::Int(i128::from(buf.get_u8())),
        TypeId::I16 => Value::Int(i128::from(buf.get_i16())),
        TypeId::U16 => Value::Int(i128::from(buf.get_u16())),
        TypeId::I32 => Value::Int(i128::from(buf.get_i32())),
        TypeId::U32 => Value::Int(i128::from(buf.get_u32())),
        TypeId::I64 => Value::Int(i128::from(buf.get_i64())),
        TypeId::U64 => Value::Int(i128::from(buf.get_u64())),
        TypeId::F32 => Value::Float(f64::from(buf.get_f32())),
        TypeId::F64 => Value::Float(buf.get_f64()),
        TypeId::String => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::expect_used)]
    fn encoded_type(value: i128) -> u8 {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("v", value, None).expect("add_int");
        encoder.to_bytes()[4]
    }

    #[test]
    fn test_auto_int_sizing() {
        assert_eq!(encoded_type(200), TypeId::U8.as_byte());
        assert_eq!(encoded_type(-5), TypeId::I8.as_byte());
        assert_eq!(encoded_type(127), TypeId::I8.as_byte());
        assert_eq!(encoded_type(40_000), TypeId::U16.as_byte());
        assert_eq!(encoded_type(-300), TypeId::I16.as_byte());
        assert_eq!(encoded_type(3_000_000_000), TypeId::U32.as_byte());
        assert_eq!(encoded_type(-3_000_000_000), TypeId::I64.as_byte());
        assert_eq!(encoded_type(i128::from(u64::MAX)), TypeId::U64.as_byte());
    }

    #[test]
    fn test_explicit_size() {
        let mut encoder = BinaryEncoder::new();
        assert!(encoder.add_int("a", 5, Some(4)).is_ok());
        assert!(matches!(
            encoder.add_int("b", 5, Some(3)),
            Err(ProtocolError::UnsupportedIntSize(3))
        ));
        assert!(matches!(
            encoder.add_int("c", 70_000, Some(2)),
            Err(ProtocolError::IntOutOfRange { size: 2, .. })
        ));
        assert!(matches!(
            encoder.add_int("d", i128::from(u64::MAX) + 1, None),
            Err(ProtocolError::IntOutOfRange { size: 8, .. })
        ));
        assert_eq!(encoder.len(), 1);
    }

    #[test]
    fn test_record_layout() {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("x", 0x0102, None).expect("add_int");
        let bytes = encoder.to_bytes();

        let mut expected = key_hash("x").to_be_bytes().to_vec();
        expected.push(TypeId::I16.as_byte());
        expected.extend_from_slice(&[0x01, 0x02]);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_string_limits() {
        let mut encoder = BinaryEncoder::new();
        assert!(encoder.add_string("ok", &"a".repeat(255), None).is_ok());
        assert!(matches!(
            encoder.add_string("short", "hello", Some(4)),
            Err(ProtocolError::StringTooLong { len: 5, max: 4 })
        ));
        assert!(matches!(
            encoder.add_string("long", &"a".repeat(256), Some(1000)),
            Err(ProtocolError::StringTooLong { len: 256, max: 255 })
        ));
    }

    #[test]
    fn test_replacing_key_keeps_position() {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("first", 1, None).expect("add_int");
        encoder.add_int("second", 2, None).expect("add_int");
        encoder.add_float("first", 1.5, true);
        let bytes = encoder.to_bytes();

        assert_eq!(encoder.len(), 2);
        assert_eq!(&bytes[..4], &key_hash("first").to_be_bytes());
        assert_eq!(bytes[4], TypeId::F64.as_byte());
        assert_eq!(bytes.len(), encoder.encoded_len());
    }

    #[test]
    fn test_key_hash_is_stable() {
        assert_eq!(key_hash(""), 0x811c_9dc5);
        assert_eq!(key_hash("a"), 0xe40c_292c);
        assert_ne!(key_hash("uptime"), key_hash("uptimE"));
    }

    #[test]
    fn test_synthetic_names_without_key_map() {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("battery", 85, None).expect("add_int");
        let decoder = BinaryDecoder::new(&encoder.to_bytes(), None);

        let name = synthetic_name(key_hash("battery"));
        assert_eq!(decoder.get_int(&name), Some(85));
        assert_eq!(decoder.get_int("battery"), None);
    }

    #[test]
    fn test_unknown_type_stops_parsing() {
        let mut encoder = BinaryEncoder::new();
        encoder.add_int("a", 1, None).expect("add_int");
        let mut data = encoder.to_bytes().to_vec();
        data.extend_from_slice(&key_hash("b").to_be_bytes());
        data.push(42);
        data.extend_from_slice(&[0; 8]);

        let decoder = BinaryDecoder::new(&data, Some(&encoder.key_map()));
        assert_eq!(decoder.len(), 1);
        assert_eq!(decoder.get_int("a"), Some(1));
    }

    #[test]
    fn test_best_effort_casts() {
        let mut encoder = BinaryEncoder::new();
        encoder.add_float("f", -2.75, true);
        encoder.add_string("s", "42", None).expect("add_string");
        encoder.add_string("word", "hello", None).expect("add_string");
        encoder.add_int("i", 7, None).expect("add_int");
        let data = encoder.to_bytes();
        let decoder = BinaryDecoder::new(&data, Some(&encoder.key_map()));

        assert_eq!(decoder.get_int("f"), Some(-2));
        assert_eq!(decoder.get_int("s"), Some(42));
        assert_eq!(decoder.get_float("s"), Some(42.0));
        assert_eq!(decoder.get_int("word"), None);
        assert_eq!(decoder.get_float("i"), Some(7.0));
        assert_eq!(decoder.get_string("i").as_deref(), Some("7"));
        assert_eq!(decoder.get_string("missing"), None);
    }
}
