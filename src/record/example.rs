//! `tf.train.Example` payloads.
//!
//! Only the subset of the protobuf schema needed for trajectory records is
//! understood:
//!
//! ```text
//! Example   { Features features = 1; }
//! Features  { map<string, Feature> feature = 1; }
//! Feature   { oneof { BytesList bytes_list = 1; FloatList float_list = 2;
//!                     Int64List int64_list = 3; } }
//! BytesList { repeated bytes value = 1; }
//! ```
//!
//! Every trajectory field is stored as a `bytes_list`; other list kinds are
//! rejected.

use std::collections::BTreeMap;

use crate::tensor::TensorData;
use crate::util::{Error, Result};

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// One field of a protobuf message.
enum WireValue<'a> {
    Varint,
    Fixed,
    Bytes(&'a [u8]),
}

/// Cursor over protobuf wire data.
struct ProtoReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ProtoReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::record("truncated varint"))?;
            self.pos += 1;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::record("varint too long"))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::record("truncated field"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Next (field number, value), or None at end of message.
    fn next_field(&mut self) -> Result<Option<(u64, WireValue<'a>)>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let tag = self.read_varint()?;
        let field = tag >> 3;
        let value = match (tag & 0x7) as u8 {
            WIRE_VARINT => {
                self.read_varint()?;
                WireValue::Varint
            }
            WIRE_FIXED64 => {
                self.take(8)?;
                WireValue::Fixed
            }
            WIRE_LEN => {
                let len = usize::try_from(self.read_varint()?)
                    .map_err(|_| Error::record("length overflows usize"))?;
                WireValue::Bytes(self.take(len)?)
            }
            WIRE_FIXED32 => {
                self.take(4)?;
                WireValue::Fixed
            }
            other => return Err(Error::record(format!("unsupported wire type {}", other))),
        };
        Ok(Some((field, value)))
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn write_len_field(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    write_varint(out, (field << 3) | WIRE_LEN as u64);
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// One trajectory record: field name to its encoded byte strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTrajectory {
    fields: BTreeMap<String, Vec<Vec<u8>>>,
}

impl RawTrajectory {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the byte strings of a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Vec<u8>>) {
        self.fields.insert(name.into(), values);
    }

    /// Store tensor elements as a single little-endian byte string.
    pub fn insert_tensor(&mut self, name: impl Into<String>, data: &TensorData) {
        self.insert(name, vec![data.to_le_bytes()]);
    }

    /// Byte strings of a field.
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Field names present in the record.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode a serialized `tf.train.Example`.
    pub fn from_example_bytes(bytes: &[u8]) -> Result<Self> {
        let mut record = Self::new();

        let mut example = ProtoReader::new(bytes);
        while let Some((field, value)) = example.next_field()? {
            let WireValue::Bytes(features) = value else { continue };
            if field != 1 {
                continue;
            }

            let mut features = ProtoReader::new(features);
            while let Some((field, value)) = features.next_field()? {
                let WireValue::Bytes(entry) = value else { continue };
                if field != 1 {
                    continue;
                }
                let (name, values) = parse_map_entry(entry)?;
                record.insert(name, values);
            }
        }

        Ok(record)
    }

    /// Encode as a serialized `tf.train.Example`.
    pub fn to_example_bytes(&self) -> Vec<u8> {
        let mut features = Vec::new();
        for (name, values) in &self.fields {
            let mut bytes_list = Vec::new();
            for v in values {
                write_len_field(&mut bytes_list, 1, v);
            }
            let mut feature = Vec::new();
            write_len_field(&mut feature, 1, &bytes_list);

            let mut entry = Vec::new();
            write_len_field(&mut entry, 1, name.as_bytes());
            write_len_field(&mut entry, 2, &feature);

            write_len_field(&mut features, 1, &entry);
        }

        let mut example = Vec::new();
        write_len_field(&mut example, 1, &features);
        example
    }
}

/// Parse one `map<string, Feature>` entry into its name and byte strings.
fn parse_map_entry(entry: &[u8]) -> Result<(String, Vec<Vec<u8>>)> {
    let mut key = None;
    let mut values = Vec::new();

    let mut reader = ProtoReader::new(entry);
    while let Some((field, value)) = reader.next_field()? {
        match (field, value) {
            (1, WireValue::Bytes(k)) => {
                let k = std::str::from_utf8(k)
                    .map_err(|e| Error::record(format!("feature name is not UTF-8: {}", e)))?;
                key = Some(k.to_string());
            }
            (2, WireValue::Bytes(feature)) => {
                values = parse_feature(feature, key.as_deref())?;
            }
            _ => {}
        }
    }

    let key = key.ok_or_else(|| Error::record("feature map entry without a name"))?;
    Ok((key, values))
}

fn parse_feature(feature: &[u8], name: Option<&str>) -> Result<Vec<Vec<u8>>> {
    let mut values = Vec::new();
    let mut reader = ProtoReader::new(feature);
    while let Some((field, value)) = reader.next_field()? {
        match (field, value) {
            (1, WireValue::Bytes(list)) => {
                let mut list = ProtoReader::new(list);
                while let Some((f, v)) = list.next_field()? {
                    if let (1, WireValue::Bytes(bytes)) = (f, v) {
                        values.push(bytes.to_vec());
                    }
                }
            }
            (2, _) | (3, _) => {
                return Err(Error::record(format!(
                    "feature '{}' is not a bytes_list",
                    name.unwrap_or("?")
                )));
            }
            _ => {}
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_roundtrip() {
        let mut raw = RawTrajectory::new();
        raw.insert("cells", vec![vec![1, 0, 0, 0, 2, 0, 0, 0]]);
        raw.insert("velocity", vec![vec![0xAA; 300], vec![0x55; 4]]);
        raw.insert("empty", vec![]);

        let bytes = raw.to_example_bytes();
        let back = RawTrajectory::from_example_bytes(&bytes).unwrap();
        assert_eq!(back, raw);
        assert_eq!(back.get("velocity").unwrap().len(), 2);
        assert_eq!(back.field_names().collect::<Vec<_>>(), vec!["cells", "empty", "velocity"]);
    }

    #[test]
    fn test_varint_multibyte() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
        assert_eq!(ProtoReader::new(&buf).read_varint().unwrap(), 300);
    }

    #[test]
    fn test_rejects_float_list() {
        // Feature { float_list { value: [1.0] } }
        let mut float_list = Vec::new();
        write_len_field(&mut float_list, 1, &1.0f32.to_le_bytes());
        let mut feature = Vec::new();
        write_len_field(&mut feature, 2, &float_list);
        let mut entry = Vec::new();
        write_len_field(&mut entry, 1, b"pressure");
        write_len_field(&mut entry, 2, &feature);
        let mut features = Vec::new();
        write_len_field(&mut features, 1, &entry);
        let mut example = Vec::new();
        write_len_field(&mut example, 1, &features);

        let err = RawTrajectory::from_example_bytes(&example).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(msg) if msg.contains("pressure")));
    }

    #[test]
    fn test_truncated_payload() {
        let mut raw = RawTrajectory::new();
        raw.insert("a", vec![vec![1, 2, 3, 4]]);
        let bytes = raw.to_example_bytes();
        let err = RawTrajectory::from_example_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }
}
