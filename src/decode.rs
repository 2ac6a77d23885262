//! Schema-driven decoding of one trajectory record.
//!
//! Every feature in the schema is reinterpreted from its raw little-endian
//! bytes, reshaped to its declared shape and then aligned on a common
//! per-timestep leading axis according to its [`FieldKind`]:
//!
//! - `static` tensors are tiled `trajectory_length` times,
//! - `dynamic` tensors are kept as they are,
//! - `dynamic_varlen` tensors become ragged, split by their `length_<name>`
//!   companion field.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::record::RawTrajectory;
use crate::schema::{DatasetSchema, FieldKind};
use crate::tensor::{FieldValue, RaggedTensor, Tensor, TensorData};
use crate::util::{DType, Error, Result, ShapeSpec};

/// Prefix of the companion field holding row lengths of a varlen field.
pub const LENGTH_PREFIX: &str = "length_";

/// A fully decoded trajectory: field name to tensor or ragged tensor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedTrajectory {
    fields: BTreeMap<String, FieldValue>,
}

impl DecodedTrajectory {
    /// Create an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// True if the field was decoded.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing was decoded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode one raw record according to the schema.
pub fn decode(raw: &RawTrajectory, schema: &DatasetSchema) -> Result<DecodedTrajectory> {
    let mut out = DecodedTrajectory::new();

    for field in schema.features.values() {
        let tensor = decode_field(raw, &field.name, field.dtype, &field.shape)?;

        if field.for_sim {
            out.insert(field.name.clone(), FieldValue::Dense(tensor));
            continue;
        }

        let value = match &field.kind {
            FieldKind::Static => FieldValue::Dense(tensor.tile_leading(schema.trajectory_length)),
            FieldKind::Dynamic => FieldValue::Dense(tensor),
            FieldKind::DynamicVarlen => {
                let lengths = decode_lengths(raw, &field.name)?;
                FieldValue::Ragged(RaggedTensor::from_row_lengths(tensor, &lengths)?)
            }
            FieldKind::Unknown(kind) => {
                return Err(Error::UnsupportedFieldKind {
                    field: field.name.clone(),
                    kind: kind.clone(),
                });
            }
        };

        tracing::trace!("decoded '{}' ({}, {} frames)", field.name, field.kind, value.num_frames());
        out.insert(field.name.clone(), value);
    }

    Ok(out)
}

/// Reinterpret a field's byte strings as `dtype` and reshape to `shape`.
pub fn decode_field(
    raw: &RawTrajectory,
    name: &str,
    dtype: DType,
    shape: &ShapeSpec,
) -> Result<Tensor> {
    let data = decode_raw(raw, name, dtype)?;
    let resolved = shape.resolve(data.len()).map_err(|e| match e {
        Error::ShapeMismatch(msg) => Error::shape(format!("field '{}': {}", name, msg)),
        other => other,
    })?;
    Tensor::new(resolved, data)
}

/// Bit-for-bit reinterpretation of all byte strings of a field.
///
/// A field absent from the record yields zero elements.
fn decode_raw(raw: &RawTrajectory, name: &str, dtype: DType) -> Result<TensorData> {
    let blobs = raw.get(name).unwrap_or(&[]);
    let width = dtype.num_bytes();

    for blob in blobs {
        if blob.len() % width != 0 {
            return Err(Error::CorruptEncoding {
                field: name.to_string(),
                len: blob.len(),
                width,
            });
        }
    }

    let bytes: Cow<'_, [u8]> = match blobs {
        [single] => Cow::Borrowed(single.as_slice()),
        many => Cow::Owned(many.concat()),
    };

    TensorData::from_le_bytes(dtype, &bytes).ok_or_else(|| Error::CorruptEncoding {
        field: name.to_string(),
        len: bytes.len(),
        width,
    })
}

/// Row lengths of a varlen field, stored as a flat int32 array.
fn decode_lengths(raw: &RawTrajectory, name: &str) -> Result<Vec<i32>> {
    let length_name = format!("{}{}", LENGTH_PREFIX, name);
    match decode_raw(raw, &length_name, DType::Int32)? {
        TensorData::Int32(lengths) => Ok(lengths),
        other => Err(Error::TypeMismatch {
            expected: DType::Int32.name().into(),
            actual: other.dtype().name().into(),
        }),
    }
}
