//! Typed flat storage behind a tensor.

use std::fmt::Write as _;

use byteorder::{ByteOrder, LittleEndian};
use half::f16;

use crate::util::{DType, Error, Result};

/// Flat, row-major element storage of one dtype.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    Float16(Vec<f16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Uint8(Vec<u8>),
    Uint16(Vec<u16>),
    Uint32(Vec<u32>),
    Uint64(Vec<u64>),
}

/// Evaluate `$body` with `$v` bound to the inner vector, whatever its type.
macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::Float16($v) => $body,
            TensorData::Float32($v) => $body,
            TensorData::Float64($v) => $body,
            TensorData::Int8($v) => $body,
            TensorData::Int16($v) => $body,
            TensorData::Int32($v) => $body,
            TensorData::Int64($v) => $body,
            TensorData::Uint8($v) => $body,
            TensorData::Uint16($v) => $body,
            TensorData::Uint32($v) => $body,
            TensorData::Uint64($v) => $body,
        }
    };
}

/// Like `with_data!`, but `$body` yields a new vector of the same type.
macro_rules! map_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::Float16($v) => TensorData::Float16($body),
            TensorData::Float32($v) => TensorData::Float32($body),
            TensorData::Float64($v) => TensorData::Float64($body),
            TensorData::Int8($v) => TensorData::Int8($body),
            TensorData::Int16($v) => TensorData::Int16($body),
            TensorData::Int32($v) => TensorData::Int32($body),
            TensorData::Int64($v) => TensorData::Int64($body),
            TensorData::Uint8($v) => TensorData::Uint8($body),
            TensorData::Uint16($v) => TensorData::Uint16($body),
            TensorData::Uint32($v) => TensorData::Uint32($body),
            TensorData::Uint64($v) => TensorData::Uint64($body),
        }
    };
}

impl TensorData {
    /// Reinterpret little-endian bytes as elements of `dtype`.
    ///
    /// Returns None if the byte length is not a multiple of the element width.
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Option<Self> {
        let width = dtype.num_bytes();
        if bytes.len() % width != 0 {
            return None;
        }
        let n = bytes.len() / width;

        let data = match dtype {
            DType::Float16 => {
                let mut bits = vec![0u16; n];
                LittleEndian::read_u16_into(bytes, &mut bits);
                Self::Float16(bits.into_iter().map(f16::from_bits).collect())
            }
            DType::Float32 => {
                let mut v = vec![0f32; n];
                LittleEndian::read_f32_into(bytes, &mut v);
                Self::Float32(v)
            }
            DType::Float64 => {
                let mut v = vec![0f64; n];
                LittleEndian::read_f64_into(bytes, &mut v);
                Self::Float64(v)
            }
            DType::Int8 => Self::Int8(bytemuck::cast_slice::<u8, i8>(bytes).to_vec()),
            DType::Int16 => {
                let mut v = vec![0i16; n];
                LittleEndian::read_i16_into(bytes, &mut v);
                Self::Int16(v)
            }
            DType::Int32 => {
                let mut v = vec![0i32; n];
                LittleEndian::read_i32_into(bytes, &mut v);
                Self::Int32(v)
            }
            DType::Int64 => {
                let mut v = vec![0i64; n];
                LittleEndian::read_i64_into(bytes, &mut v);
                Self::Int64(v)
            }
            DType::Uint8 => Self::Uint8(bytes.to_vec()),
            DType::Uint16 => {
                let mut v = vec![0u16; n];
                LittleEndian::read_u16_into(bytes, &mut v);
                Self::Uint16(v)
            }
            DType::Uint32 => {
                let mut v = vec![0u32; n];
                LittleEndian::read_u32_into(bytes, &mut v);
                Self::Uint32(v)
            }
            DType::Uint64 => {
                let mut v = vec![0u64; n];
                LittleEndian::read_u64_into(bytes, &mut v);
                Self::Uint64(v)
            }
        };
        Some(data)
    }

    /// Encode elements as little-endian bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float16(v) => {
                let bits: Vec<u16> = v.iter().map(|x| x.to_bits()).collect();
                let mut out = vec![0u8; bits.len() * 2];
                LittleEndian::write_u16_into(&bits, &mut out);
                out
            }
            Self::Float32(v) => {
                let mut out = vec![0u8; v.len() * 4];
                LittleEndian::write_f32_into(v, &mut out);
                out
            }
            Self::Float64(v) => {
                let mut out = vec![0u8; v.len() * 8];
                LittleEndian::write_f64_into(v, &mut out);
                out
            }
            Self::Int8(v) => bytemuck::cast_slice::<i8, u8>(v).to_vec(),
            Self::Int16(v) => {
                let mut out = vec![0u8; v.len() * 2];
                LittleEndian::write_i16_into(v, &mut out);
                out
            }
            Self::Int32(v) => {
                let mut out = vec![0u8; v.len() * 4];
                LittleEndian::write_i32_into(v, &mut out);
                out
            }
            Self::Int64(v) => {
                let mut out = vec![0u8; v.len() * 8];
                LittleEndian::write_i64_into(v, &mut out);
                out
            }
            Self::Uint8(v) => v.clone(),
            Self::Uint16(v) => {
                let mut out = vec![0u8; v.len() * 2];
                LittleEndian::write_u16_into(v, &mut out);
                out
            }
            Self::Uint32(v) => {
                let mut out = vec![0u8; v.len() * 4];
                LittleEndian::write_u32_into(v, &mut out);
                out
            }
            Self::Uint64(v) => {
                let mut out = vec![0u8; v.len() * 8];
                LittleEndian::write_u64_into(v, &mut out);
                out
            }
        }
    }

    /// Little-endian bytes as VTK expects them (float16 widened to float32).
    pub fn to_vtk_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float16(v) => {
                let wide: Vec<f32> = v.iter().map(|x| x.to_f32()).collect();
                Self::Float32(wide).to_le_bytes()
            }
            other => other.to_le_bytes(),
        }
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Float16(_) => DType::Float16,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
            Self::Int8(_) => DType::Int8,
            Self::Int16(_) => DType::Int16,
            Self::Int32(_) => DType::Int32,
            Self::Int64(_) => DType::Int64,
            Self::Uint8(_) => DType::Uint8,
            Self::Uint16(_) => DType::Uint16,
            Self::Uint32(_) => DType::Uint32,
            Self::Uint64(_) => DType::Uint64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of elements `start..end`.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Self {
        map_data!(self, v => v[start..end].to_vec())
    }

    /// The whole buffer repeated `times` times.
    pub(crate) fn repeat(&self, times: usize) -> Self {
        map_data!(self, v => v.repeat(times))
    }

    /// Widen each row of `width` elements to `target` elements, zero-filled.
    pub(crate) fn pad_rows(&self, width: usize, target: usize) -> Self {
        map_data!(self, v => {
            let rows = if width == 0 { 0 } else { v.len() / width };
            let mut out = Vec::with_capacity(rows * target);
            for row in v.chunks(width.max(1)).take(rows) {
                out.extend_from_slice(row);
                out.resize(out.len() + (target - width), Default::default());
            }
            out
        })
    }

    /// Convert integer elements to i64 (for connectivity).
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        let mismatch = |actual: DType| Error::TypeMismatch {
            expected: "integer".into(),
            actual: actual.name().into(),
        };
        Ok(match self {
            Self::Float16(_) | Self::Float32(_) | Self::Float64(_) => {
                return Err(mismatch(self.dtype()));
            }
            Self::Int8(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Int16(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Int32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Int64(v) => v.clone(),
            Self::Uint8(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Uint16(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Uint32(v) => v.iter().map(|&x| x as i64).collect(),
            Self::Uint64(v) => v
                .iter()
                .map(|&x| i64::try_from(x).map_err(|_| mismatch(DType::Uint64)))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Append elements as whitespace-separated text.
    pub fn write_ascii(&self, out: &mut String) {
        match self {
            Self::Float16(v) => {
                for x in v {
                    let _ = write!(out, "{} ", x.to_f32());
                }
            }
            other => with_data!(other, v => {
                for x in v {
                    let _ = write!(out, "{} ", x);
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_le_bytes_f32_bit_exact() {
        let values = [1.5f32, -0.0, f32::MIN_POSITIVE, 3.25e7];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

        let data = TensorData::from_le_bytes(DType::Float32, &bytes).unwrap();
        match &data {
            TensorData::Float32(v) => {
                for (a, b) in v.iter().zip(values.iter()) {
                    assert_eq!(a.to_bits(), b.to_bits());
                }
            }
            other => panic!("unexpected variant {:?}", other.dtype()),
        }
        assert_eq!(data.to_le_bytes(), bytes);
    }

    #[test]
    fn test_from_le_bytes_rejects_partial_element() {
        assert!(TensorData::from_le_bytes(DType::Int32, &[0u8; 7]).is_none());
        assert!(TensorData::from_le_bytes(DType::Float64, &[0u8; 12]).is_none());
        assert!(TensorData::from_le_bytes(DType::Uint8, &[0u8; 3]).is_some());
    }

    #[test]
    fn test_float16_widening() {
        let data = TensorData::Float16(vec![f16::from_f32(0.5), f16::from_f32(2.0)]);
        let bytes = data.to_vtk_le_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_pad_rows() {
        let data = TensorData::Float32(vec![1.0, 2.0, 3.0, 4.0]);
        let padded = data.pad_rows(2, 3);
        assert_eq!(padded, TensorData::Float32(vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]));
    }

    #[test]
    fn test_to_i64() {
        let data = TensorData::Int32(vec![0, 5, -1]);
        assert_eq!(data.to_i64_vec().unwrap(), vec![0, 5, -1]);
        assert!(TensorData::Float32(vec![1.0]).to_i64_vec().is_err());
        assert!(TensorData::Uint64(vec![u64::MAX]).to_i64_vec().is_err());
    }

    #[test]
    fn test_write_ascii() {
        let mut s = String::new();
        TensorData::Int32(vec![1, 2, 3]).write_ascii(&mut s);
        assert_eq!(s.trim(), "1 2 3");

        let mut s = String::new();
        TensorData::Float32(vec![0.5, 1.0]).write_ascii(&mut s);
        assert_eq!(s.trim(), "0.5 1");
    }
}
