//! Dense and ragged tensors.
//!
//! A [`Tensor`] is a typed, row-major buffer with a concrete [`Shape`]. Most
//! operations work along the leading axis, which for trajectory data is the
//! time axis.

mod data;
mod ragged;

pub use data::TensorData;
pub use ragged::RaggedTensor;

use crate::util::{DType, Error, Result, Shape};

/// Dense tensor: shape plus typed element storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: TensorData,
}

impl Tensor {
    /// Create a tensor, checking the element count against the shape.
    pub fn new(shape: impl Into<Shape>, data: TensorData) -> Result<Self> {
        let shape = shape.into();
        if shape.num_elements() != data.len() {
            return Err(Error::shape(format!(
                "{} elements do not fill shape {}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    /// Tensor shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element storage.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of rows along the leading axis (1 for scalars).
    pub fn num_rows(&self) -> usize {
        self.shape.leading().unwrap_or(1)
    }

    /// Elements per leading-axis row, i.e. the VTK component count.
    pub fn num_components(&self) -> usize {
        self.shape.row_stride()
    }

    /// Repeat the tensor `times` times along its leading axis.
    ///
    /// A tensor of shape `[1, a, b]` becomes `[times, a, b]`. A scalar becomes
    /// a 1-D tensor of length `times`.
    pub fn tile_leading(&self, times: usize) -> Self {
        let shape = match self.shape.leading() {
            Some(lead) => self.shape.with_leading(lead * times),
            None => Shape::from_slice(&[times]),
        };
        Self { shape, data: self.data.repeat(times) }
    }

    /// Rows `start..end` along the leading axis.
    pub fn slice_leading(&self, start: usize, end: usize) -> Result<Self> {
        let rows = self.shape.leading().ok_or_else(|| Error::shape("cannot slice a scalar"))?;
        if start > end || end > rows {
            return Err(Error::shape(format!(
                "rows {}..{} out of range for shape {}",
                start, end, self.shape
            )));
        }
        let stride = self.shape.row_stride();
        Ok(Self {
            shape: self.shape.with_leading(end - start),
            data: self.data.slice(start * stride, end * stride),
        })
    }

    /// Row `index` along the leading axis, with that axis removed.
    pub fn index_leading(&self, index: usize) -> Result<Self> {
        let row = self.slice_leading(index, index + 1)?;
        Ok(Self {
            shape: self.shape.without_leading(),
            data: row.data,
        })
    }

    /// Widen a `[n, k]` tensor to `[n, width]` with zeros when `k < width`.
    ///
    /// Other shapes are returned unchanged.
    pub fn pad_components(&self, width: usize) -> Self {
        if self.shape.rank() != 2 {
            return self.clone();
        }
        let k = self.shape.row_stride();
        if k >= width {
            return self.clone();
        }
        let rows = self.num_rows();
        Self {
            shape: Shape::from_slice(&[rows, width]),
            data: self.data.pad_rows(k, width),
        }
    }
}

/// Decoded value of one field: a dense tensor or a ragged tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Dense(Tensor),
    Ragged(RaggedTensor),
}

impl FieldValue {
    /// Number of timesteps available along the leading axis.
    pub fn num_frames(&self) -> usize {
        match self {
            Self::Dense(t) => t.num_rows(),
            Self::Ragged(r) => r.num_rows(),
        }
    }

    /// Slice of one timestep, with the time axis removed.
    ///
    /// For a ragged value this is the `t`-th row, keeping its own leading axis.
    pub fn frame(&self, t: usize) -> Result<Tensor> {
        match self {
            Self::Dense(tensor) => tensor.index_leading(t),
            Self::Ragged(ragged) => ragged.row(t),
        }
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Dense(t) => t.dtype(),
            Self::Ragged(r) => r.values().dtype(),
        }
    }

    /// Dense tensor, if this value is dense.
    pub fn as_dense(&self) -> Option<&Tensor> {
        match self {
            Self::Dense(t) => Some(t),
            Self::Ragged(_) => None,
        }
    }

    /// Ragged tensor, if this value is ragged.
    pub fn as_ragged(&self) -> Option<&RaggedTensor> {
        match self {
            Self::Dense(_) => None,
            Self::Ragged(r) => Some(r),
        }
    }
}
