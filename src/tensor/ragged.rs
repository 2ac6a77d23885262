//! Ragged tensors: rows of varying length over one flat backing tensor.

use super::Tensor;
use crate::util::{Error, Result};

/// Rows of differing lengths stored as a flat backing tensor plus offsets.
///
/// Row `i` covers leading-axis indices `offsets[i]..offsets[i + 1]` of
/// `values`. `offsets` always has `num_rows() + 1` entries, starts at 0 and
/// ends at the leading size of `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct RaggedTensor {
    values: Tensor,
    offsets: Vec<usize>,
}

impl RaggedTensor {
    /// Partition the leading axis of `values` into rows of the given lengths.
    pub fn from_row_lengths(values: Tensor, lengths: &[i32]) -> Result<Self> {
        let total = values
            .shape()
            .leading()
            .ok_or_else(|| Error::shape("ragged values must have a leading axis"))?;

        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0usize);
        let mut end = 0usize;
        for (i, &len) in lengths.iter().enumerate() {
            let len = usize::try_from(len)
                .map_err(|_| Error::shape(format!("negative row length {} at row {}", len, i)))?;
            end += len;
            offsets.push(end);
        }

        if end != total {
            return Err(Error::shape(format!(
                "row lengths sum to {} but values have {} rows",
                end, total
            )));
        }

        Ok(Self { values, offsets })
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Length of row `i`.
    pub fn row_length(&self, i: usize) -> Option<usize> {
        Some(self.offsets.get(i + 1)? - self.offsets.get(i)?)
    }

    /// Row offsets (`num_rows() + 1` entries).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Flat backing tensor.
    pub fn values(&self) -> &Tensor {
        &self.values
    }

    /// Row `i` as a dense tensor.
    pub fn row(&self, i: usize) -> Result<Tensor> {
        if i >= self.num_rows() {
            return Err(Error::shape(format!(
                "row {} out of range ({} rows)",
                i,
                self.num_rows()
            )));
        }
        self.values.slice_leading(self.offsets[i], self.offsets[i + 1])
    }
}
