//! Tensor shapes.
//!
//! [`Shape`] is the concrete, fully-known shape of a tensor. [`ShapeSpec`] is
//! a declared shape as found in the metadata document, where a single `-1`
//! entry stands for "whatever makes the element count fit".

use smallvec::SmallVec;

use super::{Error, Result};

/// Shape of a dense tensor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Size of each dimension. Empty means scalar (rank 0).
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    /// Create from a slice of sizes.
    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Get all dimension sizes as a slice.
    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Size of the leading axis, or None for scalars.
    pub fn leading(&self) -> Option<usize> {
        self.dims.first().copied()
    }

    /// Total number of elements (product of all dimensions).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of elements in one slice along the leading axis.
    ///
    /// For a scalar this is 1.
    pub fn row_stride(&self) -> usize {
        self.dims.iter().skip(1).product()
    }

    /// Shape with the leading axis removed.
    pub fn without_leading(&self) -> Self {
        Self { dims: self.dims.iter().skip(1).copied().collect() }
    }

    /// Same shape with the leading axis replaced.
    ///
    /// A scalar shape gains a new leading axis.
    pub fn with_leading(&self, size: usize) -> Self {
        let mut dims = SmallVec::new();
        dims.push(size);
        dims.extend(self.dims.iter().skip(1).copied());
        Self { dims }
    }

    /// Check if this represents a scalar (rank 0).
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl From<&[usize]> for Shape {
    fn from(v: &[usize]) -> Self {
        Self::from_slice(v)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}

/// Declared shape from the metadata document.
///
/// Every entry is either a size or `-1`. At most one `-1` is allowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeSpec {
    dims: SmallVec<[i64; 4]>,
    /// Product of the fixed (non `-1`) entries.
    known: usize,
}

impl ShapeSpec {
    /// Validate and build a declared shape.
    pub fn new(dims: &[i64]) -> Result<Self> {
        if let Some(bad) = dims.iter().find(|&&d| d < -1) {
            return Err(Error::malformed(format!("invalid shape entry {}", bad)));
        }
        if dims.iter().filter(|&&d| d == -1).count() > 1 {
            return Err(Error::malformed(format!(
                "shape {:?} has more than one inferred (-1) entry",
                dims
            )));
        }
        // A zero entry empties the shape whatever the other sizes are.
        let known = if dims.contains(&0) {
            Some(0)
        } else {
            dims.iter()
                .filter(|&&d| d >= 0)
                .try_fold(1usize, |acc, &d| {
                    usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
                })
        };
        let known = known.ok_or_else(|| {
            Error::malformed(format!("shape {:?} overflows the element count", dims))
        })?;
        Ok(Self { dims: SmallVec::from_slice(dims), known })
    }

    /// Declared entries, `-1` included.
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Rank of the declared shape.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Trailing entry after dropping the leading per-timestep axis.
    pub fn trailing(&self) -> Option<i64> {
        self.dims.iter().skip(1).last().copied()
    }

    /// Resolve against an element count, inferring a `-1` entry if present.
    pub fn resolve(&self, count: usize) -> Result<Shape> {
        let known = self.known;
        let inferred = self.dims.iter().any(|&d| d == -1);

        let fill = if inferred {
            if known == 0 {
                if count != 0 {
                    return Err(Error::shape(format!(
                        "cannot reshape {} elements into {}",
                        count, self
                    )));
                }
                0
            } else if count % known != 0 {
                return Err(Error::shape(format!(
                    "cannot reshape {} elements into {}",
                    count, self
                )));
            } else {
                count / known
            }
        } else {
            if known != count {
                return Err(Error::shape(format!(
                    "cannot reshape {} elements into {}",
                    count, self
                )));
            }
            0
        };

        let dims: Vec<usize> = self
            .dims
            .iter()
            .map(|&d| if d == -1 { fill } else { d as usize })
            .collect();
        Ok(Shape::from(dims))
    }
}

impl std::fmt::Display for ShapeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.dims.as_slice())
    }
}
