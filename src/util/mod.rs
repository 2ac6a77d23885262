//! Utility types shared by every stage of the conversion.
//!
//! - [`DType`] - Primitive element types
//! - [`Shape`] / [`ShapeSpec`] - Concrete and declared tensor shapes
//! - [`Error`] / [`Result`] - Error handling

mod dtype;
mod error;
mod shape;

pub use dtype::*;
pub use error::*;
pub use shape::*;
