//! # traj2vtu
//!
//! Converts mesh simulation trajectories stored as TFRecord files of
//! `tf.train.Example` records (the MeshGraphNets dataset layout) into one
//! VTK unstructured-grid file per timestep plus a `.pvd` time series per
//! trajectory.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (DType, Shape, errors)
//! - [`schema`] - Dataset description loaded from `meta.json`
//! - [`tensor`] - Dense and ragged tensors
//! - [`record`] - TFRecord framing and Example payloads
//! - [`decode`] - Schema-driven decoding of one trajectory
//! - [`export`] - Frame unrolling, VTU and PVD output
//! - [`convert`] - Whole-file conversion driver
//!
//! ## Example
//!
//! ```ignore
//! use traj2vtu::convert::{convert, ConvertOptions, InputPaths};
//!
//! let paths = InputPaths::resolve("data/cylinder_flow", "valid");
//! let summary = convert(&paths, "out", &ConvertOptions::default())?;
//! println!("{} trajectories", summary.trajectories);
//! ```

pub mod util;
pub mod schema;
pub mod tensor;
pub mod record;
pub mod decode;
pub mod export;
pub mod convert;

// Re-export commonly used types
pub use util::{DType, Error, Result, Shape, ShapeSpec};
pub use schema::{load_schema, DatasetSchema, FieldKind, FieldSchema};
pub use decode::{decode, DecodedTrajectory};
pub use export::{export_trajectory, MeshSnapshot, MeshWriter, TimeSeriesIndex};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DType, Error, Result, Shape, ShapeSpec};
    pub use crate::schema::{load_schema, DatasetSchema, FieldKind, FieldSchema};
    pub use crate::tensor::{FieldValue, RaggedTensor, Tensor, TensorData};
    pub use crate::record::{RawTrajectory, RecordReader, RecordWriter};
    pub use crate::decode::{decode, DecodedTrajectory};
    pub use crate::export::{
        export_trajectory, CellType, Frame, MeshSnapshot, MeshWriter, TimeSeriesIndex, VtuFormat,
        VtuWriter,
    };
    pub use crate::convert::{convert, ConvertOptions, ConvertSummary, InputPaths};
}
