//! Error types for trajectory conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for schema loading, decoding and export.
#[derive(Error, Debug)]
pub enum Error {
    /// Metadata document does not exist or cannot be read
    #[error("Schema not found: {0}")]
    SchemaNotFound(PathBuf),

    /// Metadata document is missing required keys or has the wrong shape
    #[error("Malformed schema: {0}")]
    SchemaMalformed(String),

    /// Raw byte length is not a multiple of the dtype width
    #[error("Corrupt encoding in field '{field}': {len} bytes is not a multiple of {width}")]
    CorruptEncoding { field: String, len: usize, width: usize },

    /// Element count cannot be arranged into the requested shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Field kind is not one of static, dynamic, dynamic_varlen
    #[error("Unsupported kind '{kind}' for field '{field}'")]
    UnsupportedFieldKind { field: String, kind: String },

    /// Neither world_pos nor mesh_pos is available
    #[error("Missing coordinate field (world_pos or mesh_pos)")]
    MissingCoordinateField,

    /// A field required for export is absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Record container or Example payload is malformed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Record CRC does not match its contents
    #[error("Checksum mismatch in record at offset {offset}")]
    ChecksumMismatch { offset: u64 },

    /// Type mismatch when converting tensor data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Point data array does not have one row per point
    #[error("Point data '{field}' has {actual} rows, mesh has {expected} points")]
    PointDataMismatch { field: String, expected: usize, actual: usize },

    /// Cell connectivity references a point that does not exist
    #[error("Invalid connectivity: {0}")]
    InvalidConnectivity(String),

    /// XML document could not be produced
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed schema error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::SchemaMalformed(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create an invalid record error.
    pub fn record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;
