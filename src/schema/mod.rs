//! Dataset schema loaded from `meta.json`.
//!
//! The metadata document lists the record's field names, a description of
//! every decodable feature, and the number of timesteps per trajectory:
//!
//! ```json
//! {
//!   "field_names": ["cells", "mesh_pos", "node_type", "world_pos"],
//!   "trajectory_length": 400,
//!   "features": {
//!     "cells":     {"type": "static",  "shape": [1, -1, 3],   "dtype": "int32"},
//!     "world_pos": {"type": "dynamic", "shape": [400, -1, 3], "dtype": "float32"}
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::util::{DType, Error, Result, ShapeSpec};

/// How a field's tensor relates to the time axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One frame of data, replicated over every timestep.
    Static,
    /// Already carries a per-timestep leading axis.
    Dynamic,
    /// Per-timestep rows of varying length, with a `length_<name>` companion.
    DynamicVarlen,
    /// Anything else. Rejected when the field is decoded.
    Unknown(String),
}

impl FieldKind {
    /// Parse from the metadata `type` string.
    pub fn from_name(name: &str) -> Self {
        match name {
            "static" => Self::Static,
            "dynamic" => Self::Dynamic,
            "dynamic_varlen" => Self::DynamicVarlen,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Metadata name of this kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::DynamicVarlen => "dynamic_varlen",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Description of one decodable field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub dtype: DType,
    pub shape: ShapeSpec,
    pub kind: FieldKind,
    /// Simulation-only metadata: decoded as-is, never exported.
    pub for_sim: bool,
}

/// Complete dataset description. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetSchema {
    pub field_names: BTreeSet<String>,
    pub features: BTreeMap<String, FieldSchema>,
    pub trajectory_length: usize,
}

#[derive(Deserialize)]
struct MetaDocument {
    field_names: Vec<String>,
    features: BTreeMap<String, FeatureEntry>,
    trajectory_length: usize,
}

#[derive(Deserialize)]
struct FeatureEntry {
    dtype: String,
    shape: Vec<i64>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    for_sim: bool,
}

impl DatasetSchema {
    /// Parse a metadata document held in memory.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: MetaDocument =
            serde_json::from_str(json).map_err(|e| Error::malformed(e.to_string()))?;

        if doc.trajectory_length == 0 {
            return Err(Error::malformed("trajectory_length must be positive"));
        }

        let mut features = BTreeMap::new();
        for (name, entry) in doc.features {
            let dtype = DType::from_name(&entry.dtype).ok_or_else(|| {
                Error::malformed(format!("field '{}': unknown dtype '{}'", name, entry.dtype))
            })?;
            let shape = ShapeSpec::new(&entry.shape).map_err(|e| match e {
                Error::SchemaMalformed(msg) => {
                    Error::malformed(format!("field '{}': {}", name, msg))
                }
                other => other,
            })?;
            let field = FieldSchema {
                name: name.clone(),
                dtype,
                shape,
                kind: FieldKind::from_name(&entry.kind),
                for_sim: entry.for_sim,
            };
            features.insert(name, field);
        }

        Ok(Self {
            field_names: doc.field_names.into_iter().collect(),
            features,
            trajectory_length: doc.trajectory_length,
        })
    }

    /// Look up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&FieldSchema> {
        self.features.get(name)
    }

    /// True if the record declares this field name.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_names.contains(name)
    }
}

/// Load the dataset schema from a metadata document on disk.
pub fn load_schema(path: impl AsRef<Path>) -> Result<DatasetSchema> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        tracing::debug!("cannot read {}: {}", path.display(), e);
        Error::SchemaNotFound(path.to_path_buf())
    })?;
    let schema = DatasetSchema::from_json_str(&json)?;
    tracing::debug!(
        "loaded schema with {} features, trajectory length {}",
        schema.features.len(),
        schema.trajectory_length
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"{
        "field_names": ["cells", "mesh_pos", "node_type", "world_pos", "stress"],
        "trajectory_length": 400,
        "features": {
            "cells": {"type": "static", "shape": [1, -1, 4], "dtype": "int32"},
            "mesh_pos": {"type": "static", "shape": [1, -1, 3], "dtype": "float32"},
            "node_type": {"type": "static", "shape": [1, -1, 1], "dtype": "int32"},
            "world_pos": {"type": "dynamic", "shape": [400, -1, 3], "dtype": "float32"},
            "stress": {"type": "dynamic", "shape": [400, -1, 1], "dtype": "float32", "for_sim": true}
        }
    }"#;

    #[test]
    fn test_parse_meta() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        assert_eq!(schema.trajectory_length, 400);
        assert_eq!(schema.features.len(), 5);
        assert!(schema.has_field("world_pos"));

        let cells = schema.feature("cells").unwrap();
        assert_eq!(cells.dtype, DType::Int32);
        assert_eq!(cells.kind, FieldKind::Static);
        assert_eq!(cells.shape.dims(), &[1, -1, 4]);
        assert!(!cells.for_sim);
        assert!(schema.feature("stress").unwrap().for_sim);
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let json = r#"{"field_names": ["a"], "trajectory_length": 2,
            "features": {"a": {"type": "sparse", "shape": [2], "dtype": "float32"}}}"#;
        let schema = DatasetSchema::from_json_str(json).unwrap();
        assert_eq!(schema.feature("a").unwrap().kind, FieldKind::Unknown("sparse".into()));
    }

    #[test]
    fn test_missing_keys() {
        let json = r#"{"field_names": [], "features": {}}"#;
        assert!(matches!(DatasetSchema::from_json_str(json), Err(Error::SchemaMalformed(_))));

        let json = r#"{"field_names": "cells", "features": {}, "trajectory_length": 1}"#;
        assert!(matches!(DatasetSchema::from_json_str(json), Err(Error::SchemaMalformed(_))));
    }

    #[test]
    fn test_bad_feature_entries() {
        let bad_dtype = r#"{"field_names": [], "trajectory_length": 1,
            "features": {"a": {"type": "static", "shape": [1], "dtype": "complex64"}}}"#;
        assert!(matches!(DatasetSchema::from_json_str(bad_dtype), Err(Error::SchemaMalformed(_))));

        let two_inferred = r#"{"field_names": [], "trajectory_length": 1,
            "features": {"a": {"type": "static", "shape": [-1, -1], "dtype": "int32"}}}"#;
        assert!(matches!(
            DatasetSchema::from_json_str(two_inferred),
            Err(Error::SchemaMalformed(_))
        ));

        let huge = r#"{"field_names": [], "trajectory_length": 1,
            "features": {"a": {"type": "dynamic", "shape": [4294967296, 4294967296, 2], "dtype": "float32"}}}"#;
        match DatasetSchema::from_json_str(huge) {
            Err(Error::SchemaMalformed(msg)) => assert!(msg.contains("field 'a'"), "{}", msg),
            other => panic!("expected SchemaMalformed, got {:?}", other),
        }

        let zero_len = r#"{"field_names": [], "trajectory_length": 0, "features": {}}"#;
        assert!(matches!(DatasetSchema::from_json_str(zero_len), Err(Error::SchemaMalformed(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_schema("/nonexistent/dir/meta.json").unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, META).unwrap();
        let schema = load_schema(&path).unwrap();
        assert_eq!(schema.feature("world_pos").unwrap().kind, FieldKind::Dynamic);
    }
}
