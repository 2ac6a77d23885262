//! Frame unrolling and mesh export.
//!
//! A decoded trajectory is cut along its time axis into [`Frame`]s. Each
//! frame is split into coordinates, cell connectivity and point attributes
//! ([`MeshSnapshot`]) and handed to a [`MeshWriter`]. Once every frame of a
//! trajectory is on disk, a [`TimeSeriesIndex`] listing them is written next
//! to them.

mod pvd;
mod vtu;

pub use pvd::{TimeSeriesEntry, TimeSeriesIndex, INDEX_FILE_NAME};
pub use vtu::{VtuFormat, VtuWriter};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::decode::DecodedTrajectory;
use crate::schema::DatasetSchema;
use crate::tensor::Tensor;
use crate::util::{Error, Result};

/// Deformed coordinates, preferred when the dataset has them.
pub const WORLD_POS: &str = "world_pos";
/// Rest-state coordinates.
pub const MESH_POS: &str = "mesh_pos";
/// Cell connectivity.
pub const CELLS: &str = "cells";

/// Cell family of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellType {
    Triangle,
    Tetra,
}

impl CellType {
    /// Pick the cell family from the trailing size of the cells shape.
    ///
    /// Only tetrahedra are told apart; every other size is read as triangles.
    pub fn from_trailing(trailing: Option<i64>) -> Self {
        match trailing {
            Some(4) => Self::Tetra,
            _ => Self::Triangle,
        }
    }

    /// VTK cell type id.
    pub const fn vtk_id(self) -> u8 {
        match self {
            Self::Triangle => 5,
            Self::Tetra => 10,
        }
    }

    /// Nodes per cell.
    pub const fn num_nodes(self) -> usize {
        match self {
            Self::Triangle => 3,
            Self::Tetra => 4,
        }
    }

    /// Lowercase family name, for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Tetra => "tetra",
        }
    }
}

/// Capability to persist one mesh snapshot.
pub trait MeshWriter {
    /// File extension, without the dot.
    fn extension(&self) -> &str;

    /// Write `mesh` to `path`.
    fn write_mesh(&self, path: &Path, mesh: &MeshSnapshot) -> Result<()>;
}

/// One timestep of a trajectory.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub fields: BTreeMap<String, Tensor>,
}

impl Frame {
    /// Slice every exportable field of `decoded` at timestep `t`.
    ///
    /// `for_sim` fields are left out.
    pub fn slice(decoded: &DecodedTrajectory, schema: &DatasetSchema, t: usize) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (name, value) in decoded.iter() {
            if schema.feature(name).is_some_and(|f| f.for_sim) {
                continue;
            }
            if t >= value.num_frames() {
                return Err(Error::shape(format!(
                    "field '{}' has {} frames, timestep {} requested",
                    name,
                    value.num_frames(),
                    t
                )));
            }
            fields.insert(name.to_string(), value.frame(t)?);
        }
        Ok(Self { index: t, fields })
    }

    /// Slice of field `name` at this timestep.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.fields.get(name)
    }
}

/// Geometry and attributes of one frame, ready for a mesh writer.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshSnapshot {
    /// `[num_points, dim]` coordinates.
    pub points: Tensor,
    pub cell_type: CellType,
    /// `[num_cells, nodes_per_cell]` point indices.
    pub cells: Tensor,
    pub point_data: BTreeMap<String, Tensor>,
}

impl MeshSnapshot {
    /// Split a frame into coordinates, connectivity and point data.
    pub fn from_frame(frame: Frame, coordinate_field: &str, cell_type: CellType) -> Result<Self> {
        let mut fields = frame.fields;
        let points = fields.remove(coordinate_field).ok_or(Error::MissingCoordinateField)?;
        let cells = fields.remove(CELLS).ok_or_else(|| Error::MissingField(CELLS.into()))?;
        fields.remove(WORLD_POS);
        fields.remove(MESH_POS);

        Ok(Self { points, cell_type, cells, point_data: fields })
    }

    /// Number of points (rows of `points`).
    pub fn num_points(&self) -> usize {
        self.points.num_rows()
    }

    /// Number of cells (rows of `cells`).
    pub fn num_cells(&self) -> usize {
        self.cells.num_rows()
    }

    /// Check point data row counts, cell width and connectivity bounds.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_points();
        for (name, data) in &self.point_data {
            if data.num_rows() != n {
                return Err(Error::PointDataMismatch {
                    field: name.clone(),
                    expected: n,
                    actual: data.num_rows(),
                });
            }
        }

        if !self.cells.dtype().is_integer() {
            return Err(Error::TypeMismatch {
                expected: "integer".into(),
                actual: self.cells.dtype().name().into(),
            });
        }
        let nodes = self.cell_type.num_nodes();
        if self.cells.shape().rank() != 2 || self.cells.num_components() != nodes {
            return Err(Error::InvalidConnectivity(format!(
                "{} cells take {} nodes each, connectivity has shape {}",
                self.cell_type.name(),
                nodes,
                self.cells.shape()
            )));
        }

        let indices = self.cells.data().to_i64_vec()?;
        if let Some(bad) = indices.iter().find(|&&i| i < 0 || i as u64 >= n as u64) {
            return Err(Error::InvalidConnectivity(format!(
                "point index {} out of range for {} points",
                bad, n
            )));
        }
        Ok(())
    }
}

/// Coordinate field used for a dataset.
///
/// `world_pos` wins if the record declares it, otherwise `mesh_pos`.
pub fn coordinate_field(
    schema: &DatasetSchema,
    decoded: &DecodedTrajectory,
) -> Result<&'static str> {
    let name = if schema.has_field(WORLD_POS) { WORLD_POS } else { MESH_POS };
    if decoded.contains(name) {
        Ok(name)
    } else {
        Err(Error::MissingCoordinateField)
    }
}

/// Cell family declared by the `cells` feature.
pub fn cell_type(schema: &DatasetSchema) -> Result<CellType> {
    let cells = schema.feature(CELLS).ok_or_else(|| Error::MissingField(CELLS.into()))?;
    Ok(CellType::from_trailing(cells.shape.trailing()))
}

/// Write every frame of `decoded` into `output_dir`, then the time index.
pub fn export_trajectory(
    decoded: &DecodedTrajectory,
    schema: &DatasetSchema,
    output_dir: &Path,
    writer: &dyn MeshWriter,
) -> Result<TimeSeriesIndex> {
    let coords = coordinate_field(schema, decoded)?;
    let cell_type = cell_type(schema)?;
    if !decoded.contains(CELLS) {
        return Err(Error::MissingField(CELLS.into()));
    }

    let mut index = TimeSeriesIndex::new();
    for t in 0..schema.trajectory_length {
        let frame = Frame::slice(decoded, schema, t)?;
        let mesh = MeshSnapshot::from_frame(frame, coords, cell_type)?;
        mesh.validate()?;

        if t == 0 && mesh.points.num_components() < 3 {
            tracing::warn!(
                "{} has {} components per point, padding to 3",
                coords,
                mesh.points.num_components()
            );
        }

        let path: PathBuf = output_dir.join(format!("{}.{}", t, writer.extension()));
        writer.write_mesh(&path, &mesh)?;
        tracing::debug!(
            "wrote {} ({} points, {} {} cells)",
            path.display(),
            mesh.num_points(),
            mesh.num_cells(),
            cell_type.name()
        );

        index.push(t, path);
    }

    index.write(output_dir.join(INDEX_FILE_NAME))?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{FieldValue, TensorData};

    const META: &str = r#"{
        "field_names": ["cells", "mesh_pos", "pressure"],
        "trajectory_length": 2,
        "features": {
            "cells": {"type": "static", "shape": [1, -1, 3], "dtype": "int32"},
            "mesh_pos": {"type": "static", "shape": [1, -1, 2], "dtype": "float32"},
            "pressure": {"type": "dynamic", "shape": [2, -1, 1], "dtype": "float32"}
        }
    }"#;

    fn dense(shape: &[usize], data: TensorData) -> FieldValue {
        FieldValue::Dense(Tensor::new(shape.to_vec(), data).unwrap())
    }

    fn trajectory() -> DecodedTrajectory {
        let mut d = DecodedTrajectory::new();
        d.insert("cells", dense(&[2, 1, 3], TensorData::Int32(vec![0, 1, 2, 0, 1, 2])));
        let triangle = [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0];
        d.insert("mesh_pos", dense(&[2, 3, 2], TensorData::Float32(triangle.repeat(2))));
        let pressure = TensorData::Float32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        d.insert("pressure", dense(&[2, 3, 1], pressure));
        d
    }

    #[test]
    fn test_cell_type_rule() {
        assert_eq!(CellType::from_trailing(Some(4)), CellType::Tetra);
        assert_eq!(CellType::from_trailing(Some(3)), CellType::Triangle);
        assert_eq!(CellType::from_trailing(Some(8)), CellType::Triangle);
        assert_eq!(CellType::from_trailing(None), CellType::Triangle);
        assert_eq!(CellType::Tetra.vtk_id(), 10);
    }

    #[test]
    fn test_frame_split() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let decoded = trajectory();
        let frame = Frame::slice(&decoded, &schema, 1).unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(frame.get("cells").unwrap().shape().sizes(), &[1, 3]);
        assert_eq!(frame.get("pressure").unwrap().shape().sizes(), &[3, 1]);
        let mesh = MeshSnapshot::from_frame(frame, MESH_POS, CellType::Triangle).unwrap();

        assert_eq!(mesh.num_points(), 3);
        assert_eq!(mesh.num_cells(), 1);
        assert_eq!(mesh.point_data.keys().collect::<Vec<_>>(), vec!["pressure"]);
        assert_eq!(
            mesh.point_data["pressure"].data(),
            &TensorData::Float32(vec![4.0, 5.0, 6.0])
        );
        mesh.validate().unwrap();
    }

    #[test]
    fn test_coordinate_choice() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        assert_eq!(coordinate_field(&schema, &trajectory()).unwrap(), MESH_POS);

        let with_world =
            META.replace(r#""cells", "mesh_pos""#, r#""cells", "world_pos", "mesh_pos""#);
        let schema = DatasetSchema::from_json_str(&with_world).unwrap();
        assert!(matches!(
            coordinate_field(&schema, &trajectory()),
            Err(Error::MissingCoordinateField)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let mut decoded = trajectory();
        decoded.insert("cells", dense(&[2, 1, 3], TensorData::Int32(vec![0, 1, 3, 0, 1, 3])));
        let frame = Frame::slice(&decoded, &schema, 0).unwrap();
        let mesh = MeshSnapshot::from_frame(frame, MESH_POS, CellType::Triangle).unwrap();
        assert!(matches!(mesh.validate(), Err(Error::InvalidConnectivity(_))));
    }

    #[test]
    fn test_validate_rejects_cell_width() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let frame = Frame::slice(&trajectory(), &schema, 0).unwrap();
        // Triangle connectivity read as tetrahedra
        let mesh = MeshSnapshot::from_frame(frame, MESH_POS, CellType::Tetra).unwrap();
        assert!(matches!(mesh.validate(), Err(Error::InvalidConnectivity(_))));
    }

    #[test]
    fn test_validate_rejects_float_cells() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let mut decoded = trajectory();
        let cells = TensorData::Float32(vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        decoded.insert("cells", dense(&[2, 1, 3], cells));
        let frame = Frame::slice(&decoded, &schema, 0).unwrap();
        let mesh = MeshSnapshot::from_frame(frame, MESH_POS, CellType::Triangle).unwrap();
        assert!(matches!(mesh.validate(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_rejects_short_point_data() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let mut decoded = trajectory();
        decoded.insert("pressure", dense(&[2, 2, 1], TensorData::Float32(vec![1.0; 4])));
        let frame = Frame::slice(&decoded, &schema, 0).unwrap();
        let mesh = MeshSnapshot::from_frame(frame, MESH_POS, CellType::Triangle).unwrap();
        assert!(matches!(
            mesh.validate(),
            Err(Error::PointDataMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_frame_out_of_range() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        assert!(matches!(
            Frame::slice(&trajectory(), &schema, 2),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_export_trajectory() {
        let schema = DatasetSchema::from_json_str(META).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let index = export_trajectory(&trajectory(), &schema, dir.path(), &VtuWriter::default())
            .unwrap();

        let steps: Vec<usize> = index.entries().iter().map(|e| e.timestep).collect();
        assert_eq!(steps, vec![0, 1]);
        for entry in index.entries() {
            assert!(entry.file.is_file(), "{} not written", entry.file.display());
        }
        assert!(dir.path().join(INDEX_FILE_NAME).is_file());
    }
}
