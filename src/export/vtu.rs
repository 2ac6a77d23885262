//! VTK XML UnstructuredGrid (`.vtu`) writer.
//!
//! ASCII output mirrors what ParaView and meshio produce by default. Binary
//! output stores each array inline as a single zlib block, base64-encoded
//! behind a `UInt64` block header (`vtkZLibDataCompressor`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{MeshSnapshot, MeshWriter};
use crate::tensor::TensorData;
use crate::util::{Error, Result};

/// Encoding of DataArray contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VtuFormat {
    /// Whitespace-separated text.
    #[default]
    Ascii,
    /// zlib-compressed, base64-encoded inline data.
    Binary,
}

impl VtuFormat {
    fn attr(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Binary => "binary",
        }
    }
}

/// Writes mesh snapshots as `.vtu` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct VtuWriter {
    format: VtuFormat,
}

impl VtuWriter {
    /// Writer producing DataArrays in `format`.
    pub fn new(format: VtuFormat) -> Self {
        Self { format }
    }

    /// DataArray encoding in use.
    pub fn format(&self) -> VtuFormat {
        self.format
    }

    /// Render a snapshot as a complete VTU document.
    pub fn render(&self, mesh: &MeshSnapshot) -> Result<String> {
        let points = mesh.points.pad_components(3);
        if points.shape().rank() != 2 || points.num_components() != 3 {
            return Err(Error::shape(format!(
                "points must be [n, 2] or [n, 3], got {}",
                mesh.points.shape()
            )));
        }

        let num_points = mesh.num_points();
        let num_cells = mesh.num_cells();
        let nodes = mesh.cells.num_components();

        let connectivity = TensorData::Int64(mesh.cells.data().to_i64_vec()?);
        let offsets = TensorData::Int64((1..=num_cells).map(|i| (i * nodes) as i64).collect());
        let types = TensorData::Uint8(vec![mesh.cell_type.vtk_id(); num_cells]);

        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;

        let mut root = BytesStart::new("VTKFile");
        root.push_attribute(("type", "UnstructuredGrid"));
        match self.format {
            VtuFormat::Ascii => {
                root.extend_attributes([("version", "0.1"), ("byte_order", "LittleEndian")]);
            }
            VtuFormat::Binary => {
                root.extend_attributes([
                    ("version", "1.0"),
                    ("byte_order", "LittleEndian"),
                    ("header_type", "UInt64"),
                    ("compressor", "vtkZLibDataCompressor"),
                ]);
            }
        }
        w.write_event(Event::Start(root))?;
        w.write_event(Event::Start(BytesStart::new("UnstructuredGrid")))?;

        let mut piece = BytesStart::new("Piece");
        piece.push_attribute(("NumberOfPoints", num_points.to_string().as_str()));
        piece.push_attribute(("NumberOfCells", num_cells.to_string().as_str()));
        w.write_event(Event::Start(piece))?;

        w.write_event(Event::Start(BytesStart::new("Points")))?;
        self.data_array(&mut w, "Points", points.data(), Some(3))?;
        w.write_event(Event::End(BytesEnd::new("Points")))?;

        w.write_event(Event::Start(BytesStart::new("Cells")))?;
        self.data_array(&mut w, "connectivity", &connectivity, None)?;
        self.data_array(&mut w, "offsets", &offsets, None)?;
        self.data_array(&mut w, "types", &types, None)?;
        w.write_event(Event::End(BytesEnd::new("Cells")))?;

        if !mesh.point_data.is_empty() {
            w.write_event(Event::Start(BytesStart::new("PointData")))?;
            for (name, tensor) in &mesh.point_data {
                let components = (tensor.shape().rank() > 1).then(|| tensor.num_components());
                self.data_array(&mut w, name, tensor.data(), components)?;
            }
            w.write_event(Event::End(BytesEnd::new("PointData")))?;
        }

        w.write_event(Event::End(BytesEnd::new("Piece")))?;
        w.write_event(Event::End(BytesEnd::new("UnstructuredGrid")))?;
        w.write_event(Event::End(BytesEnd::new("VTKFile")))?;

        let mut doc = String::from_utf8(w.into_inner()).map_err(|e| Error::Xml(e.to_string()))?;
        doc.push('\n');
        Ok(doc)
    }

    fn data_array(
        &self,
        w: &mut Writer<Vec<u8>>,
        name: &str,
        data: &TensorData,
        components: Option<usize>,
    ) -> Result<()> {
        let mut array = BytesStart::new("DataArray");
        array.push_attribute(("type", data.dtype().vtk_name()));
        array.push_attribute(("Name", name));
        if let Some(n) = components {
            array.push_attribute(("NumberOfComponents", n.to_string().as_str()));
        }
        array.push_attribute(("format", self.format.attr()));

        let text = match self.format {
            VtuFormat::Ascii => {
                let mut text = String::new();
                data.write_ascii(&mut text);
                text.truncate(text.trim_end().len());
                text
            }
            VtuFormat::Binary => encode_zlib_base64(&data.to_vtk_le_bytes())?,
        };

        w.write_event(Event::Start(array))?;
        w.write_event(Event::Text(BytesText::new(&text)))?;
        w.write_event(Event::End(BytesEnd::new("DataArray")))?;
        Ok(())
    }
}

impl MeshWriter for VtuWriter {
    fn extension(&self) -> &str {
        "vtu"
    }

    fn write_mesh(&self, path: &Path, mesh: &MeshSnapshot) -> Result<()> {
        let doc = self.render(mesh)?;
        let mut w = BufWriter::new(File::create(path)?);
        w.write_all(doc.as_bytes())?;
        w.flush()?;
        Ok(())
    }
}

/// One-block compressed payload: base64(header) followed by base64(data).
///
/// Header is `[num_blocks, block_size, last_block_size, compressed_size]` as
/// little-endian u64.
fn encode_zlib_base64(raw: &[u8]) -> Result<String> {
    if raw.is_empty() {
        let header: Vec<u8> = [0u64, 0, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        return Ok(STANDARD.encode(header));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;

    let size = raw.len() as u64;
    let header: Vec<u8> = [1u64, size, size, compressed.len() as u64]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();

    let mut text = STANDARD.encode(header);
    text.push_str(&STANDARD.encode(compressed));
    Ok(text)
}
