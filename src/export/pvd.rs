//! PVD time-series index (VTK XML collection).

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::util::{Error, Result};

/// File name of the per-trajectory index.
pub const INDEX_FILE_NAME: &str = "trajectory.pvd";

/// One indexed mesh file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSeriesEntry {
    pub timestep: usize,
    pub file: PathBuf,
}

#[derive(Serialize)]
#[serde(rename = "VTKFile")]
struct PvdDocument<'a> {
    #[serde(rename = "@type")]
    file_type: &'a str,
    #[serde(rename = "@version")]
    version: &'a str,
    #[serde(rename = "@byte_order")]
    byte_order: &'a str,
    #[serde(rename = "Collection")]
    collection: PvdCollection,
}

#[derive(Serialize)]
struct PvdCollection {
    #[serde(rename = "DataSet")]
    data_sets: Vec<PvdDataSet>,
}

#[derive(Serialize)]
struct PvdDataSet {
    #[serde(rename = "@timestep")]
    timestep: usize,
    #[serde(rename = "@file")]
    file: String,
}

/// Ordered list of the mesh files of one trajectory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeSeriesIndex {
    entries: Vec<TimeSeriesEntry>,
}

impl TimeSeriesIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a timestep.
    pub fn push(&mut self, timestep: usize, file: impl Into<PathBuf>) {
        self.entries.push(TimeSeriesEntry { timestep, file: file.into() });
    }

    /// Entries in timestep order.
    pub fn entries(&self) -> &[TimeSeriesEntry] {
        &self.entries
    }

    /// Number of indexed timesteps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no timestep has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the collection, with file paths relative to `base_dir`.
    pub fn to_pvd_string(&self, base_dir: &Path) -> Result<String> {
        let data_sets = self
            .entries()
            .iter()
            .map(|entry| PvdDataSet {
                timestep: entry.timestep,
                file: relative_path(&entry.file, base_dir)
                    .to_string_lossy()
                    .replace('\\', "/"),
            })
            .collect();
        let doc = PvdDocument {
            file_type: "Collection",
            version: "1.0",
            byte_order: "LittleEndian",
            collection: PvdCollection { data_sets },
        };

        let mut xml = String::from("<?xml version=\"1.0\"?>\n");
        let mut ser = quick_xml::se::Serializer::new(&mut xml);
        ser.indent(' ', 2);
        doc.serialize(ser).map_err(|e| Error::Xml(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }

    /// Write the index to `path`; entries are made relative to its directory.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        std::fs::write(path, self.to_pvd_string(base)?)?;
        Ok(())
    }
}

/// Path of `file` as seen from `base`.
///
/// Both paths are compared component-wise; no filesystem access happens.
pub(crate) fn relative_path(file: &Path, base: &Path) -> PathBuf {
    if let Ok(rel) = file.strip_prefix(base) {
        return rel.to_path_buf();
    }

    let file_parts: Vec<Component<'_>> = file.components().collect();
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let common = file_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // Differing roots cannot be expressed relatively.
    if common == 0 && (file.has_root() || base.has_root()) {
        return file.to_path_buf();
    }

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &file_parts[common..] {
        rel.push(part.as_os_str());
    }
    rel
}
