//! End-to-end conversion of a record file into per-trajectory VTU series.

use std::path::{Path, PathBuf};

use crate::decode::decode;
use crate::export::{export_trajectory, VtuFormat, VtuWriter};
use crate::record::{RawTrajectory, RecordReader};
use crate::schema::{load_schema, DatasetSchema};
use crate::util::Result;

/// Extension of record files inside a dataset directory.
pub const RECORD_EXTENSION: &str = "tfrecord";
/// Name of the metadata document inside a dataset directory.
pub const META_FILE_NAME: &str = "meta.json";

/// Input files of one dataset split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputPaths {
    pub data_file: PathBuf,
    pub meta_file: PathBuf,
}

impl InputPaths {
    /// `<data_dir>/<split>.tfrecord` and `<data_dir>/meta.json`.
    pub fn resolve(data_dir: impl AsRef<Path>, split: &str) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            data_file: data_dir.join(format!("{}.{}", split, RECORD_EXTENSION)),
            meta_file: data_dir.join(META_FILE_NAME),
        }
    }
}

/// Conversion settings.
#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    pub format: VtuFormat,
    pub verify_checksums: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { format: VtuFormat::Ascii, verify_checksums: true }
    }
}

/// What a conversion produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub trajectories: usize,
    pub frames: usize,
}

/// Load the schema and convert every trajectory of the data file.
pub fn convert(
    paths: &InputPaths,
    output_dir: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<ConvertSummary> {
    let schema = load_schema(&paths.meta_file)?;
    convert_with_schema(&paths.data_file, &schema, output_dir, options)
}

/// Convert every trajectory of `data_file` using an already-loaded schema.
///
/// Trajectories are read, decoded and exported one at a time; trajectory `i`
/// lands in `<output_dir>/<i>/`.
pub fn convert_with_schema(
    data_file: &Path,
    schema: &DatasetSchema,
    output_dir: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<ConvertSummary> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let writer = VtuWriter::new(options.format);
    tracing::debug!("writing {:?} VTU into {}", writer.format(), output_dir.display());
    let records = RecordReader::open(data_file)?.verify_checksums(options.verify_checksums);

    let mut summary = ConvertSummary::default();
    for (i, record) in records.enumerate() {
        tracing::info!("Processing trajectory {}", i);

        let raw = RawTrajectory::from_example_bytes(&record?)?;
        let decoded = decode(&raw, schema)?;
        drop(raw);

        let traj_dir = output_dir.join(i.to_string());
        std::fs::create_dir_all(&traj_dir)?;
        let index = export_trajectory(&decoded, schema, &traj_dir, &writer)?;

        summary.trajectories += 1;
        summary.frames += index.len();
    }

    tracing::info!(
        "Converted {} trajectories ({} frames) into {}",
        summary.trajectories,
        summary.frames,
        output_dir.display()
    );
    Ok(summary)
}

/// Number of records in a data file.
pub fn count_records(data_file: &Path, verify_checksums: bool) -> Result<usize> {
    let mut reader = RecordReader::open(data_file)?.verify_checksums(verify_checksums);
    let mut count = 0;
    for record in reader.by_ref() {
        record?;
        count += 1;
    }
    tracing::debug!("{}: {} records in {} bytes", data_file.display(), count, reader.offset());
    Ok(count)
}
