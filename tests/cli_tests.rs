//! Tests driving the `traj2vtu` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

use traj2vtu::record::{RawTrajectory, RecordWriter};
use traj2vtu::tensor::TensorData;

const META: &str = r#"{
    "field_names": ["cells", "mesh_pos"],
    "trajectory_length": 2,
    "features": {
        "cells": {"type": "static", "shape": [1, -1, 3], "dtype": "int32"},
        "mesh_pos": {"type": "static", "shape": [1, -1, 3], "dtype": "float32"}
    }
}"#;

fn traj2vtu(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_traj2vtu"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run traj2vtu")
}

fn write_triangle_dataset(dir: &Path) {
    std::fs::write(dir.join("meta.json"), META).unwrap();
    let mut raw = RawTrajectory::new();
    raw.insert_tensor("cells", &TensorData::Int32(vec![0, 1, 2]));
    let points = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    raw.insert_tensor("mesh_pos", &TensorData::Float32(points));

    let mut writer = RecordWriter::create(dir.join("valid.tfrecord")).unwrap();
    writer.write_record(&raw.to_example_bytes()).unwrap();
    writer.flush().unwrap();
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path is not UTF-8")
}

#[test]
fn test_missing_data_file() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let output_dir = out.path().join("result");

    let output = traj2vtu(&["convert", path_str(data.path()), "valid", path_str(&output_dir)]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Data file:"));
    assert!(stdout.contains("# Error: could not find data file"));
    assert!(!output_dir.exists(), "nothing should be written");
}

#[test]
fn test_missing_meta_file() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_triangle_dataset(data.path());
    std::fs::remove_file(data.path().join("meta.json")).unwrap();

    let output = traj2vtu(&["convert", path_str(data.path()), "valid", path_str(out.path())]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("# Error: could not find meta file"));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_strict_missing_input_fails() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let output = traj2vtu(&[
        "convert",
        path_str(data.path()),
        "valid",
        path_str(out.path()),
        "--strict",
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_convert_writes_series() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_triangle_dataset(data.path());

    let output = traj2vtu(&["convert", path_str(data.path()), "valid", path_str(out.path())]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Found features:"));
    assert!(stdout.contains("#   - cells"));
    assert!(stdout.contains("#   - mesh_pos"));

    let traj = out.path().join("0");
    assert!(traj.join("0.vtu").is_file());
    assert!(traj.join("1.vtu").is_file());
    assert!(traj.join("trajectory.pvd").is_file());
}

#[test]
fn test_malformed_meta_fails() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_triangle_dataset(data.path());
    std::fs::write(data.path().join("meta.json"), "{ not json").unwrap();

    let output = traj2vtu(&["convert", path_str(data.path()), "valid", path_str(out.path())]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_info_counts_records() {
    let data = TempDir::new().unwrap();
    write_triangle_dataset(data.path());

    let output = traj2vtu(&["info", path_str(data.path()), "valid"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Trajectory length: 2"));
    assert!(stdout.contains("cells"));
    assert!(stdout.contains("Records in"));
    assert!(stdout.trim_end().ends_with(": 1"));
}
