//! traj2vtu CLI - convert TFRecord mesh trajectories into VTU time series.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traj2vtu::convert::{convert_with_schema, count_records, ConvertOptions, InputPaths};
use traj2vtu::export::VtuFormat;
use traj2vtu::schema::load_schema;

#[derive(Parser)]
#[command(name = "traj2vtu")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert <data_dir>/<data_split>.tfrecord into per-trajectory VTU series
    Convert {
        /// Dataset directory holding meta.json and the record files
        data_dir: PathBuf,
        /// Split name, e.g. train, valid or test
        data_split: String,
        /// Output directory; trajectory i goes to <output_dir>/i/
        output_dir: PathBuf,
        /// Write zlib-compressed binary VTU instead of ASCII
        #[arg(long)]
        binary: bool,
        /// Skip record CRC verification
        #[arg(long)]
        no_verify: bool,
        /// Exit with status 1 when an input file is missing
        #[arg(long)]
        strict: bool,
    },
    /// Show the dataset schema and, optionally, the record count of a split
    Info {
        /// Dataset directory holding meta.json
        data_dir: PathBuf,
        /// Split to count records in
        data_split: Option<String>,
        /// Skip record CRC verification
        #[arg(long)]
        no_verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Convert { data_dir, data_split, output_dir, binary, no_verify, strict } => {
            let options = ConvertOptions {
                format: if binary { VtuFormat::Binary } else { VtuFormat::Ascii },
                verify_checksums: !no_verify,
            };
            cmd_convert(&data_dir, &data_split, &output_dir, &options, strict)
        }
        Commands::Info { data_dir, data_split, no_verify } => {
            cmd_info(&data_dir, data_split.as_deref(), !no_verify)?;
            Ok(0)
        }
    }
}

/// Missing inputs end the run with a diagnostic, not a failure, unless strict.
fn cmd_convert(
    data_dir: &std::path::Path,
    data_split: &str,
    output_dir: &std::path::Path,
    options: &ConvertOptions,
    strict: bool,
) -> Result<i32> {
    let paths = InputPaths::resolve(data_dir, data_split);
    println!("# Data file: {}", paths.data_file.display());

    let missing_code = if strict { 1 } else { 0 };
    if !paths.data_file.is_file() {
        println!("# Error: could not find data file");
        return Ok(missing_code);
    }
    if !paths.meta_file.is_file() {
        println!("# Error: could not find meta file");
        return Ok(missing_code);
    }

    let schema = load_schema(&paths.meta_file)
        .with_context(|| format!("loading {}", paths.meta_file.display()))?;
    println!("# Found features:");
    for name in schema.features.keys() {
        println!("#   - {}", name);
    }

    let summary = convert_with_schema(&paths.data_file, &schema, output_dir, options)
        .with_context(|| format!("converting {}", paths.data_file.display()))?;
    println!(
        "# Wrote {} trajectories ({} frames) to {}",
        summary.trajectories,
        summary.frames,
        output_dir.display()
    );
    Ok(0)
}

fn cmd_info(data_dir: &std::path::Path, data_split: Option<&str>, verify: bool) -> Result<()> {
    let paths = InputPaths::resolve(data_dir, data_split.unwrap_or("train"));
    let schema = load_schema(&paths.meta_file)
        .with_context(|| format!("loading {}", paths.meta_file.display()))?;

    println!("Schema: {}", paths.meta_file.display());
    println!("Trajectory length: {}", schema.trajectory_length);
    println!();
    println!("Features ({}):", schema.features.len());
    for field in schema.features.values() {
        println!(
            "  {:<20} {:<8} {:<16} {:<15}{}",
            field.name,
            field.dtype,
            field.shape.to_string(),
            field.kind.name(),
            if field.for_sim { " for_sim" } else { "" }
        );
    }

    let undeclared: Vec<&String> = schema
        .field_names
        .iter()
        .filter(|n| !schema.features.contains_key(*n))
        .collect();
    if !undeclared.is_empty() {
        println!();
        println!("Record-only fields:");
        for name in undeclared {
            println!("  {}", name);
        }
    }

    if data_split.is_some() {
        let count = count_records(&paths.data_file, verify)
            .with_context(|| format!("reading {}", paths.data_file.display()))?;
        println!();
        println!("Records in {}: {}", paths.data_file.display(), count);
    }
    Ok(())
}
