//! Straighten CLI: read and reset Exif orientation, and rotate or flip JPEG
//! files without re-encoding.
//!
//! Settings come from STRAIGHTEN_* environment variables or a `.env` file.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use straighten_cli::{init_tracing, move_into_place, output_dir, FileReport};
use straighten_core::{Orientation, OrientationMode, ProcessingConfig, TransformCode};
use straighten_processing::{
    jpeg_dimensions, looks_like_jpeg, looks_like_png, AutoOrientPipeline, JpegReader,
};

#[derive(Parser)]
#[command(name = "straighten", about = "Lossless JPEG orientation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Exif orientation of a JPEG or TIFF file
    Orientation {
        /// Path to the image
        file: PathBuf,
    },
    /// Overwrite the Exif orientation in place
    SetOrientation {
        /// Path to the image
        file: PathBuf,
        /// Orientation value (1-8)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=8))]
        value: u8,
    },
    /// Rotate or flip a JPEG without decoding pixels
    Transform {
        /// Path to the source JPEG
        file: PathBuf,
        /// rotate90, rotate180, rotate270, flip-h, flip-v, transpose, transverse or none
        #[arg(long)]
        op: TransformCode,
        /// Where to write the result (defaults to a file in the temp directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rotate files upright according to their Exif orientation
    AutoOrient {
        /// JPEG files to fix in place
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print file type, dimensions and orientation
    Info {
        /// Path to the image
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct InfoResponse {
    path: PathBuf,
    jpeg: bool,
    png: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progressive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lossless_transform: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orientation: Option<Orientation>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn info(pipeline: &AutoOrientPipeline, file: PathBuf) -> anyhow::Result<InfoResponse> {
    let jpeg = looks_like_jpeg(&file).with_context(|| format!("Read {}", file.display()))?;
    let png = looks_like_png(&file)?;
    let mut response = InfoResponse {
        path: file,
        jpeg,
        png,
        width: None,
        height: None,
        progressive: None,
        lossless_transform: None,
        orientation: None,
    };
    if !jpeg {
        return Ok(response);
    }

    let dims = jpeg_dimensions(&response.path)?;
    response.width = Some(dims.width);
    response.height = Some(dims.height);

    let data = fs::read(&response.path)?;
    let mut reader = JpegReader::new(&data);
    if let Ok(frame) = reader.read_header() {
        response.progressive = Some(frame.progressive());
        response.lossless_transform = Some(frame.check_mcu_aligned().is_ok());
    }
    response.orientation = pipeline.codec().read_orientation(&response.path).ok();
    Ok(response)
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ProcessingConfig::from_env()
        .context("Invalid configuration. Check the STRAIGHTEN_* environment variables")?;
    let pipeline = AutoOrientPipeline::new(&config);

    let cli = Cli::parse();

    match cli.command {
        Commands::Orientation { file } => {
            let orientation = pipeline
                .codec()
                .read_orientation(&file)
                .with_context(|| format!("Read orientation of {}", file.display()))?;
            print_json(&serde_json::json!({
                "path": file,
                "orientation": orientation,
                "transform": orientation.transform_code(),
            }))?;
        }
        Commands::SetOrientation { file, value } => {
            let orientation = Orientation::try_from(value)?;
            let written = pipeline
                .codec()
                .get_or_create_orientation(&file, OrientationMode::Write(orientation))
                .with_context(|| format!("Write orientation of {}", file.display()))?;
            print_json(&serde_json::json!({ "path": file, "orientation": written }))?;
        }
        Commands::Transform { file, op, out } => {
            let engine = pipeline.engine();
            let written = match out {
                Some(target) => {
                    let temp = engine
                        .transform_to(&file, op, output_dir(&target))
                        .with_context(|| format!("Transform {}", file.display()))?;
                    move_into_place(&temp, &target)
                        .with_context(|| format!("Write {}", target.display()))?;
                    target
                }
                None => engine
                    .transform(&file, op)
                    .with_context(|| format!("Transform {}", file.display()))?,
            };
            print_json(&serde_json::json!({
                "source": file,
                "output": written,
                "transform": op,
                "swapped_dimensions": op.swaps_dimensions(),
            }))?;
        }
        Commands::AutoOrient { files } => {
            let reports: Vec<FileReport> = files
                .iter()
                .map(|file| FileReport::from_result(file, pipeline.auto_orient(file)))
                .collect();
            print_json(&reports)?;

            let failed = reports.iter().filter(|r| r.failed()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} files could not be auto-oriented", failed, reports.len());
            }
        }
        Commands::Info { file } => {
            print_json(&info(&pipeline, file)?)?;
        }
    }

    Ok(())
}
