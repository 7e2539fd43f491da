// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Takes one still picture through the camera pipeline and writes it to a file.
//!
//! The pipeline runs on the software mock driver, so no camera is needed:
//!
//! ```text
//! RUST_LOG=mmal=debug cargo run --example still_capture -- --output still.jpg
//! ```

use std::{fs::File, io::Write, path::PathBuf, sync::Arc};

use clap::Parser;
use mmal::{MmalInstance, StillCapture, config::CaptureSettings, mock::MockDriver};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "still_capture")]
#[command(about = "Capture one still image through the MMAL pipeline")]
#[command(version)]
struct Cli {
    /// JSON capture settings; command-line values override it
    #[arg(short, long, env = "MMAL_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Output file path
    #[arg(short, long, default_value = "still.jpg")]
    output: PathBuf,

    /// Write the raw camera frame instead of an encoded image
    #[arg(long)]
    no_encoder: bool,

    /// Log engine lifecycle at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Logs to stdout at INFO, or DEBUG with `--verbose`; `RUST_LOG` takes precedence.
fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_thread_names(true)
        .init();
}

fn main() -> Result<(), mmal::Error> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => CaptureSettings::from_path(path)?,
        None => CaptureSettings::default(),
    };
    if let Some(width) = cli.width {
        settings.width = width;
    }
    if let Some(height) = cli.height {
        settings.height = height;
    }
    if cli.no_encoder {
        settings.use_encoder = false;
    }

    let instance = MmalInstance::new(Arc::new(MockDriver::with_defaults()));
    let mut capture = StillCapture::new(instance.clone(), settings);
    let mut file = File::create(&cli.output)?;
    let stats = capture.capture_once(|buffer| {
        file.write_all(buffer.data())?;
        Ok(())
    })?;
    file.flush()?;

    info!(
        output = %cli.output.display(),
        buffers = stats.buffers,
        bytes = stats.bytes,
        "Wrote still image"
    );
    instance.destroy()
}
