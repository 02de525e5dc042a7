//! Build an image-editing testset manifest from a source metadata index.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use editset::{BuildOptions, Mode, build_testset};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build an image-editing evaluation testset")]
struct Args {
    /// Dataset mode: drone, walk, or egovid
    #[arg(long)]
    mode: Mode,

    /// Path to the source metadata JSON (array or keyed object)
    #[arg(long)]
    source_json: PathBuf,

    /// Fallback directory for image verification (egovid mode)
    #[arg(long)]
    image_dir: PathBuf,

    /// Path for the output testset JSON
    #[arg(long)]
    output_path: PathBuf,

    /// Optional comma-separated record ids to keep
    #[arg(long)]
    filter_ids: Option<String>,

    /// Audit-log path (default: <output dir>/logs/<mode>.json)
    #[arg(long)]
    log_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let filter_ids: Option<HashSet<String>> = args.filter_ids.map(|ids| {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    });

    let options = BuildOptions {
        mode: args.mode,
        source_json: args.source_json,
        image_dir: args.image_dir,
        output_path: args.output_path.clone(),
        filter_ids,
        log_path: args.log_path,
    };

    let report = build_testset(&options).context("testset build failed")?;
    tracing::info!(
        emitted = report.emitted,
        missing = report.files_missing,
        output = %args.output_path.display(),
        "testset written"
    );
    Ok(())
}
