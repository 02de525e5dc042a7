//! Fill manifest records with model-generated edit commands, in batches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use editset::{
    Mode, OpenAiBackend, PromptConfig, PromptEngine, RecordSet, SamplingOptions,
    manifest::write_json_atomic,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize edit commands for a testset manifest")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Override the configured dataset mode
    #[arg(long)]
    mode: Option<Mode>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = PromptConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let mode = config.resolve_mode(args.mode)?;
    let manifest_path = config.manifest_path(mode);

    let mut records = RecordSet::load(&manifest_path)
        .with_context(|| format!("failed to load manifest {}", manifest_path.display()))?;
    tracing::info!(mode = %mode, manifest = %manifest_path.display(), records = records.len(), "manifest loaded");

    let backend = OpenAiBackend::connect(&config.engine.endpoint, &config.models.vlm_path)
        .context("backend initialisation failed")?;

    let engine = PromptEngine::new(
        config.engine.batch_size,
        SamplingOptions {
            temperature: config.engine.temperature,
            max_tokens: config.engine.max_tokens,
        },
        config.families(mode)?,
    );

    let stats = engine.run(&mut records, mode, &backend, &manifest_path)?;
    tracing::info!(
        completed = stats.items_completed,
        dropped = stats.inputs_dropped,
        failed_batches = stats.batches_failed,
        "run finished"
    );

    let summary_path = config.run_log_path(mode);
    write_json_atomic(&summary_path, &stats)
        .with_context(|| format!("failed to write run summary {}", summary_path.display()))?;
    Ok(())
}
