//! Process command - extract every image in a local directory.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;

use invex_core::{BatchPipeline, BlobStore, InferenceBackend, LocalStore, OllamaBackend};

use super::{InferenceArgs, load_config, log_model_settings};
use crate::summary::{print_report, spinner, write_summary};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Directory containing invoice images
    #[arg(required = true)]
    input: PathBuf,

    /// Output JSONL file
    #[arg(short, long, default_value = "data.jsonl")]
    output: PathBuf,

    /// Only process keys under this sub-path of the input directory
    #[arg(short, long, default_value = "")]
    prefix: String,

    #[command(flatten)]
    inference: InferenceArgs,

    /// Also write a per-record summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    args.inference.apply(&mut config);
    config.validate()?;
    log_model_settings(&config);

    if !args.input.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input.display());
    }

    let output_name = args
        .output
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid output path: {}", args.output.display()))?
        .to_string();
    let output_dir = match args.output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let backend: Arc<dyn InferenceBackend> = Arc::new(OllamaBackend::new(config.ollama_config())?);
    let source: Arc<dyn BlobStore> = Arc::new(LocalStore::new(&args.input));
    let sink: Arc<dyn BlobStore> = Arc::new(LocalStore::new(&output_dir));
    let location = sink.location();

    let pipeline = BatchPipeline::from_config(&config, source, sink, backend)
        .with_source_prefix(args.prefix.as_str())
        .with_output_key(output_name);

    let pb = spinner(&format!("Extracting {}", args.input.display()));
    let result = pipeline.run().await;
    pb.finish_and_clear();
    let report = result?;

    print_report(&report, &location);

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &report.records)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    Ok(())
}
