//! Batch command - extract every image under an S3 prefix.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::info;

use invex_core::storage::{BlobStore, S3Store};
use invex_core::{BatchPipeline, InferenceBackend, OllamaBackend};

use super::{InferenceArgs, load_config, log_model_settings};
use crate::summary::{print_report, spinner, write_summary};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Bucket holding source images and the output dataset
    #[arg(short, long)]
    bucket: Option<String>,

    /// Prefix of the source images
    #[arg(short, long)]
    source_prefix: Option<String>,

    /// Output key, or prefix ending in `/`
    #[arg(short, long)]
    destination_prefix: Option<String>,

    /// AWS region override
    #[arg(long)]
    region: Option<String>,

    /// S3-compatible endpoint (e.g. MinIO)
    #[arg(long)]
    endpoint: Option<String>,

    #[command(flatten)]
    inference: InferenceArgs,

    /// Also write a per-record summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;

    let storage = &mut config.storage;
    if let Some(bucket) = args.bucket {
        storage.bucket = bucket;
    }
    if let Some(prefix) = args.source_prefix {
        storage.source_prefix = prefix;
    }
    if let Some(prefix) = args.destination_prefix {
        storage.destination_prefix = prefix;
    }
    if args.region.is_some() {
        storage.region = args.region;
    }
    if args.endpoint.is_some() {
        storage.endpoint = args.endpoint;
    }
    args.inference.apply(&mut config);

    config.validate()?;
    config.require_storage()?;
    log_model_settings(&config);

    let backend: Arc<dyn InferenceBackend> = Arc::new(OllamaBackend::new(config.ollama_config())?);
    let store: Arc<dyn BlobStore> = Arc::new(S3Store::new(&config.storage).await);
    let location = store.location();
    info!(
        "Source {}/{}, destination {}/{}",
        location,
        config.storage.source_prefix,
        location,
        config.destination_key()
    );

    let pipeline = BatchPipeline::from_config(&config, store.clone(), store, backend);

    let pb = spinner(&format!(
        "Extracting {}/{}",
        location, config.storage.source_prefix
    ));
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
