//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod recover;
pub mod schema;

use std::path::Path;

use clap::Args;
use tracing::{debug, info};

use invex_core::models::config::InvexConfig;

/// Inference settings shared by the commands that call the model.
#[derive(Args)]
pub struct InferenceArgs {
    /// Inference service base URL
    #[arg(long)]
    url: Option<String>,

    /// Served model name
    #[arg(short, long)]
    model: Option<String>,

    /// Normalize records to the invoice schema
    #[arg(long)]
    validate: bool,

    /// Do not constrain decoding with the invoice JSON schema
    #[arg(long)]
    no_guided: bool,
}

impl InferenceArgs {
    pub fn apply(&self, config: &mut InvexConfig) {
        if let Some(url) = &self.url {
            config.inference.url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if self.validate {
            config.pipeline.validate = true;
        }
        if self.no_guided {
            config.pipeline.guided_decoding = false;
        }
    }
}

/// Load configuration: explicit file, else the user config file when it
/// exists, else defaults; then the environment on top.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvexConfig> {
    let mut config = match config_path {
        Some(path) => InvexConfig::from_file(Path::new(path))?,
        None => {
            let user_path = config::default_config_path();
            if user_path.exists() {
                debug!("Using config file {}", user_path.display());
                InvexConfig::from_file(&user_path)?
            } else {
                InvexConfig::default()
            }
        }
    };

    config.apply_env()?;
    Ok(config)
}

/// Log the model settings a run uses.
pub fn log_model_settings(config: &InvexConfig) {
    info!(
        "Model {} at {} (gpu_memory_utilization={}, max_num_seqs={}, max_model_len={})",
        config.model.name,
        config.inference.url,
        config.model.gpu_memory_utilization,
        config.model.max_num_seqs,
        config.model.max_model_len
    );
    info!(
        "Sampling: max_tokens={}, temperature={}, guided_decoding={}, validate={}",
        config.sampling.max_tokens,
        config.sampling.temperature,
        config.pipeline.guided_decoding,
        config.pipeline.validate
    );
}
