//! CLI application for batch invoice extraction.

mod commands;
mod summary;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{batch, config, process, recover, schema};

/// Invoice extraction - turn invoice images into JSON Lines with a vision model
#[derive(Parser)]
#[command(name = "invex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every image under an S3 prefix into a JSONL dataset
    Batch(batch::BatchArgs),

    /// Extract every image in a local directory into a JSONL file
    Process(process::ProcessArgs),

    /// Rebuild records from saved raw completions, without inference
    Recover(recover::RecoverArgs),

    /// Print the extraction prompt or the invoice JSON schema
    Schema(schema::SchemaArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()).await,
        Commands::Process(args) => process::run(args, cli.config.as_deref()).await,
        Commands::Recover(args) => recover::run(args).await,
        Commands::Schema(args) => schema::run(args).await,
        Commands::Config(args) => config::run(args, cli.config.as_deref()).await,
    }
}
