//! `chartwire` -- CLI binary for the chart-artifact pipeline.
//!
//! Provides the following subcommands:
//!
//! - `chartwire produce` -- Fetch the charts of a request and write the wire response.
//! - `chartwire render` -- Rebuild a document and its chart files from a wire response.
//! - `chartwire status` -- Show configuration status.
//! - `chartwire config show` -- Print the resolved configuration.

use clap::{Parser, Subcommand};

mod commands;

/// Chart-artifact pipeline CLI.
#[derive(Parser)]
#[command(name = "chartwire", about = "Chart-artifact pipeline CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch and encode the charts of a request, then write the wire response.
    Produce(commands::produce::ProduceArgs),

    /// Rebuild a document and its chart files from a wire response.
    Render(commands::render::RenderArgs),

    /// Show configuration status.
    Status,

    /// Show resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

/// Subcommands for `chartwire config`.
#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the full resolved configuration as JSON.
    Show {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Produce(args) => commands::produce::run(args).await?,
        Commands::Render(args) => commands::render::run(args).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Config { action } => {
            let platform = chartwire_platform::NativePlatform::new();
            match action {
                ConfigCmd::Show { config } => {
                    let cfg = commands::load_config(&platform, config.as_deref()).await?;
                    commands::config_cmd::config_show(&cfg)?;
                }
            }
        }
    }

    Ok(())
}
