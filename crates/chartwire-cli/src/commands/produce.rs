//! `chartwire produce` -- run the producer pipeline for one request.
//!
//! Reads a `ChartRequest` as JSON from a file or stdin, fetches every
//! referenced chart through the native object store, and writes the guarded
//! `WireResponse` JSON to a file or stdout.
//!
//! # Example
//!
//! ```text
//! chartwire produce --request request.json --output response.json
//! cat request.json | chartwire produce --request -
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chartwire_core::{ChartPipeline, guard};
use chartwire_platform::store::NativeObjectStore;
use chartwire_platform::{NativePlatform, Platform};
use chartwire_types::ChartRequest;
use clap::Args;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_config;

/// Arguments for the `chartwire produce` subcommand.
#[derive(Args)]
pub struct ProduceArgs {
    /// Request JSON file, or `-` for stdin.
    #[arg(short, long)]
    pub request: String,

    /// Write the response here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Run the produce command.
pub async fn run(args: ProduceArgs) -> anyhow::Result<()> {
    let platform = NativePlatform::new();
    let config = load_config(&platform, args.config.as_deref()).await?;

    let raw = if args.request == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read request from stdin")?;
        buf
    } else {
        platform
            .fs()
            .read_to_string(Path::new(&args.request))
            .await
            .with_context(|| format!("failed to read request {}", args.request))?
    };
    let request: ChartRequest =
        serde_json::from_str(&raw).context("request is not a valid chart request")?;

    let store = Arc::new(NativeObjectStore::with_max_bytes(
        &config.storage,
        config.encoding.max_artifact_bytes as u64,
    ));
    let pipeline = ChartPipeline::new(store, &config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with charts fetched so far");
            on_signal.cancel();
        }
    });

    let response = pipeline.run(request, cancel).await?;
    let value = guard::check_response(&response)?;
    let json = serde_json::to_string_pretty(&value)?;

    match args.output {
        Some(path) => {
            platform
                .fs()
                .write_string(&path, &json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "response written");
        }
        None => println!("{json}"),
    }

    let summary = &response.summary;
    eprintln!(
        "charts: {} total, {} embedded, {} unavailable ({} ms{})",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.elapsed_ms,
        if summary.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}
