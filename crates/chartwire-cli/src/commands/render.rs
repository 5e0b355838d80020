//! `chartwire render` -- consumer side of the pipeline.
//!
//! Reads a wire response, decodes its export bundle, resolves the template
//! and writes `document.md` plus one file per chart under `charts/`.
//!
//! # Example
//!
//! ```text
//! chartwire render --response response.json --out-dir report/
//! ```

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use chartwire_core::DocumentBuilder;
use chartwire_core::resolver::FinalDocument;
use chartwire_platform::fs::FileSystem;
use chartwire_platform::{NativePlatform, Platform};
use chartwire_types::WireResponse;
use clap::Args;
use tracing::info;

/// Name of the document written into the output directory.
pub const DOCUMENT_FILE: &str = "document.md";

/// Arguments for the `chartwire render` subcommand.
#[derive(Args)]
pub struct RenderArgs {
    /// Wire response JSON produced by `chartwire produce`.
    #[arg(short, long)]
    pub response: PathBuf,

    /// Directory to write the document and chart files into.
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Template to resolve instead of the bundle's own.
    #[arg(short, long)]
    pub template: Option<PathBuf>,
}

/// Run the render command.
pub async fn run(args: RenderArgs) -> anyhow::Result<()> {
    let platform = NativePlatform::new();
    let fs = platform.fs();

    let raw = fs
        .read_to_string(&args.response)
        .await
        .with_context(|| format!("failed to read {}", args.response.display()))?;
    let response: WireResponse =
        serde_json::from_str(&raw).context("response is not a valid wire response")?;

    let template = match &args.template {
        Some(path) => Some(
            fs.read_to_string(path)
                .await
                .with_context(|| format!("failed to read template {}", path.display()))?,
        ),
        None => None,
    };

    let document = DocumentBuilder.build(&response.export_bundle, template.as_deref());
    write_document(fs, &args.out_dir, &document).await?;

    println!(
        "rendered {} chart(s), {} unavailable, into {}",
        document.assets.len(),
        document.unavailable.len(),
        args.out_dir.display()
    );
    if !document.missing.is_empty() {
        println!("not referenced by the template: {}", document.missing.join(", "));
    }
    Ok(())
}

/// Write the document body and every asset under `out_dir`.
///
/// Asset file names must be relative paths made only of normal segments;
/// anything that would land outside `out_dir` is refused before writing.
pub async fn write_document(
    fs: &dyn FileSystem,
    out_dir: &Path,
    document: &FinalDocument,
) -> anyhow::Result<()> {
    let paths = document
        .assets
        .iter()
        .map(|asset| asset_path(out_dir, &asset.file_name))
        .collect::<anyhow::Result<Vec<_>>>()?;

    fs.create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for (asset, path) in document.assets.iter().zip(paths) {
        fs.write_bytes(&path, &asset.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(chart_id = %asset.chart_id, path = %path.display(), "chart written");
    }

    let path = out_dir.join(DOCUMENT_FILE);
    fs.write_string(&path, &document.body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn asset_path(out_dir: &Path, file_name: &str) -> anyhow::Result<PathBuf> {
    let relative = Path::new(file_name);
    let contained = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    let path = out_dir.join(relative);
    if !contained || !path.starts_with(out_dir) {
        bail!(
            "refusing to write asset {file_name:?} outside {}",
            out_dir.display()
        );
    }
    Ok(path)
}
