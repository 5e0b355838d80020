//! `chartwire status` -- show configuration status.

use chartwire_platform::NativePlatform;
use chartwire_platform::config_loader::{CONFIG_DIR, CONFIG_ENV_VAR};

use super::{discover_config_path, load_config};

/// Run the status command.
pub async fn run() -> anyhow::Result<()> {
    let platform = NativePlatform::new();

    println!("chartwire status");
    println!("================");
    println!();

    match discover_config_path(&platform) {
        Some(path) => println!("Config: {}", path.display()),
        None => {
            println!("Config: not found");
            println!("  Searched: ~/{CONFIG_DIR}/config.json");
            println!("  Set {CONFIG_ENV_VAR} env var to override");
            println!();
            println!("Using defaults:");
        }
    }

    let config = load_config(&platform, None).await?;

    println!();
    println!("Storage:");
    println!("  Endpoint:           {}", config.storage.effective_endpoint());
    println!("  Region:             {}", config.storage.region);
    match &config.storage.root {
        Some(root) => println!("  File root:          {}", root.display()),
        None => println!("  File root:          (unrestricted)"),
    }

    println!();
    println!("Fetch:");
    println!("  Timeout:            {} ms", config.fetch.timeout_ms);
    println!("  Max concurrency:    {}", config.fetch.max_concurrency);
    println!("  Max retries:        {}", config.fetch.retry.max_retries);

    println!();
    println!("Pipeline:");
    println!("  Failure policy:     {:?}", config.pipeline.failure_policy);
    println!(
        "  Request timeout:    {} s",
        config.pipeline.request_timeout_secs
    );
    println!("  Default page:       {}", config.pipeline.default_page);
    println!(
        "  Max artifact size:  {} bytes",
        config.encoding.max_artifact_bytes
    );

    Ok(())
}
