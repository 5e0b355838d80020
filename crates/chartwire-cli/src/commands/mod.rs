//! Subcommand implementations and shared helpers.

pub mod config_cmd;
pub mod produce;
pub mod render;
pub mod status;

use std::path::{Path, PathBuf};

use chartwire_platform::Platform;
use chartwire_types::config::Config;

/// Load, normalize and validate the configuration.
///
/// With `config_override` the file must exist. Otherwise the discovery
/// chain is used and a missing file yields defaults.
pub async fn load_config<P: Platform>(
    platform: &P,
    config_override: Option<&str>,
) -> anyhow::Result<Config> {
    let raw = if let Some(path_str) = config_override {
        let path = Path::new(path_str);
        if !platform.fs().exists(path).await {
            anyhow::bail!("config file not found: {path_str}");
        }
        chartwire_platform::config_loader::load_config_file(platform.fs(), path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?
    } else {
        chartwire_platform::config_loader::load_config_raw(platform.fs(), platform.env())
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?
    };

    let config: Config = serde_json::from_value(raw)?;
    config.validate()?;
    Ok(config)
}

/// Discover the config file path (for display in `chartwire status`).
pub fn discover_config_path<P: Platform>(platform: &P) -> Option<PathBuf> {
    let home = platform.fs().home_dir();
    chartwire_platform::config_loader::discover_config_path(platform.env(), home)
}
