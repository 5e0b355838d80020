//! `chartwire config` -- display resolved configuration.

use chartwire_types::config::Config;

/// Print the resolved configuration as formatted JSON.
pub fn config_show(config: &Config) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_show_serializes_defaults() {
        config_show(&Config::default()).unwrap();
    }
}
