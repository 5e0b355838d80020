//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. `CHARTWIRE_CONFIG` environment variable (absolute path).
//! 2. `~/.chartwire/config.json`
//! 3. If none found, return an empty JSON object (`{}`), so every section
//!    takes its defaults.
//!
//! JSON keys are normalized from camelCase to snake_case before returning.
//! Keys inside a `headers` object are left untouched because they are
//! header names, not schema fields.

use std::path::PathBuf;

use serde_json::Value;

/// Environment variable that overrides config discovery.
pub const CONFIG_ENV_VAR: &str = "CHARTWIRE_CONFIG";

/// Directory under the home directory holding the default config file.
pub const CONFIG_DIR: &str = ".chartwire";

/// Discover the config file path using the fallback chain.
///
/// Returns `None` if no config file exists at any of the candidate
/// locations. A path taken from `CHARTWIRE_CONFIG` is returned without an
/// existence check; [`load_config_raw`] reports it if it is missing.
pub fn discover_config_path(
    env: &dyn super::env::Environment,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(env_path) = env.get_var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }

    let path = home_dir?.join(CONFIG_DIR).join("config.json");
    path.exists().then_some(path)
}

/// Load raw JSON configuration using the discovery algorithm.
///
/// Returns the parsed and key-normalized JSON value. The caller deserializes
/// this into a typed `Config`. If no config file is found, returns an empty
/// JSON object.
pub async fn load_config_raw(
    fs: &dyn super::fs::FileSystem,
    env: &dyn super::env::Environment,
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let home = fs.home_dir();
    let Some(path) = discover_config_path(env, home) else {
        tracing::info!("no config file found, using defaults");
        return Ok(Value::Object(serde_json::Map::new()));
    };

    if !fs.exists(&path).await {
        tracing::warn!(
            path = %path.display(),
            "config path does not exist, using defaults"
        );
        return Ok(Value::Object(serde_json::Map::new()));
    }

    load_config_file(fs, &path).await
}

/// Read, parse and normalize one config file.
pub async fn load_config_file(
    fs: &dyn super::fs::FileSystem,
    path: &std::path::Path,
) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    tracing::debug!(path = %path.display(), "loading config file");
    let contents = fs
        .read_to_string(path)
        .await
        .map_err(|e| format!("failed to read config file {}: {}", path.display(), e))?;

    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| format!("failed to parse config file {}: {}", path.display(), e))?;

    Ok(normalize_keys(value))
}

/// Convert camelCase JSON keys to snake_case recursively.
///
/// Objects stored under a `headers` key keep their keys verbatim.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (key, val) in map {
                let snake_key = camel_to_snake(&key);
                let val = if snake_key == "headers" {
                    val
                } else {
                    normalize_keys(val)
                };
                new_map.insert(snake_key, val);
            }
            Value::Object(new_map)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Convert a single camelCase string to snake_case.
///
/// A run of uppercase letters like `"HTTP"` is kept together, with an
/// underscore inserted only before the last uppercase letter if it is
/// followed by a lowercase letter.
///
/// # Examples
/// ```
/// # use chartwire_platform::config_loader::camel_to_snake;
/// assert_eq!(camel_to_snake("timeoutMs"), "timeout_ms");
/// assert_eq!(camel_to_snake("already_snake"), "already_snake");
/// assert_eq!(camel_to_snake("maxHTTPRetries"), "max_http_retries");
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();

            if prev.is_lowercase()
                || (prev.is_uppercase() && next.is_some_and(|c| c.is_lowercase()))
            {
                result.push('_');
            }
        }
        result.push(ch.to_ascii_lowercase());
    }
    result
}
