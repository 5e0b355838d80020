//! Configuration schema types.
//!
//! All structs accept both `snake_case` and `camelCase` field names in JSON
//! via `#[serde(alias)]`, and every section falls back to its defaults when
//! absent. Unknown fields are ignored.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChartwireError, Result};

/// Page name used for charts without an explicit page assignment.
pub const DEFAULT_PAGE: &str = "unknown_page";

/// Default size ceiling for a single artifact (10 MB).
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 10 * 1024 * 1024;

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Object-storage access.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fetch timeouts, concurrency and retry.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Encoder limits.
    #[serde(default)]
    pub encoding: EncodingConfig,

    /// Request-level behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Reject settings that would make the pipeline unable to run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ChartwireError::ConfigInvalid {
                reason: reason.to_string(),
            })
        };

        if self.fetch.max_concurrency == 0 {
            return invalid("fetch.max_concurrency must be at least 1");
        }
        if self.fetch.timeout_ms == 0 {
            return invalid("fetch.timeout_ms must be greater than zero");
        }
        if self.pipeline.request_timeout_secs == 0 {
            return invalid("pipeline.request_timeout_secs must be greater than zero");
        }
        if self.encoding.max_artifact_bytes == 0 {
            return invalid("encoding.max_artifact_bytes must be greater than zero");
        }
        if self.pipeline.default_page.trim().is_empty() {
            return invalid("pipeline.default_page must not be empty");
        }
        if !(0.0..=1.0).contains(&self.fetch.retry.jitter_fraction) {
            return invalid("fetch.retry.jitter_fraction must be within 0.0..=1.0");
        }
        if self.fetch.retry.base_delay_ms > self.fetch.retry.max_delay_ms {
            return invalid("fetch.retry.base_delay_ms must not exceed max_delay_ms");
        }
        Ok(())
    }
}

// ── Storage ──────────────────────────────────────────────────────────────

/// Object-storage access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL for S3-style locators. When unset, the regional AWS
    /// endpoint is derived from [`region`](Self::region).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Region used to derive the default endpoint.
    #[serde(default = "default_region")]
    pub region: String,

    /// Extra headers sent with every storage request (e.g. a session token).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Directory that `file://` locators must resolve under. Unrestricted
    /// when unset.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_region() -> String {
    "ap-southeast-1".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            headers: HashMap::new(),
            root: None,
        }
    }
}

impl StorageConfig {
    /// The endpoint S3 locators are resolved against, without a trailing slash.
    pub fn effective_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}

// ── Fetch ────────────────────────────────────────────────────────────────

/// Fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Deadline for a single fetch attempt, in milliseconds.
    #[serde(default = "default_timeout_ms", alias = "timeoutMs")]
    pub timeout_ms: u64,

    /// Maximum number of fetches in flight for one request.
    #[serde(default = "default_max_concurrency", alias = "maxConcurrency")]
    pub max_concurrency: usize,

    /// Backoff policy for transient failures.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    3
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            retry: RetrySettings::default(),
        }
    }
}

impl FetchConfig {
    /// Per-attempt deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Additional attempts after the first one.
    #[serde(default = "default_max_retries", alias = "maxRetries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms", alias = "baseDelayMs")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms", alias = "maxDelayMs")]
    pub max_delay_ms: u64,

    /// Random jitter added on top of each delay, as a fraction of it.
    #[serde(default = "default_jitter_fraction", alias = "jitterFraction")]
    pub jitter_fraction: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_jitter_fraction() -> f64 {
    0.25
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Largest artifact accepted, in bytes.
    #[serde(default = "default_max_artifact_bytes", alias = "maxArtifactBytes")]
    pub max_artifact_bytes: usize,
}

fn default_max_artifact_bytes() -> usize {
    DEFAULT_MAX_ARTIFACT_BYTES
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            max_artifact_bytes: default_max_artifact_bytes(),
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// What to do when a single chart fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Replace the chart with an unavailable marker and carry on.
    #[default]
    Degrade,
    /// Fail the whole request.
    Abort,
}

/// Request-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-chart failure handling.
    #[serde(default, alias = "failurePolicy")]
    pub failure_policy: FailurePolicy,

    /// Overall deadline for one producer request, in seconds.
    #[serde(default = "default_request_timeout_secs", alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,

    /// Page used for charts with no page assignment.
    #[serde(default = "default_page", alias = "defaultPage")]
    pub default_page: String,
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_page() -> String {
    DEFAULT_PAGE.into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
            default_page: default_page(),
        }
    }
}

impl PipelineConfig {
    /// Overall request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
