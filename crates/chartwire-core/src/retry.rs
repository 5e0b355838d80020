//! Exponential backoff retry logic for object-store reads.
//!
//! [`RetryPolicy`] wraps any [`ObjectStore`] and retries transient failures
//! (timeouts, throttling, 5xx, transport errors) with configurable
//! exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use chartwire_platform::store::ObjectStore;
use chartwire_types::config::RetrySettings;
use chartwire_types::{FetchError, Locator};
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    pub max_retries: u32,
    /// Base delay between retries (default: 200 ms).
    pub base_delay: Duration,
    /// Maximum delay between retries (default: 5 seconds).
    pub max_delay: Duration,
    /// Jitter factor: random 0..jitter_fraction of the delay is added (default: 0.25).
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter_fraction: settings.jitter_fraction,
        }
    }
}

/// Determines whether a [`FetchError`] should be retried.
pub fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Transient { .. } | FetchError::Timeout { .. } => true,
        FetchError::NotFound { .. }
        | FetchError::Unauthorized { .. }
        | FetchError::Rejected { .. }
        | FetchError::InvalidLocator { .. }
        | FetchError::TooLarge { .. }
        | FetchError::Cancelled => false,
    }
}

/// Calculate delay for attempt `n` (0-indexed) with exponential backoff + jitter.
///
/// The delay is `min(base_delay * 2^n, max_delay)` plus a random jitter of
/// `0..jitter_fraction * delay`.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let base_ms = config.base_delay.as_millis() as u64;
    let raw_ms = base_ms.saturating_mul(exp);
    let capped_ms = raw_ms.min(config.max_delay.as_millis() as u64);

    let jitter_max_ms = (capped_ms as f64 * config.jitter_fraction) as u64;
    let jitter_ms = if jitter_max_ms > 0 {
        // Pseudo-random from system time nanoseconds.
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        seed % (jitter_max_ms + 1)
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter_ms)
}

/// A store wrapper that retries transient failures with exponential backoff.
///
/// # Example
///
/// ```rust,ignore
/// use chartwire_core::retry::{RetryConfig, RetryPolicy};
///
/// let store = RetryPolicy::new(inner, RetryConfig::default());
/// // store.get() now retries on transient errors.
/// ```
pub struct RetryPolicy<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: ObjectStore> RetryPolicy<S> {
    /// Wrap a store with retry logic.
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryPolicy<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.inner.get(locator).await {
                Ok(bytes) => {
                    if attempt > 0 {
                        debug!(
                            store = %self.inner.name(),
                            %locator,
                            attempt,
                            "fetch succeeded after retry"
                        );
                    }
                    return Ok(bytes);
                }
                Err(err) => {
                    if !is_retryable(&err) || attempt >= self.config.max_retries {
                        return Err(err);
                    }

                    let delay = compute_delay(&self.config, attempt);
                    warn!(
                        store = %self.inner.name(),
                        %locator,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl<S> std::fmt::Debug for RetryPolicy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
