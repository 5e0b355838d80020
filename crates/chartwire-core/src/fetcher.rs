//! ArtifactFetcher: read referenced artifacts from object storage.
//!
//! Each read runs under a per-attempt deadline inside a [`RetryPolicy`].
//! [`ArtifactFetcher::fetch_all`] runs the reads for one request in
//! parallel, bounded by a semaphore, hands each buffer to a processing
//! function inside the same task, and reports results in completion order
//! tagged with each reference's original position. Raw buffers therefore
//! never outlive their permit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chartwire_platform::store::ObjectStore;
use chartwire_types::config::FetchConfig;
use chartwire_types::{ChartReference, FetchError, Locator};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::retry::{RetryConfig, RetryPolicy};

/// Result of fetching and processing one reference.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    /// Index of the reference in the request.
    pub position: usize,
    /// The reference that was fetched.
    pub reference: ChartReference,
    /// Processed artifact or the per-artifact failure.
    pub result: Result<T, FetchError>,
}

/// Applies a deadline to every read of the inner store.
struct Deadline {
    inner: Arc<dyn ObjectStore>,
    timeout: Duration,
}

#[async_trait]
impl ObjectStore for Deadline {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        match tokio::time::timeout(self.timeout, self.inner.get(locator)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                locator: locator.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Reads artifacts with timeouts, retry and bounded concurrency.
#[derive(Clone)]
pub struct ArtifactFetcher {
    store: Arc<RetryPolicy<Deadline>>,
    max_concurrency: usize,
}

impl ArtifactFetcher {
    /// Build a fetcher over `store` using the fetch settings.
    pub fn new(store: Arc<dyn ObjectStore>, config: &FetchConfig) -> Self {
        let deadline = Deadline {
            inner: store,
            timeout: config.timeout(),
        };
        Self {
            store: Arc::new(RetryPolicy::new(deadline, RetryConfig::from(&config.retry))),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Read one artifact.
    pub async fn fetch(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        self.store.get(locator).await
    }

    /// Read every reference, at most `max_concurrency` at a time, and run
    /// `process` on each buffer as soon as it is read, while the
    /// concurrency permit is still held.
    ///
    /// At most `max_concurrency` raw buffers are alive at once; only the
    /// processed values are collected. Outcomes arrive in completion order.
    /// When `cancel` fires, reads still waiting or in flight are abandoned
    /// and report [`FetchError::Cancelled`]; completed reads are kept.
    pub async fn fetch_all<T, F>(
        &self,
        references: Vec<ChartReference>,
        cancel: &CancellationToken,
        process: F,
    ) -> Vec<FetchOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(&ChartReference, Vec<u8>) -> T + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let process = Arc::new(process);
        let mut pending = FuturesUnordered::new();

        for (position, reference) in references.into_iter().enumerate() {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let process = Arc::clone(&process);
            let cancel = cancel.clone();
            let task_reference = reference.clone();

            let handle = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    result = async move {
                        let locator = Locator::parse(&task_reference.locator)?;
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .map_err(|_| FetchError::Cancelled)?;
                        debug!(chart_id = %task_reference.id, %locator, "fetching artifact");
                        let bytes = fetcher.fetch(&locator).await?;
                        debug!(
                            chart_id = %task_reference.id,
                            position,
                            bytes = bytes.len(),
                            "artifact fetched"
                        );
                        Ok(process(&task_reference, bytes))
                    } => result,
                }
            });

            pending.push(async move {
                let result = handle.await.unwrap_or_else(|e| {
                    Err(FetchError::Transient {
                        message: format!("fetch task failed: {e}"),
                    })
                });
                FetchOutcome {
                    position,
                    reference,
                    result,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(outcome) = pending.next().await {
            if let Err(err) = &outcome.result {
                warn!(
                    chart_id = %outcome.reference.id,
                    position = outcome.position,
                    locator = %outcome.reference.locator,
                    error = %err,
                    "artifact fetch failed"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl std::fmt::Debug for ArtifactFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactFetcher")
            .field("store", &self.store.name())
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwire_platform::store::MemoryObjectStore;
    use chartwire_types::config::RetrySettings;

    fn config(timeout_ms: u64, max_concurrency: usize) -> FetchConfig {
        FetchConfig {
            timeout_ms,
            max_concurrency,
            retry: RetrySettings {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
                jitter_fraction: 0.0,
            },
        }
    }

    fn raw(_: &ChartReference, bytes: Vec<u8>) -> Vec<u8> {
        bytes
    }

    fn reference(id: &str) -> ChartReference {
        ChartReference::new(id, id.to_uppercase(), format!("s3://charts/{id}.png"))
    }

    #[tokio::test]
    async fn fetch_reads_bytes() {
        let store = MemoryObjectStore::new().with_object("s3://charts/a.png", b"A".to_vec());
        let fetcher = ArtifactFetcher::new(Arc::new(store), &config(1_000, 3));
        let bytes = fetcher
            .fetch(&Locator::parse("s3://charts/a.png").unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, b"A");
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_are_retried() {
        let store = Arc::new(
            MemoryObjectStore::new()
                .with_object("s3://charts/a.png", b"A".to_vec())
                .with_delay("s3://charts/a.png", Duration::from_millis(200)),
        );
        let fetcher = ArtifactFetcher::new(store.clone(), &config(20, 3));
        let err = fetcher
            .fetch(&Locator::parse("s3://charts/a.png").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { timeout_ms: 20, .. }));
        assert_eq!(store.calls("s3://charts/a.png"), 3);
    }

    #[tokio::test]
    async fn invalid_locator_is_per_artifact() {
        let store = MemoryObjectStore::new().with_object("s3://charts/a.png", b"A".to_vec());
        let fetcher = ArtifactFetcher::new(Arc::new(store), &config(1_000, 3));
        let refs = vec![reference("a"), ChartReference::new("bad", "Bad", "ftp://nope/x")];

        let mut outcomes = fetcher.fetch_all(refs, &CancellationToken::new(), raw).await;
        outcomes.sort_by_key(|o| o.position);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(FetchError::InvalidLocator { .. })
        ));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let mut store = MemoryObjectStore::new();
        let mut refs = Vec::new();
        for i in 0..8 {
            let id = format!("c{i}");
            let loc = format!("s3://charts/{id}.png");
            store = store
                .with_object(&loc, vec![i as u8 + 1])
                .with_delay(&loc, Duration::from_millis(20));
            refs.push(reference(&id));
        }
        let store = Arc::new(store);
        let fetcher = ArtifactFetcher::new(store.clone(), &config(1_000, 3));

        let outcomes = fetcher.fetch_all(refs, &CancellationToken::new(), raw).await;
        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert!(store.peak_in_flight() <= 3, "peak {}", store.peak_in_flight());
        assert!(store.peak_in_flight() >= 2);
    }

    #[tokio::test]
    async fn outcomes_carry_positions_in_completion_order() {
        let store = MemoryObjectStore::new()
            .with_object("s3://charts/a.png", b"A".to_vec())
            .with_object("s3://charts/b.png", b"B".to_vec())
            .with_object("s3://charts/c.png", b"C".to_vec())
            .with_delay("s3://charts/a.png", Duration::from_millis(60))
            .with_delay("s3://charts/b.png", Duration::from_millis(120));
        let fetcher = ArtifactFetcher::new(Arc::new(store), &config(1_000, 3));

        let outcomes = fetcher
            .fetch_all(
                vec![reference("a"), reference("b"), reference("c")],
                &CancellationToken::new(),
                raw,
            )
            .await;
        let order: Vec<(usize, &str)> = outcomes
            .iter()
            .map(|o| (o.position, o.reference.id.as_str()))
            .collect();
        assert_eq!(order, [(2, "c"), (0, "a"), (1, "b")]);
    }

    #[tokio::test]
    async fn cancellation_keeps_completed_reads() {
        let store = MemoryObjectStore::new()
            .with_object("s3://charts/fast.png", b"F".to_vec())
            .with_object("s3://charts/slow.png", b"S".to_vec())
            .with_delay("s3://charts/slow.png", Duration::from_secs(30));
        let fetcher = ArtifactFetcher::new(Arc::new(store), &config(60_000, 3));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut outcomes = fetcher
            .fetch_all(vec![reference("fast"), reference("slow")], &cancel, raw)
            .await;
        outcomes.sort_by_key(|o| o.position);
        assert_eq!(outcomes[0].result.as_deref().unwrap(), b"F");
        assert_eq!(outcomes[1].result, Err(FetchError::Cancelled));
    }

    #[tokio::test]
    async fn buffers_are_processed_as_they_arrive() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut store = MemoryObjectStore::new();
        let mut refs = Vec::new();
        for i in 0..8u64 {
            let id = format!("c{i}");
            let loc = format!("s3://charts/{id}.png");
            store = store
                .with_object(&loc, vec![i as u8; 256])
                .with_delay(&loc, Duration::from_millis(10 + 5 * i));
            refs.push(reference(&id));
        }
        let store = Arc::new(store);
        let fetcher = ArtifactFetcher::new(store.clone(), &config(1_000, 2));

        let processed = Arc::new(AtomicUsize::new(0));
        let peak_live = Arc::new(AtomicUsize::new(0));
        let first_seen_at = Arc::new(AtomicUsize::new(usize::MAX));
        let process = {
            let store = store.clone();
            let processed = processed.clone();
            let peak_live = peak_live.clone();
            let first_seen_at = first_seen_at.clone();
            move |_: &ChartReference, bytes: Vec<u8>| {
                let delivered = store.delivered();
                let done = processed.load(Ordering::SeqCst);
                peak_live.fetch_max(delivered.saturating_sub(done), Ordering::SeqCst);
                first_seen_at.fetch_min(delivered, Ordering::SeqCst);
                processed.fetch_add(1, Ordering::SeqCst);
                bytes.len()
            }
        };

        let outcomes = fetcher
            .fetch_all(refs, &CancellationToken::new(), process)
            .await;
        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| o.result == Ok(256)));
        assert_eq!(store.delivered(), 8);
        assert!(peak_live.load(Ordering::SeqCst) <= 2);
        assert!(first_seen_at.load(Ordering::SeqCst) < 8);
    }
}
