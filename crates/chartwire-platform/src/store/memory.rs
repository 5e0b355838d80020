use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chartwire_types::{FetchError, Locator};

use super::ObjectStore;

/// In-memory store with scripted behavior.
///
/// Objects, delays and failures are keyed by the locator's canonical string
/// form, so `https://b.s3.amazonaws.com/k` and `s3://b/k` address the same
/// object. Scripted failures are returned in order, one per call, before
/// the stored object (if any) is served.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delivered: AtomicUsize,
}

fn canonical(locator: &str) -> String {
    Locator::parse(locator)
        .map(|l| l.to_string())
        .unwrap_or_else(|_| locator.to_string())
}

impl MemoryObjectStore {
    /// An empty store. Every read is `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object.
    pub fn with_object(mut self, locator: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(canonical(locator), bytes.into());
        self
    }

    /// Delay every read of `locator`.
    pub fn with_delay(mut self, locator: &str, delay: Duration) -> Self {
        self.delays.insert(canonical(locator), delay);
        self
    }

    /// Fail the next reads of `locator` with `errors`, in order.
    pub fn with_failures(self, locator: &str, errors: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(canonical(locator))
            .or_default()
            .extend(errors);
        self
    }

    /// How many reads of `locator` have started.
    pub fn calls(&self, locator: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&canonical(locator))
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of reads that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// How many object buffers have been handed out by successful reads.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

/// Tracks one in-progress read; dropped when the read finishes or is
/// abandoned.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        let key = locator.to_string();
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default() += 1;

        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        if let Some(err) = scripted {
            return Err(err);
        }

        let bytes = self
            .objects
            .get(&key)
            .cloned()
            .ok_or(FetchError::NotFound { locator: key })?;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}
