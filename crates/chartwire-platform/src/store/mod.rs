//! Object stores that artifacts are read from.
//!
//! The fetcher only ever sees an `Arc<dyn ObjectStore>`. Which backend
//! serves a locator is decided here:
//!
//! - [`HttpObjectStore`] -- S3-compatible endpoints and plain HTTP(S) URLs.
//! - [`FsObjectStore`] -- `file://` locators, optionally confined to a root.
//! - [`NativeObjectStore`] -- routes by locator scheme to the two above.
//! - [`MemoryObjectStore`] -- in-memory objects with injectable failures and
//!   delays, for tests and dry runs.
//!
//! Stores perform exactly one read per call. Timeouts and retries are the
//! caller's concern.

mod fs;
mod http;
mod memory;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

use std::sync::Arc;

use async_trait::async_trait;
use chartwire_types::config::StorageConfig;
use chartwire_types::{FetchError, Locator};

/// Read-only access to stored artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable store name for logs.
    fn name(&self) -> &str;

    /// Read the full object at `locator`.
    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError>;
}

/// Store used by the CLI: HTTP and S3 locators over reqwest, `file://`
/// locators from the local filesystem.
pub struct NativeObjectStore {
    http: HttpObjectStore,
    file: FsObjectStore,
}

impl NativeObjectStore {
    /// Build both backends from the storage settings.
    pub fn new(storage: &StorageConfig) -> Self {
        Self::from_parts(
            HttpObjectStore::new(Arc::new(crate::http::NativeHttpClient::new()), storage),
            FsObjectStore::new(Arc::new(crate::fs::NativeFileSystem), storage.root.clone()),
        )
    }

    /// Build both backends, refusing HTTP objects over `max_bytes` before
    /// their body is downloaded.
    pub fn with_max_bytes(storage: &StorageConfig, max_bytes: u64) -> Self {
        Self::from_parts(
            HttpObjectStore::new(Arc::new(crate::http::NativeHttpClient::new()), storage)
                .with_max_bytes(max_bytes),
            FsObjectStore::new(Arc::new(crate::fs::NativeFileSystem), storage.root.clone()),
        )
    }

    /// Combine explicitly built backends.
    pub fn from_parts(http: HttpObjectStore, file: FsObjectStore) -> Self {
        Self { http, file }
    }
}

#[async_trait]
impl ObjectStore for NativeObjectStore {
    fn name(&self) -> &str {
        "native"
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        match locator {
            Locator::S3 { .. } | Locator::Http { .. } => self.http.get(locator).await,
            Locator::File { .. } => self.file.get(locator).await,
        }
    }
}
