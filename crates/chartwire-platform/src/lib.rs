//! Platform abstraction layer for chartwire.
//!
//! Provides traits for all platform-dependent operations (HTTP, filesystem,
//! environment) plus the object stores the fetcher reads artifacts from, so
//! the pipeline itself stays free of direct I/O.
//!
//! # Architecture
//!
//! The [`Platform`] trait bundles the filesystem and environment access the
//! CLI needs for config discovery and output ([`fs::FileSystem`],
//! [`env::Environment`]).
//!
//! Artifact reads go through [`store::ObjectStore`], which is passed to the
//! pipeline explicitly as an `Arc<dyn ObjectStore>`. The HTTP-backed store
//! owns its [`http::HttpClient`].
//!
//! # Example
//!
//! ```rust,no_run
//! use chartwire_platform::store::{NativeObjectStore, ObjectStore};
//! use chartwire_types::config::StorageConfig;
//! use chartwire_types::Locator;
//!
//! # async fn example() {
//! let store = NativeObjectStore::new(&StorageConfig::default());
//! let locator = Locator::parse("s3://charts/sales.png").unwrap();
//! let bytes = store.get(&locator).await.unwrap();
//! assert!(!bytes.is_empty());
//! # }
//! ```

pub mod config_loader;
pub mod env;
pub mod fs;
pub mod http;
pub mod store;

/// Bundle of platform capabilities.
///
/// The native implementation ([`NativePlatform`]) uses tokio::fs and
/// std::env.
pub trait Platform: Send + Sync {
    /// Filesystem operations.
    fn fs(&self) -> &dyn fs::FileSystem;

    /// Environment variable access.
    fn env(&self) -> &dyn env::Environment;
}

/// Native platform implementation using std and tokio.
pub struct NativePlatform {
    fs: fs::NativeFileSystem,
    env: env::NativeEnvironment,
}

impl NativePlatform {
    /// Create a new native platform with default configuration.
    pub fn new() -> Self {
        Self {
            fs: fs::NativeFileSystem,
            env: env::NativeEnvironment,
        }
    }
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for NativePlatform {
    fn fs(&self) -> &dyn fs::FileSystem {
        &self.fs
    }

    fn env(&self) -> &dyn env::Environment {
        &self.env
    }
}
