//! Filesystem abstraction and native implementation.
//!
//! Provides a platform-agnostic [`FileSystem`] trait for file I/O and a native
//! implementation backed by [`tokio::fs`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Platform-agnostic filesystem operations.
///
/// Implementations create parent directories when writing files.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's entire contents as a UTF-8 string.
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Read a file's entire contents as bytes.
    async fn read_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Write a string to a file, creating parent directories if needed.
    ///
    /// Overwrites the file if it already exists.
    async fn write_string(&self, path: &Path, content: &str) -> std::io::Result<()>;

    /// Write bytes to a file, creating parent directories if needed.
    async fn write_bytes(&self, path: &Path, content: &[u8]) -> std::io::Result<()>;

    /// Check whether a path exists (file or directory).
    async fn exists(&self, path: &Path) -> bool;

    /// Create a directory and all parent directories.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Get the user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Native filesystem implementation using [`tokio::fs`].
pub struct NativeFileSystem;

#[async_trait]
impl FileSystem for NativeFileSystem {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn read_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write_string(&self, path: &Path, content: &str) -> std::io::Result<()> {
        self.write_bytes(path, content.as_bytes()).await
    }

    async fn write_bytes(&self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}
