use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chartwire_types::{FetchError, Locator};

use super::ObjectStore;
use crate::fs::FileSystem;

/// Reads `file://` locators from a [`FileSystem`].
///
/// With a root set, only paths under it are served; anything else is
/// reported as [`FetchError::Unauthorized`].
pub struct FsObjectStore {
    fs: Arc<dyn FileSystem>,
    root: Option<PathBuf>,
}

impl FsObjectStore {
    /// Create a store, optionally confined to `root`.
    pub fn new(fs: Arc<dyn FileSystem>, root: Option<PathBuf>) -> Self {
        Self { fs, root }
    }

    fn check_confined(&self, path: &Path, locator: &Locator) -> Result<(), FetchError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(root) {
            return Err(FetchError::Unauthorized {
                locator: locator.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        let Locator::File { path } = locator else {
            return Err(FetchError::InvalidLocator {
                reason: format!("{locator} is not a file locator"),
            });
        };
        self.check_confined(path, locator)?;

        self.fs.read_bytes(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotFound {
                locator: locator.to_string(),
            },
            ErrorKind::PermissionDenied => FetchError::Unauthorized {
                locator: locator.to_string(),
            },
            _ => FetchError::Transient {
                message: format!("failed to read {}: {e}", path.display()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::NativeFileSystem;

    fn file(path: PathBuf) -> Locator {
        Locator::File { path }
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::write(&path, b"png").unwrap();

        let store = FsObjectStore::new(Arc::new(NativeFileSystem), None);
        assert_eq!(store.get(&file(path)).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(Arc::new(NativeFileSystem), None);
        let err = store.get(&file(dir.path().join("nope.png"))).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn root_confines_reads() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("charts");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("ok.png"), b"ok").unwrap();
        std::fs::write(dir.path().join("secret.png"), b"no").unwrap();

        let store = FsObjectStore::new(Arc::new(NativeFileSystem), Some(root.clone()));
        assert_eq!(store.get(&file(root.join("ok.png"))).await.unwrap(), b"ok");

        let outside = store.get(&file(dir.path().join("secret.png"))).await;
        assert!(matches!(outside, Err(FetchError::Unauthorized { .. })));

        let traversal = store.get(&file(root.join("..").join("secret.png"))).await;
        assert!(matches!(traversal, Err(FetchError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn non_file_locator_is_invalid() {
        let store = FsObjectStore::new(Arc::new(NativeFileSystem), None);
        let err = store
            .get(&Locator::S3 {
                bucket: "b".into(),
                key: "k".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocator { .. }));
    }
}
