use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chartwire_types::config::StorageConfig;
use chartwire_types::{FetchError, Locator};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use super::ObjectStore;
use crate::http::{BodyTooLarge, HttpClient};

/// Characters escaped in S3 object keys. `/` is kept so key prefixes stay
/// path segments.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Reads objects over HTTP.
///
/// S3 locators resolve to `<endpoint>/<bucket>/<key>` (path-style), which
/// works for AWS as well as S3-compatible servers. Plain HTTP locators are
/// requested as-is.
pub struct HttpObjectStore {
    client: Arc<dyn HttpClient>,
    endpoint: String,
    headers: HashMap<String, String>,
    max_bytes: Option<u64>,
}

impl HttpObjectStore {
    /// Create a store from an HTTP client and storage settings.
    pub fn new(client: Arc<dyn HttpClient>, storage: &StorageConfig) -> Self {
        Self {
            client,
            endpoint: storage.effective_endpoint(),
            headers: storage.headers.clone(),
            max_bytes: None,
        }
    }

    /// Refuse objects larger than `limit` bytes without reading past it.
    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    /// The URL a locator resolves to.
    pub fn url_for(&self, locator: &Locator) -> Result<String, FetchError> {
        match locator {
            Locator::S3 { bucket, key } => Ok(format!(
                "{}/{}/{}",
                self.endpoint,
                bucket,
                utf8_percent_encode(key, KEY_ENCODE_SET)
            )),
            Locator::Http { url } => Ok(url.clone()),
            Locator::File { .. } => Err(FetchError::InvalidLocator {
                reason: format!("{locator} is not served over http"),
            }),
        }
    }
}

/// Map a non-success HTTP status to a fetch error.
pub(crate) fn status_error(status: u16, locator: &Locator) -> FetchError {
    let locator = locator.to_string();
    match status {
        404 => FetchError::NotFound { locator },
        401 | 403 => FetchError::Unauthorized { locator },
        408 | 429 | 500..=599 => FetchError::Transient {
            message: format!("HTTP {status} for {locator}"),
        },
        _ => FetchError::Rejected { status, locator },
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(locator)?;
        debug!(%url, "requesting object");

        let response = match self.max_bytes {
            Some(limit) => self.client.get_limited(&url, &self.headers, limit).await,
            None => self.client.get(&url, &self.headers).await,
        }
        .map_err(|e| match e.downcast_ref::<BodyTooLarge>() {
            Some(too_large) => FetchError::TooLarge {
                locator: locator.to_string(),
                size: too_large.size,
                limit: too_large.limit,
            },
            None => FetchError::Transient {
                message: format!("request to {url} failed: {e}"),
            },
        })?;

        if !response.is_success() {
            return Err(status_error(response.status, locator));
        }
        Ok(response.body)
    }
}
