//! HTTP client abstraction and native implementation.
//!
//! Provides a platform-agnostic [`HttpClient`] trait and a native
//! implementation backed by [`reqwest`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Boxed transport error.
pub type HttpError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP response from a request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404, 500).
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

/// A successful response body was larger than the caller allowed.
///
/// Returned (boxed in [`HttpError`]) by [`HttpClient::get_limited`]; callers
/// recover it with `downcast_ref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("response body of {size} bytes exceeds limit of {limit} bytes")]
pub struct BodyTooLarge {
    /// Declared or observed body size.
    pub size: u64,
    /// The limit that was exceeded.
    pub limit: u64,
}

impl HttpResponse {
    /// Check if status is success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Platform-agnostic HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send an HTTP request with the given method, URL, headers, and optional body.
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, HttpError>;

    /// Send an HTTP GET request.
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<HttpResponse, HttpError> {
        self.request("GET", url, headers, None).await
    }

    /// Send an HTTP GET request whose successful body may not exceed
    /// `max_body` bytes.
    ///
    /// The default implementation checks after the body has been read.
    /// Implementations that can see the body arrive should stop early.
    async fn get_limited(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        max_body: u64,
    ) -> Result<HttpResponse, HttpError> {
        let response = self.get(url, headers).await?;
        let size = response.body.len() as u64;
        if response.is_success() && size > max_body {
            return Err(Box::new(BodyTooLarge {
                size,
                limit: max_body,
            }));
        }
        Ok(response)
    }
}

/// Native HTTP client using [`reqwest`].
///
/// The underlying client is built on first use and shared by every request
/// made through this handle, so connection pooling spans a whole request.
pub struct NativeHttpClient {
    client: OnceCell<reqwest::Client>,
    timeout: Duration,
}

impl NativeHttpClient {
    /// Create a client with a 60-second transport timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(60))
    }

    /// Create a client with a custom transport timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: OnceCell::new(),
            timeout,
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, HttpError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                tracing::debug!(timeout_ms = self.timeout.as_millis() as u64, "building http client");
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .pool_idle_timeout(Duration::from_secs(30))
                    .build()
            })
            .await?;
        Ok(client)
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
        max_body: Option<u64>,
    ) -> Result<HttpResponse, HttpError> {
        let reqwest_method = method.parse::<reqwest::Method>()?;
        let mut builder = self.client().await?.request(reqwest_method, url);

        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some(body_bytes) = body {
            builder = builder.body(body_bytes.to_vec());
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();

        let Some(limit) = max_body.filter(|_| response.status().is_success()) else {
            let body = response.bytes().await?.to_vec();
            return Ok(HttpResponse { status, body });
        };

        // Refuse on the declared length, then enforce while streaming for
        // servers that omit or understate it.
        if let Some(declared) = response.content_length()
            && declared > limit
        {
            return Err(Box::new(BodyTooLarge {
                size: declared,
                limit,
            }));
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let size = (body.len() + chunk.len()) as u64;
            if size > limit {
                return Err(Box::new(BodyTooLarge { size, limit }));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(HttpResponse { status, body })
    }
}

impl Default for NativeHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for NativeHttpClient {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, HttpError> {
        self.send(method, url, headers, body, None).await
    }

    async fn get_limited(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        max_body: u64,
    ) -> Result<HttpResponse, HttpError> {
        self.send("GET", url, headers, None, Some(max_body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_response_is_success() {
        for status in [200, 201, 204, 299] {
            let response = HttpResponse {
                status,
                body: vec![],
            };
            assert!(response.is_success(), "status {status} should be success");
        }
        for status in [100, 301, 404, 500] {
            let response = HttpResponse {
                status,
                body: vec![],
            };
            assert!(!response.is_success(), "status {status} should not be success");
        }
    }

    #[tokio::test]
    async fn test_native_get_forwards_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(header("x-token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let client = NativeHttpClient::new();
        let mut headers = HashMap::new();
        headers.insert("x-token".to_string(), "abc".to_string());
        let resp = client
            .get(&format!("{}/img.png", server.uri()), &headers)
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_native_client_reused_across_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let client = NativeHttpClient::default();
        let url = format!("{}/ping", server.uri());
        client.get(&url, &HashMap::new()).await.unwrap();
        let first = client.client().await.unwrap() as *const reqwest::Client;
        client.get(&url, &HashMap::new()).await.unwrap();
        let second = client.client().await.unwrap() as *const reqwest::Client;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_native_rejects_bad_method() {
        let client = NativeHttpClient::new();
        let result = client
            .request("NOT A METHOD", "http://127.0.0.1:1/", &HashMap::new(), None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_limited_refuses_declared_length() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;

        let client = NativeHttpClient::new();
        let url = format!("{}/big.png", server.uri());
        let err = client
            .get_limited(&url, &HashMap::new(), 16)
            .await
            .unwrap_err();
        let too_large = err.downcast_ref::<BodyTooLarge>().unwrap();
        assert_eq!(too_large.limit, 16);
        assert!(too_large.size > 16);

        let ok = client.get_limited(&url, &HashMap::new(), 64).await.unwrap();
        assert_eq!(ok.body.len(), 64);
    }

    #[tokio::test]
    async fn test_get_limited_ignores_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let resp = NativeHttpClient::new()
            .get_limited(&format!("{}/gone.png", server.uri()), &HashMap::new(), 8)
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
    }
}
