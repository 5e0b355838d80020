//! Parsed object-storage locators.
//!
//! Upstream producers hand out chart locations in several shapes. They are
//! normalized here so stores only deal with one representation per backend:
//!
//! | input                                              | parsed as        |
//! |----------------------------------------------------|------------------|
//! | `s3://bucket/key`                                  | [`Locator::S3`]  |
//! | `https://bucket.s3[.region].amazonaws.com/key`     | [`Locator::S3`]  |
//! | `https://s3[.region].amazonaws.com/bucket/key`     | [`Locator::S3`]  |
//! | any other `http(s)://` URL                         | [`Locator::Http`]|
//! | `file:///path`                                     | [`Locator::File`]|

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::FetchError;

const AWS_DOMAIN: &str = ".amazonaws.com";

/// A storage location for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// An S3-compatible object.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key, already percent-decoded.
        key: String,
    },
    /// A plain HTTP(S) resource fetched as-is.
    Http {
        /// Absolute URL.
        url: String,
    },
    /// A local file.
    File {
        /// Absolute path.
        path: PathBuf,
    },
}

impl Locator {
    /// Parse a raw locator string.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid("locator is empty"));
        }

        if let Some(rest) = strip_prefix_ignore_case(raw, "s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| invalid(format!("missing object key in {raw}")))?;
            return s3(bucket, key.to_string(), raw);
        }

        let url = Url::parse(raw).map_err(|e| invalid(format!("{raw}: {e}")))?;
        match url.scheme() {
            "http" | "https" => {
                let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
                let path = url.path().trim_start_matches('/');
                let decoded = percent_decode_str(path)
                    .decode_utf8()
                    .map_err(|e| invalid(format!("{raw}: {e}")))?;

                if let Some(bucket) = virtual_hosted_bucket(&host) {
                    return s3(bucket, decoded.into_owned(), raw);
                }
                if is_path_style_host(&host) {
                    let (bucket, key) = decoded
                        .split_once('/')
                        .ok_or_else(|| invalid(format!("missing object key in {raw}")))?;
                    return s3(bucket, key.to_string(), raw);
                }
                Ok(Self::Http {
                    url: url.to_string(),
                })
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| invalid(format!("not a local file path: {raw}")))?;
                Ok(Self::File { path })
            }
            other => Err(invalid(format!("unsupported scheme `{other}` in {raw}"))),
        }
    }

    /// Short backend name, used in logs and for routing.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Http { .. } => "http",
            Self::File { .. } => "file",
        }
    }
}

impl FromStr for Locator {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Self::Http { url } => f.write_str(url),
            Self::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

fn invalid(reason: impl Into<String>) -> FetchError {
    FetchError::InvalidLocator {
        reason: reason.into(),
    }
}

fn s3(bucket: &str, key: String, raw: &str) -> Result<Locator, FetchError> {
    let key = key.trim_start_matches('/').to_string();
    if bucket.is_empty() {
        return Err(invalid(format!("missing bucket in {raw}")));
    }
    if key.is_empty() {
        return Err(invalid(format!("missing object key in {raw}")));
    }
    Ok(Locator::S3 {
        bucket: bucket.to_string(),
        key,
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

/// `bucket.s3.amazonaws.com`, `bucket.s3.region.amazonaws.com` or
/// `bucket.s3-region.amazonaws.com` yields `bucket`.
fn virtual_hosted_bucket(host: &str) -> Option<&str> {
    let stem = host.strip_suffix(AWS_DOMAIN)?;
    let (bucket, rest) = stem.rsplit_once(".s3")?;
    if bucket.is_empty() || !(rest.is_empty() || rest.starts_with('.') || rest.starts_with('-')) {
        return None;
    }
    Some(bucket)
}

/// `s3.amazonaws.com`, `s3.region.amazonaws.com` or `s3-region.amazonaws.com`.
fn is_path_style_host(host: &str) -> bool {
    host.strip_suffix(AWS_DOMAIN).is_some_and(|stem| {
        stem == "s3" || stem.starts_with("s3.") || stem.starts_with("s3-")
    })
}
