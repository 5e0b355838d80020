//! Error types for chartwire.
//!
//! Errors are split by blast radius. [`FetchError`], [`ArtifactError`] and
//! [`DecodeError`] describe a single chart and never abort a request on
//! their own. [`PipelineError`] aborts the request it occurs in.
//! [`ChartwireError`] is the top-level type for configuration and I/O.

use thiserror::Error;

/// Failure to read one artifact from object storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The object does not exist.
    #[error("artifact not found: {locator}")]
    NotFound {
        /// Locator that was requested.
        locator: String,
    },

    /// A single attempt exceeded its deadline.
    #[error("fetch timed out after {timeout_ms}ms: {locator}")]
    Timeout {
        /// Locator that was requested.
        locator: String,
        /// Per-attempt deadline that elapsed.
        timeout_ms: u64,
    },

    /// The store failed in a way that may succeed on retry.
    #[error("transient storage failure: {message}")]
    Transient {
        /// Store-supplied detail.
        message: String,
    },

    /// The store refused access to the object.
    #[error("access denied: {locator}")]
    Unauthorized {
        /// Locator that was requested.
        locator: String,
    },

    /// The store rejected the request for another non-retryable reason.
    #[error("request rejected with HTTP {status}: {locator}")]
    Rejected {
        /// HTTP status returned by the store.
        status: u16,
        /// Locator that was requested.
        locator: String,
    },

    /// The locator could not be parsed or routed to a store.
    #[error("invalid locator: {reason}")]
    InvalidLocator {
        /// Why the locator was refused.
        reason: String,
    },

    /// The object is larger than the configured artifact ceiling. Detected
    /// before or while the body is read.
    #[error("object too large: {locator} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Locator that was requested.
        locator: String,
        /// Declared or observed size.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// The request was cancelled or hit its deadline before this fetch finished.
    #[error("fetch cancelled")]
    Cancelled,
}

/// Failure to turn one chart reference into a usable artifact.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The bytes could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched payload is not a usable image.
    #[error("invalid artifact: {reason}")]
    InvalidArtifact {
        /// What is wrong with the payload.
        reason: String,
    },

    /// The payload exceeds the configured size ceiling.
    #[error("artifact too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Actual payload size.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },
}

/// Request-fatal failure on the producer side.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Two artifacts in the same request were issued the same placeholder.
    #[error("placeholder collision: {placeholder}")]
    PlaceholderCollision {
        /// The token that was issued twice.
        placeholder: String,
    },

    /// Raw binary data was found in the serialized wire payload.
    #[error("serialization violation at {path}: {reason}")]
    SerializationViolation {
        /// JSON path of the offending value, e.g. `$.export_bundle.charts_data.p1[0]`.
        path: String,
        /// What was found there.
        reason: String,
    },

    /// The inbound request is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request.
        reason: String,
    },

    /// A chart failed while the abort failure policy was active.
    #[error("chart {chart_id} failed: {source}")]
    ArtifactFailed {
        /// Identifier of the failed chart.
        chart_id: String,
        /// The per-artifact failure.
        #[source]
        source: ArtifactError,
    },

    /// JSON serialization error while building the wire payload.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to reconstruct one artifact on the consumer side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The text form is not valid base64.
    #[error("malformed base64 for chart {chart_id}: {reason}")]
    Malformed {
        /// Identifier of the chart.
        chart_id: String,
        /// Decoder detail.
        reason: String,
    },

    /// The text form decoded to zero bytes.
    #[error("chart {chart_id} decoded to an empty payload")]
    Empty {
        /// Identifier of the chart.
        chart_id: String,
    },
}

/// Top-level error type for chartwire.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChartwireError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A producer request failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ChartwireError>;
