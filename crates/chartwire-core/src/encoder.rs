//! DualEncoder: derive the base64 text form alongside the raw bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chartwire_types::config::{DEFAULT_MAX_ARTIFACT_BYTES, EncodingConfig};
use chartwire_types::{ArtifactError, ImageKind};

/// The same image in binary and text form.
///
/// Only [`DualEncoder::encode`] builds this, so the two representations
/// always describe identical content.
#[derive(Clone, PartialEq, Eq)]
pub struct DualEncoded {
    bytes: Vec<u8>,
    base64: String,
    kind: ImageKind,
}

impl DualEncoded {
    /// The raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Standard-alphabet, padded base64 of [`bytes`](Self::bytes).
    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// Detected image format.
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// A `data:` URI suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), self.base64)
    }

    /// Give up the byte buffer, keeping only the text form.
    pub fn into_base64(self) -> String {
        self.base64
    }
}

impl std::fmt::Debug for DualEncoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualEncoded")
            .field("len", &self.bytes.len())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Validates artifact payloads and encodes them.
#[derive(Debug, Clone)]
pub struct DualEncoder {
    max_bytes: usize,
}

impl Default for DualEncoder {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

impl DualEncoder {
    /// Create an encoder from encoding settings.
    pub fn new(config: &EncodingConfig) -> Self {
        Self {
            max_bytes: config.max_artifact_bytes,
        }
    }

    /// Encode `bytes`, rejecting empty and oversized payloads.
    pub fn encode(&self, bytes: Vec<u8>) -> Result<DualEncoded, ArtifactError> {
        if bytes.is_empty() {
            return Err(ArtifactError::InvalidArtifact {
                reason: "payload is empty".into(),
            });
        }
        if bytes.len() > self.max_bytes {
            return Err(ArtifactError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let base64 = STANDARD.encode(&bytes);
        let kind = ImageKind::sniff(&bytes);
        Ok(DualEncoded {
            bytes,
            base64,
            kind,
        })
    }
}
