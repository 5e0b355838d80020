//! ArtifactReconstructor: decode export entries back into image bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chartwire_types::{DecodeError, ExportBundle, ExportEntry, ImageKind, Placeholder};
use tracing::{debug, warn};

/// A chart restored from its text form.
#[derive(Clone, PartialEq, Eq)]
pub struct ReconstructedArtifact {
    pub chart_id: String,
    pub title: String,
    pub bytes: Vec<u8>,
    pub placeholder: Placeholder,
    pub media_type: ImageKind,
}

impl std::fmt::Debug for ReconstructedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructedArtifact")
            .field("chart_id", &self.chart_id)
            .field("title", &self.title)
            .field("len", &self.bytes.len())
            .field("placeholder", &self.placeholder)
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// An entry that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructionFailure {
    pub chart_id: String,
    pub title: String,
    pub page: String,
    pub placeholder: Placeholder,
    pub error: DecodeError,
}

/// Result of decoding a whole bundle.
#[derive(Debug, Clone, Default)]
pub struct ReconstructionOutcome {
    /// Decoded charts in page order, then reference order.
    pub artifacts: Vec<ReconstructedArtifact>,
    /// Entries that failed to decode.
    pub failures: Vec<ReconstructionFailure>,
}

impl ReconstructionOutcome {
    /// Find a decoded chart by placeholder.
    pub fn artifact(&self, placeholder: &Placeholder) -> Option<&ReconstructedArtifact> {
        self.artifacts.iter().find(|a| &a.placeholder == placeholder)
    }

    /// Find a decode failure by placeholder.
    pub fn failure(&self, placeholder: &Placeholder) -> Option<&ReconstructionFailure> {
        self.failures.iter().find(|f| &f.placeholder == placeholder)
    }
}

/// Decode one entry.
///
/// ASCII whitespace inside the text is ignored so line-wrapped base64 is
/// accepted. Malformed text and an empty result are errors; empty bytes are
/// never substituted.
pub fn reconstruct(entry: &ExportEntry) -> Result<ReconstructedArtifact, DecodeError> {
    let compact: String = entry
        .img_static_b64
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::Malformed {
            chart_id: entry.chart_id.clone(),
            reason: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty {
            chart_id: entry.chart_id.clone(),
        });
    }

    Ok(ReconstructedArtifact {
        chart_id: entry.chart_id.clone(),
        title: entry.title_text.clone(),
        media_type: ImageKind::sniff(&bytes),
        bytes,
        placeholder: entry.placeholder.clone(),
    })
}

/// Decode every entry of a bundle, collecting failures next to successes.
pub fn reconstruct_bundle(bundle: &ExportBundle) -> ReconstructionOutcome {
    let mut outcome = ReconstructionOutcome::default();
    for (page, entry) in bundle.entries() {
        match reconstruct(entry) {
            Ok(artifact) => {
                debug!(chart_id = %artifact.chart_id, page, bytes = artifact.bytes.len(), "chart reconstructed");
                outcome.artifacts.push(artifact);
            }
            Err(error) => {
                warn!(chart_id = %entry.chart_id, page, error = %error, "chart could not be reconstructed");
                outcome.failures.push(ReconstructionFailure {
                    chart_id: entry.chart_id.clone(),
                    title: entry.title_text.clone(),
                    page: page.to_string(),
                    placeholder: entry.placeholder.clone(),
                    error,
                });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, b64: &str) -> ExportEntry {
        ExportEntry {
            chart_id: id.into(),
            title_text: format!("Title {id}"),
            img_static_b64: b64.into(),
            placeholder: Placeholder::for_chart(id),
        }
    }

    #[test]
    fn decodes_valid_entry() {
        let artifact = reconstruct(&entry("a", "iVBORw0KGgo=")).unwrap();
        assert_eq!(artifact.bytes, b"\x89PNG\r\n\x1a\n");
        assert_eq!(artifact.media_type, ImageKind::Png);
        assert_eq!(artifact.placeholder.as_str(), "[CHART_a]");
        assert_eq!(artifact.title, "Title a");
    }

    #[test]
    fn accepts_line_wrapped_text() {
        let artifact = reconstruct(&entry("a", "aGVs\nbG8=\r\n")).unwrap();
        assert_eq!(artifact.bytes, b"hello");
    }

    #[test]
    fn malformed_text_is_an_error() {
        let err = reconstruct(&entry("a", "not*base64!")).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { ref chart_id, .. } if chart_id == "a"));

        let err = reconstruct(&entry("a", "data:image/png;base64,AAAA")).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn empty_text_is_an_error() {
        let err = reconstruct(&entry("a", "")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Empty {
                chart_id: "a".into()
            }
        );
    }

    #[test]
    fn bundle_collects_failures_in_order() {
        let mut bundle = ExportBundle::default();
        bundle
            .charts_data
            .insert("p2".into(), vec![entry("b", "aGVsbG8="), entry("bad", "@@@")]);
        bundle.charts_data.insert("p1".into(), vec![entry("a", "aGk=")]);

        let outcome = reconstruct_bundle(&bundle);
        let ids: Vec<&str> = outcome.artifacts.iter().map(|a| a.chart_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].chart_id, "bad");
        assert_eq!(outcome.failures[0].page, "p2");

        assert!(outcome.artifact(&Placeholder::for_chart("a")).is_some());
        assert!(outcome.failure(&Placeholder::for_chart("bad")).is_some());
        assert!(outcome.artifact(&Placeholder::for_chart("bad")).is_none());
    }
}
