//! A fetched and encoded chart, ready to be split.

use chartwire_types::{ChartReference, Placeholder};

use crate::encoder::DualEncoded;

/// A chart whose bytes and text form are both available.
///
/// The placeholder is generated here, once, from the chart id. Every view
/// derived from the artifact copies it verbatim.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    id: String,
    title: String,
    encoded: DualEncoded,
    placeholder: Placeholder,
}

impl ChartArtifact {
    /// Pair a reference with its encoded payload.
    pub fn new(reference: &ChartReference, encoded: DualEncoded) -> Self {
        Self {
            id: reference.id.clone(),
            title: reference.display_title().to_string(),
            placeholder: Placeholder::for_chart(&reference.id),
            encoded,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn encoded(&self) -> &DualEncoded {
        &self.encoded
    }

    pub fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    pub(crate) fn into_parts(self) -> (String, String, DualEncoded, Placeholder) {
        (self.id, self.title, self.encoded, self.placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DualEncoder;

    #[test]
    fn placeholder_derived_from_id() {
        let reference = ChartReference::new("rev", "Revenue", "s3://b/rev.png");
        let encoded = DualEncoder::default().encode(b"x".to_vec()).unwrap();
        let artifact = ChartArtifact::new(&reference, encoded);
        assert_eq!(artifact.placeholder().as_str(), "[CHART_rev]");
        assert_eq!(artifact.title(), "Revenue");
        assert_eq!(artifact.id(), "rev");
        assert_eq!(artifact.encoded().base64(), "eA==");
    }

    #[test]
    fn blank_title_uses_id() {
        let reference = ChartReference::new("rev", "", "s3://b/rev.png");
        let encoded = DualEncoder::default().encode(b"x".to_vec()).unwrap();
        assert_eq!(ChartArtifact::new(&reference, encoded).title(), "rev");
    }
}
