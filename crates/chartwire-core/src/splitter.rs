//! PayloadSplitter: fork one artifact into an inline view and an export entry.
//!
//! The inline view embeds the image as a data URI for immediate display and
//! never leaves the producer. The export entry carries only the base64 text
//! and is what crosses the wire.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chartwire_types::{ExportEntry, PipelineError, Placeholder};

use crate::artifact::ChartArtifact;

/// Producer-local, display-ready form of a chart. Deliberately not
/// serializable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineView {
    /// Chart identifier.
    pub chart_id: String,
    /// Chart title.
    pub title: String,
    /// `<img>` element with the image inlined as a data URI.
    pub embed: String,
    /// Placeholder shared with the export entry.
    pub placeholder: Placeholder,
}

/// Splits artifacts and tracks placeholders issued within one request.
///
/// Shared by reference across the request's fetch tasks so each artifact is
/// split as soon as it is encoded.
#[derive(Debug, Default)]
pub struct PayloadSplitter {
    issued: Mutex<HashSet<Placeholder>>,
}

impl PayloadSplitter {
    /// A splitter with an empty placeholder registry. Use one per request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a placeholder, failing if it was already issued.
    pub fn register(&self, placeholder: &Placeholder) -> Result<(), PipelineError> {
        let fresh = self
            .issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(placeholder.clone());
        if !fresh {
            return Err(PipelineError::PlaceholderCollision {
                placeholder: placeholder.to_string(),
            });
        }
        Ok(())
    }

    /// Consume an artifact, reserve its placeholder and produce both views.
    pub fn split(
        &self,
        artifact: ChartArtifact,
    ) -> Result<(InlineView, ExportEntry), PipelineError> {
        self.register(artifact.placeholder())?;
        Ok(Self::views(artifact))
    }

    /// The byte buffer is dropped once the embed is built; the export entry
    /// holds only text.
    fn views(artifact: ChartArtifact) -> (InlineView, ExportEntry) {
        let (chart_id, title, encoded, placeholder) = artifact.into_parts();
        let embed = img_tag(&encoded.data_uri(), &title);

        let inline = InlineView {
            chart_id: chart_id.clone(),
            title: title.clone(),
            embed,
            placeholder: placeholder.clone(),
        };
        let export = ExportEntry {
            chart_id,
            title_text: title,
            img_static_b64: encoded.into_base64(),
            placeholder,
        };
        (inline, export)
    }

    /// Number of placeholders issued so far.
    pub fn issued(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn img_tag(data_uri: &str, title: &str) -> String {
    format!(
        r#"<img src="{data_uri}" alt="{alt}" style="max-width:100%;height:auto;">"#,
        alt = escape_html(title)
    )
}

/// Escape HTML special characters to prevent injection.
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DualEncoder;
    use chartwire_types::ChartReference;

    fn artifact(id: &str, title: &str) -> ChartArtifact {
        let reference = ChartReference::new(id, title, format!("s3://b/{id}.png"));
        let encoded = DualEncoder::default()
            .encode(b"\x89PNG\r\n\x1a\nrest".to_vec())
            .unwrap();
        ChartArtifact::new(&reference, encoded)
    }

    #[test]
    fn views_share_placeholder_and_content() {
        let splitter = PayloadSplitter::new();
        let (inline, export) = splitter.split(artifact("a", "Sales")).unwrap();

        assert_eq!(inline.placeholder, export.placeholder);
        assert_eq!(export.placeholder.as_str(), "[CHART_a]");
        assert!(
            inline
                .embed
                .contains(&format!("data:image/png;base64,{}", export.img_static_b64))
        );
        assert!(!export.img_static_b64.starts_with("data:"));
        assert_eq!(export.title_text, "Sales");
    }

    #[test]
    fn embed_escapes_title() {
        let splitter = PayloadSplitter::new();
        let (inline, _) = splitter.split(artifact("a", r#"<b>"Q1" & Q2</b>"#)).unwrap();
        assert!(inline.embed.contains(r#"alt="&lt;b&gt;&quot;Q1&quot; &amp; Q2&lt;/b&gt;""#));
        assert!(inline.embed.contains(r#"style="max-width:100%;height:auto;""#));
    }

    #[test]
    fn duplicate_placeholder_collides() {
        let splitter = PayloadSplitter::new();
        splitter.split(artifact("a", "one")).unwrap();
        let err = splitter.split(artifact("a", "two")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PlaceholderCollision { ref placeholder } if placeholder == "[CHART_a]"
        ));
        assert_eq!(splitter.issued(), 1);
    }

    #[test]
    fn separate_requests_do_not_collide() {
        PayloadSplitter::new().split(artifact("a", "x")).unwrap();
        PayloadSplitter::new().split(artifact("a", "x")).unwrap();
    }

    #[tokio::test]
    async fn split_from_concurrent_tasks_shares_one_registry() {
        let splitter = std::sync::Arc::new(PayloadSplitter::new());
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|id| {
                let splitter = splitter.clone();
                tokio::spawn(async move { splitter.split(artifact(id, id)).map(|_| ()) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(splitter.issued(), 3);
        assert!(splitter.split(artifact("b", "again")).is_err());
    }
}
