//! Consumer side: rebuild a document from a received export bundle.

use chartwire_types::{ExportBundle, RequestState};
use tracing::info;

use crate::reconstructor::reconstruct_bundle;
use crate::resolver::{FinalDocument, resolve};

/// Drives `Reconstructing -> Resolved` for one bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    /// Decode the bundle and resolve `template`, or the bundle's own
    /// template when none is given.
    pub fn build(&self, bundle: &ExportBundle, template: Option<&str>) -> FinalDocument {
        info!(state = %RequestState::Reconstructing, charts = bundle.chart_count(), "reconstructing bundle");
        let outcome = reconstruct_bundle(bundle);

        let template = template.unwrap_or(&bundle.template);
        let document = resolve(template, &outcome);
        info!(
            state = %RequestState::Resolved,
            assets = document.assets.len(),
            unavailable = document.unavailable.len(),
            missing = document.missing.len(),
            "document resolved"
        );
        document
    }
}
