//! The JSON contract between the producer and the consumer.
//!
//! Everything here crosses a process boundary as UTF-8 JSON, so no type in
//! this module carries raw bytes. Image data travels only as the standard
//! base64 text in [`ExportEntry::img_static_b64`].

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chart::{ChartReference, Placeholder};

/// Inbound request to the producer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRequest {
    /// Charts to resolve, in presentation order.
    #[serde(default, alias = "chartRefs")]
    pub chart_refs: Vec<ChartReference>,

    /// Explicit chart id to page name assignment.
    #[serde(default, alias = "pageAssignment")]
    pub page_assignment: HashMap<String, String>,

    /// Narrative text. May contain `{{chart:<id>}}` anchors marking where
    /// each chart belongs.
    #[serde(default)]
    pub narrative: Option<String>,

    /// Opaque upstream metadata, passed through to the response.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One chart in the portable export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Chart identifier.
    pub chart_id: String,
    /// Chart title.
    pub title_text: String,
    /// Standard base64 of the image bytes, without any data-URI prefix.
    pub img_static_b64: String,
    /// The token standing in for this chart in the template.
    pub placeholder: Placeholder,
}

/// A chart that could not be produced, listed so the consumer can explain
/// its absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChart {
    /// Chart identifier.
    pub chart_id: String,
    /// Chart title.
    pub title_text: String,
    /// Page the chart would have appeared on.
    pub page: String,
    /// Human-readable failure reason.
    pub reason: String,
}

/// The portable half of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    /// Page name to entries. Pages keep first-appearance order and entries
    /// keep reference order.
    #[serde(default)]
    pub charts_data: IndexMap<String, Vec<ExportEntry>>,

    /// The narrative with placeholder tokens where charts belong.
    #[serde(default)]
    pub template: String,

    /// Charts that failed on the producer side.
    #[serde(default)]
    pub failed_charts: Vec<FailedChart>,
}

impl ExportBundle {
    /// All entries in page order, then reference order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ExportEntry)> {
        self.charts_data
            .iter()
            .flat_map(|(page, entries)| entries.iter().map(move |e| (page.as_str(), e)))
    }

    /// Number of exported charts across all pages.
    pub fn chart_count(&self) -> usize {
        self.charts_data.values().map(Vec::len).sum()
    }
}

/// Counts and timing for one producer request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Charts requested.
    pub total: usize,
    /// Charts embedded and exported.
    pub succeeded: usize,
    /// Charts replaced by an unavailable marker.
    pub failed: usize,
    /// Wall-clock time spent on the request.
    pub elapsed_ms: u64,
    /// Whether the request was cut short by cancellation or its deadline.
    #[serde(default)]
    pub cancelled: bool,
}

/// Outbound producer response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    /// Narrative with inline `<img>` embeds, ready for display.
    pub answer: String,
    /// Portable form for document generation.
    pub export_bundle: ExportBundle,
    /// Request summary.
    #[serde(default)]
    pub summary: Summary,
    /// Upstream metadata passthrough.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Lifecycle of a request through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// References accepted.
    Received,
    /// Artifacts being read from storage.
    Fetching,
    /// Artifacts encoded.
    Encoded,
    /// Inline and export views built.
    Split,
    /// Response assembled and checked.
    Assembled,
    /// Consumer decoding the bundle.
    Reconstructing,
    /// Consumer finished resolving placeholders.
    Resolved,
    /// Request aborted.
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Fetching => "fetching",
            Self::Encoded => "encoded",
            Self::Split => "split",
            Self::Assembled => "assembled",
            Self::Reconstructing => "reconstructing",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
