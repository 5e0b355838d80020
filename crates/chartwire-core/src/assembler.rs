//! ResponseAssembler: merge per-chart results into the outbound response.
//!
//! Assembly restores reference order first, then builds three things from
//! the same ordered list:
//!
//! - `answer` -- the narrative with each chart's `<img>` embed at its
//!   `{{chart:<id>}}` anchor (or appended in reference order)
//! - `export_bundle.template` -- the same layout with placeholder tokens
//!   instead of embeds
//! - `export_bundle.charts_data` -- export entries grouped by page
//!
//! The finished response passes through [`guard::check_response`] before it
//! is returned.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chartwire_types::{
    ExportBundle, ExportEntry, FailedChart, PipelineError, Summary, WireResponse,
};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::guard;
use crate::splitter::InlineView;

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{chart:([^\s\[\]{}]+)\}\}").expect("valid anchor pattern"));

/// Marker shown in the answer in place of a chart that failed.
pub fn image_unavailable(title: &str) -> String {
    format!("[image unavailable: {}]", marker_label(title))
}

/// Marker written into the template in place of a chart that failed.
pub fn chart_unavailable(title: &str) -> String {
    format!("[chart unavailable: {}]", marker_label(title))
}

/// Brackets are dropped so a marker can never be mistaken for a placeholder.
fn marker_label(title: &str) -> String {
    title.chars().filter(|c| *c != '[' && *c != ']').collect()
}

/// What became of one reference.
#[derive(Debug, Clone)]
pub enum ChartOutcome {
    /// Both views were produced.
    Ready {
        /// Producer-local embed.
        inline: InlineView,
        /// Portable entry.
        export: ExportEntry,
    },
    /// The chart could not be produced.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// One reference's result, tagged with its original position.
#[derive(Debug, Clone)]
pub struct ChartSlot {
    /// Index of the reference in the request.
    pub position: usize,
    /// Chart identifier.
    pub chart_id: String,
    /// Display title.
    pub title: String,
    /// Page the chart is grouped under.
    pub page: String,
    /// The result.
    pub outcome: ChartOutcome,
}

/// Everything the assembler needs for one request.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    /// Narrative text, possibly containing anchors.
    pub narrative: Option<String>,
    /// Per-reference results in any order.
    pub slots: Vec<ChartSlot>,
    /// Upstream metadata passthrough.
    pub metadata: Map<String, Value>,
}

/// Builds [`WireResponse`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Assemble and guard the response.
    ///
    /// `summary.elapsed_ms` and `summary.cancelled` are left for the caller;
    /// the counts are filled here.
    pub fn assemble(&self, input: AssemblyInput) -> Result<WireResponse, PipelineError> {
        let AssemblyInput {
            narrative,
            mut slots,
            metadata,
        } = input;
        slots.sort_by_key(|s| s.position);

        let narrative = narrative.unwrap_or_default();
        let answer = render(&narrative, &slots, |slot| match &slot.outcome {
            ChartOutcome::Ready { inline, .. } => inline.embed.clone(),
            ChartOutcome::Failed { .. } => image_unavailable(&slot.title),
        });
        let template = render(&narrative, &slots, |slot| match &slot.outcome {
            ChartOutcome::Ready { export, .. } => export.placeholder.to_string(),
            ChartOutcome::Failed { .. } => chart_unavailable(&slot.title),
        });

        let mut bundle = ExportBundle {
            template,
            ..ExportBundle::default()
        };
        let mut summary = Summary {
            total: slots.len(),
            ..Summary::default()
        };

        for slot in slots {
            match slot.outcome {
                ChartOutcome::Ready { export, .. } => {
                    summary.succeeded += 1;
                    debug!(chart_id = %slot.chart_id, page = %slot.page, "chart exported");
                    bundle.charts_data.entry(slot.page).or_default().push(export);
                }
                ChartOutcome::Failed { reason } => {
                    summary.failed += 1;
                    warn!(
                        chart_id = %slot.chart_id,
                        page = %slot.page,
                        reason = %reason,
                        "chart replaced by unavailable marker"
                    );
                    bundle.failed_charts.push(FailedChart {
                        chart_id: slot.chart_id,
                        title_text: slot.title,
                        page: slot.page,
                        reason,
                    });
                }
            }
        }

        let response = WireResponse {
            answer,
            export_bundle: bundle,
            summary,
            metadata,
        };
        guard::check_response(&response)?;
        Ok(response)
    }
}

/// Lay out the narrative with one rendering per slot.
///
/// The first anchor for a chart receives its rendering and later duplicates
/// are removed. Charts without an anchor are appended in slot order. Anchors
/// for unknown ids are left as they are.
fn render(
    narrative: &str,
    slots: &[ChartSlot],
    mut render_slot: impl FnMut(&ChartSlot) -> String,
) -> String {
    let rendered: HashMap<&str, String> = slots
        .iter()
        .map(|s| (s.chart_id.as_str(), render_slot(s)))
        .collect();

    let mut placed: HashSet<String> = HashSet::new();
    let body = ANCHOR.replace_all(narrative, |caps: &Captures<'_>| {
        let id = &caps[1];
        match rendered.get(id) {
            Some(text) if placed.insert(id.to_string()) => text.clone(),
            Some(_) => String::new(),
            None => caps[0].to_string(),
        }
    });

    let mut out = body.into_owned();
    for slot in slots {
        if placed.contains(&slot.chart_id) {
            continue;
        }
        let Some(text) = rendered.get(slot.chart_id.as_str()) else {
            continue;
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(text);
    }
    out
}
