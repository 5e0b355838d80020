//! PlaceholderResolver: turn a placeholder template into the final document.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chartwire_types::{ImageKind, Placeholder};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::assembler::chart_unavailable;
use crate::reconstructor::ReconstructionOutcome;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CHART_([^\[\]\s]+)\]").expect("valid placeholder pattern"));

/// Directory, relative to the document, that assets are written under.
pub const ASSET_DIR: &str = "charts";

/// A chart file the document refers to.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentAsset {
    pub chart_id: String,
    pub title: String,
    /// Relative path used in the body, e.g. `charts/sales.png`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub media_type: ImageKind,
}

impl std::fmt::Debug for DocumentAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAsset")
            .field("chart_id", &self.chart_id)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The consumer's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalDocument {
    /// Template text with every placeholder replaced.
    pub body: String,
    /// Referenced charts, once each, in order of first reference.
    pub assets: Vec<DocumentAsset>,
    /// Chart ids whose placeholder became an unavailable marker.
    pub unavailable: Vec<String>,
    /// Chart ids that were reconstructed but never referenced by the template.
    pub missing: Vec<String>,
}

/// Replace every `[CHART_<id>]` in `template`.
///
/// Placeholders with a reconstructed artifact become a markdown image
/// reference; all others become a `[chart unavailable: ...]` marker. The
/// output contains no placeholders, so resolving it again is a no-op.
pub fn resolve(template: &str, outcome: &ReconstructionOutcome) -> FinalDocument {
    let mut assets: Vec<DocumentAsset> = Vec::new();
    let mut files: HashMap<String, String> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut unavailable: Vec<String> = Vec::new();

    let body = TOKEN.replace_all(template, |caps: &Captures<'_>| {
        let id = &caps[1];
        let placeholder = Placeholder::for_chart(id);
        let first = seen.insert(id.to_string());
        if !first {
            warn!(chart_id = id, "placeholder appears more than once");
        }

        if let Some(artifact) = outcome.artifact(&placeholder) {
            let file_name = files
                .entry(id.to_string())
                .or_insert_with(|| {
                    let stem = unique_stem(asset_stem(&artifact.chart_id), &mut taken);
                    format!("{ASSET_DIR}/{stem}.{}", artifact.media_type.extension())
                })
                .clone();
            let label = figure_label(&artifact.title);
            let reference = format!("![Figure: {label}]({file_name})");
            if first {
                debug!(chart_id = id, file = %file_name, "placeholder resolved");
                assets.push(DocumentAsset {
                    chart_id: artifact.chart_id.clone(),
                    title: artifact.title.clone(),
                    file_name,
                    bytes: artifact.bytes.clone(),
                    media_type: artifact.media_type,
                });
            }
            return reference;
        }

        let title = match outcome.failure(&placeholder) {
            Some(failure) if !failure.title.is_empty() => failure.title.as_str(),
            Some(_) => id,
            None => {
                warn!(chart_id = id, "placeholder has no chart in the bundle");
                id
            }
        };
        if first {
            unavailable.push(id.to_string());
        }
        chart_unavailable(title)
    });

    let missing: Vec<String> = outcome
        .artifacts
        .iter()
        .filter(|a| !seen.contains(&a.chart_id))
        .map(|a| a.chart_id.clone())
        .collect();
    for chart_id in &missing {
        warn!(chart_id = %chart_id, "chart has no placeholder in the template");
    }

    FinalDocument {
        body: body.into_owned(),
        assets,
        unavailable,
        missing,
    }
}

/// Every chart id referenced by a placeholder in `text`, in order.
pub fn placeholders_in(text: &str) -> Vec<String> {
    TOKEN
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// File stem for a chart id: one path segment of `[A-Za-z0-9._-]`, never
/// starting with a dot.
fn asset_stem(chart_id: &str) -> String {
    let stem: String = chart_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "chart".to_string()
    } else {
        stem.to_string()
    }
}

/// Suffix `stem` with `-2`, `-3`, ... until it is not in `taken`.
fn unique_stem(stem: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = stem.clone();
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{stem}-{n}");
        n += 1;
    }
    candidate
}

fn figure_label(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstructor::{ReconstructedArtifact, ReconstructionFailure};
    use chartwire_types::DecodeError;

    fn artifact(id: &str, title: &str) -> ReconstructedArtifact {
        ReconstructedArtifact {
            chart_id: id.into(),
            title: title.into(),
            bytes: b"\x89PNG\r\n\x1a\n".to_vec(),
            placeholder: Placeholder::for_chart(id),
            media_type: ImageKind::Png,
        }
    }

    fn failure(id: &str, title: &str) -> ReconstructionFailure {
        ReconstructionFailure {
            chart_id: id.into(),
            title: title.into(),
            page: "p".into(),
            placeholder: Placeholder::for_chart(id),
            error: DecodeError::Empty {
                chart_id: id.into(),
            },
        }
    }

    #[test]
    fn known_placeholder_becomes_image_reference() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![artifact("a", "Sales")],
            failures: vec![],
        };
        let doc = resolve("Intro\n\n[CHART_a]\n", &outcome);
        assert_eq!(doc.body, "Intro\n\n![Figure: Sales](charts/a.png)\n");
        assert_eq!(doc.assets.len(), 1);
        assert_eq!(doc.assets[0].file_name, "charts/a.png");
        assert!(doc.unavailable.is_empty());
        assert!(doc.missing.is_empty());
    }

    #[test]
    fn failed_and_unknown_placeholders_become_markers() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![],
            failures: vec![failure("b", "Broken")],
        };
        let doc = resolve("[CHART_b] [CHART_ghost]", &outcome);
        assert_eq!(
            doc.body,
            "[chart unavailable: Broken] [chart unavailable: ghost]"
        );
        assert_eq!(doc.unavailable, ["b", "ghost"]);
        assert!(placeholders_in(&doc.body).is_empty());
    }

    #[test]
    fn duplicates_are_all_replaced_and_listed_once() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![artifact("a", "A")],
            failures: vec![],
        };
        let doc = resolve("[CHART_a] and [CHART_a]", &outcome);
        assert_eq!(
            doc.body,
            "![Figure: A](charts/a.png) and ![Figure: A](charts/a.png)"
        );
        assert_eq!(doc.assets.len(), 1);
    }

    #[test]
    fn unreferenced_artifacts_are_reported_missing() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![artifact("a", "A"), artifact("b", "B")],
            failures: vec![],
        };
        let doc = resolve("only [CHART_b]", &outcome);
        assert_eq!(doc.missing, ["a"]);
    }

    #[test]
    fn resolution_is_idempotent_even_for_hostile_titles() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![artifact("a", "CHART_a"), artifact("b", "[CHART_b]")],
            failures: vec![failure("c", "[CHART_c]")],
        };
        let once = resolve("[CHART_a] [CHART_b] [CHART_c]", &outcome);
        let twice = resolve(&once.body, &outcome);
        assert_eq!(once.body, twice.body);
        assert!(placeholders_in(&once.body).is_empty());
    }

    #[test]
    fn finds_placeholders_in_order() {
        assert_eq!(
            placeholders_in("x [CHART_b] y [CHART_a] [chart unavailable: z]"),
            ["b", "a"]
        );
    }

    #[test]
    fn asset_paths_stay_inside_the_asset_dir() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![
                artifact("../../escaped", "Escaped"),
                artifact("..\\win", "Win"),
                artifact("/etc/passwd", "Abs"),
                artifact("...", "Dots"),
            ],
            failures: vec![],
        };
        let doc = resolve(
            "[CHART_../../escaped] [CHART_..\\win] [CHART_/etc/passwd] [CHART_...]",
            &outcome,
        );
        let names: Vec<&str> = doc.assets.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "charts/_.._escaped.png",
                "charts/_win.png",
                "charts/_etc_passwd.png",
                "charts/chart.png",
            ]
        );
        for name in names {
            let rest = name.strip_prefix("charts/").unwrap();
            assert!(!rest.contains('/') && !rest.contains('\\') && !rest.starts_with('.'));
        }
    }

    #[test]
    fn colliding_stems_get_distinct_files() {
        let outcome = ReconstructionOutcome {
            artifacts: vec![artifact("a:b", "One"), artifact("a_b", "Two")],
            failures: vec![],
        };
        let doc = resolve("[CHART_a:b] [CHART_a_b] [CHART_a:b]", &outcome);
        assert_eq!(
            doc.body,
            "![Figure: One](charts/a_b.png) ![Figure: Two](charts/a_b-2.png) \
             ![Figure: One](charts/a_b.png)"
        );
        assert_eq!(doc.assets.len(), 2);
    }
}
