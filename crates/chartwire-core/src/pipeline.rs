//! Producer side: drive one request from references to a guarded response.
//!
//! `Received -> Fetching -> Encoded -> Split -> Assembled`, each transition
//! logged with the request's span. Per-chart failures are kept in the
//! response as unavailable markers unless the failure policy is `abort`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chartwire_platform::store::ObjectStore;
use chartwire_types::chart::{is_valid_chart_id, page_from_section_key};
use chartwire_types::config::{Config, FailurePolicy, PipelineConfig};
use chartwire_types::{
    ArtifactError, ChartReference, ChartRequest, ExportEntry, PipelineError, Placeholder,
    RequestState, WireResponse,
};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::artifact::ChartArtifact;
use crate::assembler::{AssemblyInput, ChartOutcome, ChartSlot, ResponseAssembler};
use crate::encoder::DualEncoder;
use crate::fetcher::ArtifactFetcher;
use crate::guard;
use crate::splitter::{InlineView, PayloadSplitter};

/// Both views of one chart, or why it has none. Artifact problems arrive as
/// [`PipelineError::ArtifactFailed`]; anything else aborts the request.
type Prepared = Result<(InlineView, ExportEntry), PipelineError>;

/// The producer pipeline. Cheap to share; holds no per-request state.
#[derive(Debug, Clone)]
pub struct ChartPipeline {
    fetcher: ArtifactFetcher,
    encoder: DualEncoder,
    assembler: ResponseAssembler,
    config: PipelineConfig,
}

impl ChartPipeline {
    /// Build a pipeline reading from `store`.
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            fetcher: ArtifactFetcher::new(store, &config.fetch),
            encoder: DualEncoder::new(&config.encoding),
            assembler: ResponseAssembler,
            config: config.pipeline.clone(),
        }
    }

    /// Run one request.
    ///
    /// Cancelling `cancel`, or reaching the configured request deadline,
    /// abandons outstanding fetches. Charts already fetched are still
    /// assembled and `summary.cancelled` is set.
    pub async fn run(
        &self,
        request: ChartRequest,
        cancel: CancellationToken,
    ) -> Result<WireResponse, PipelineError> {
        let span = info_span!("produce", charts = request.chart_refs.len());
        async move {
            let result = self.run_inner(request, cancel).await;
            if let Err(err) = &result {
                warn!(state = %RequestState::Failed, error = %err, "request failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        request: ChartRequest,
        cancel: CancellationToken,
    ) -> Result<WireResponse, PipelineError> {
        let started = Instant::now();
        let ChartRequest {
            chart_refs,
            page_assignment,
            narrative,
            metadata,
        } = request;

        validate(&chart_refs, &metadata)?;
        let pages: Vec<String> = chart_refs
            .iter()
            .map(|r| resolve_page(r, &page_assignment, &self.config.default_page))
            .collect();
        info!(state = %RequestState::Received, charts = chart_refs.len(), "references received");

        let token = cancel.child_token();
        let timer = {
            let token = token.clone();
            let deadline = self.config.request_timeout();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(timeout_secs = deadline.as_secs(), "request deadline reached");
                token.cancel();
            })
        };

        // Encode and split inside each fetch task so the raw buffer is
        // dropped before the next read takes the permit.
        let splitter = Arc::new(PayloadSplitter::new());
        let prepare = {
            let encoder = self.encoder.clone();
            let splitter = Arc::clone(&splitter);
            move |reference: &ChartReference, bytes: Vec<u8>| -> Prepared {
                let encoded = encoder.encode(bytes).map_err(|source| {
                    PipelineError::ArtifactFailed {
                        chart_id: reference.id.clone(),
                        source,
                    }
                })?;
                splitter.split(ChartArtifact::new(reference, encoded))
            }
        };

        info!(state = %RequestState::Fetching, "fetching artifacts");
        let outcomes = self
            .fetcher
            .fetch_all(chart_refs, &token, prepare)
            .await;
        let cancelled = token.is_cancelled();
        timer.abort();

        let mut slots = Vec::with_capacity(outcomes.len());
        let mut first_failure: Option<(usize, String, ArtifactError)> = None;
        let mut encoded = 0usize;

        for outcome in outcomes {
            let position = outcome.position;
            let reference = outcome.reference;
            let page = pages[position].clone();

            let prepared = match outcome.result {
                Ok(Ok(views)) => Ok(views),
                Ok(Err(PipelineError::ArtifactFailed { source, .. })) => Err(source),
                Ok(Err(other)) => return Err(other),
                Err(err) => Err(ArtifactError::from(err)),
            };

            let result = match prepared {
                Ok((inline, export)) => {
                    encoded += 1;
                    ChartOutcome::Ready { inline, export }
                }
                Err(err) => {
                    let reason = err.to_string();
                    if first_failure.as_ref().is_none_or(|(p, _, _)| position < *p) {
                        first_failure = Some((position, reference.id.clone(), err));
                    }
                    ChartOutcome::Failed { reason }
                }
            };

            slots.push(ChartSlot {
                position,
                title: reference.display_title().to_string(),
                chart_id: reference.id,
                page,
                outcome: result,
            });
        }
        info!(state = %RequestState::Encoded, encoded, "artifacts encoded");
        info!(state = %RequestState::Split, placeholders = splitter.issued(), "views split");

        if self.config.failure_policy == FailurePolicy::Abort
            && let Some((_, chart_id, source)) = first_failure
        {
            return Err(PipelineError::ArtifactFailed { chart_id, source });
        }

        let mut response = self.assembler.assemble(AssemblyInput {
            narrative,
            slots,
            metadata,
        })?;
        response.summary.elapsed_ms = started.elapsed().as_millis() as u64;
        response.summary.cancelled = cancelled;

        info!(
            state = %RequestState::Assembled,
            succeeded = response.summary.succeeded,
            failed = response.summary.failed,
            elapsed_ms = response.summary.elapsed_ms,
            cancelled,
            "response assembled"
        );
        Ok(response)
    }
}

/// Reject malformed ids, ids used twice and metadata that could never pass
/// the wire guard. Runs before anything is fetched.
fn validate(
    references: &[ChartReference],
    metadata: &Map<String, Value>,
) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for reference in references {
        if !is_valid_chart_id(&reference.id) {
            return Err(PipelineError::InvalidRequest {
                reason: format!(
                    "chart id {:?} must be non-empty, free of brackets, braces, \
                     slashes and whitespace, and must not contain \"..\"",
                    reference.id
                ),
            });
        }
        if !seen.insert(reference.id.as_str()) {
            return Err(PipelineError::PlaceholderCollision {
                placeholder: Placeholder::for_chart(&reference.id).to_string(),
            });
        }
    }
    guard::check_metadata(metadata).map_err(|err| match err {
        PipelineError::SerializationViolation { path, reason } => PipelineError::InvalidRequest {
            reason: format!("metadata at {path}: {reason}"),
        },
        other => other,
    })
}

/// Page for a reference: explicit assignment, then the section key, then
/// the default.
fn resolve_page(
    reference: &ChartReference,
    assignment: &HashMap<String, String>,
    default_page: &str,
) -> String {
    if let Some(page) = assignment.get(&reference.id) {
        return page.clone();
    }
    if let Some(page) = reference.section.as_deref().and_then(page_from_section_key) {
        return page.to_string();
    }
    debug!(chart_id = %reference.id, default_page, "no page assignment, using default");
    default_page.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chartwire_platform::store::MemoryObjectStore;
    use chartwire_types::FetchError;
    use chartwire_types::config::RetrySettings;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nchart";

    fn config() -> Config {
        let mut config = Config::default();
        config.fetch.retry = RetrySettings {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_fraction: 0.0,
        };
        config
    }

    fn store() -> MemoryObjectStore {
        MemoryObjectStore::new()
            .with_object("s3://b/a.png", PNG.to_vec())
            .with_object("s3://b/c.png", PNG.to_vec())
    }

    fn request(ids: &[&str]) -> ChartRequest {
        ChartRequest {
            chart_refs: ids
                .iter()
                .map(|id| ChartReference::new(*id, format!("Chart {id}"), format!("s3://b/{id}.png")))
                .collect(),
            ..ChartRequest::default()
        }
    }

    #[tokio::test]
    async fn missing_artifact_degrades() {
        let pipeline = ChartPipeline::new(Arc::new(store()), &config());
        let resp = pipeline
            .run(request(&["a", "b", "c"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resp.summary.total, 3);
        assert_eq!(resp.summary.succeeded, 2);
        assert_eq!(resp.summary.failed, 1);
        assert!(!resp.summary.cancelled);
        assert_eq!(resp.answer.matches("<img ").count(), 2);
        assert!(resp.answer.contains("[image unavailable: Chart b]"));
        assert_eq!(resp.export_bundle.failed_charts[0].chart_id, "b");
    }

    #[tokio::test]
    async fn abort_policy_fails_on_first_failure() {
        let mut config = config();
        config.pipeline.failure_policy = FailurePolicy::Abort;
        let pipeline = ChartPipeline::new(Arc::new(store()), &config);

        let err = pipeline
            .run(request(&["a", "x", "y"]), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::ArtifactFailed { chart_id, source } => {
                assert_eq!(chart_id, "x");
                assert!(matches!(
                    source,
                    ArtifactError::Fetch(FetchError::NotFound { .. })
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn duplicate_ids_collide() {
        let pipeline = ChartPipeline::new(Arc::new(store()), &config());
        let err = pipeline
            .run(request(&["a", "a"]), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PlaceholderCollision { .. }));
    }

    #[tokio::test]
    async fn bad_ids_are_rejected() {
        let pipeline = ChartPipeline::new(Arc::new(store()), &config());
        for id in ["", "a b", "a]", "../../escaped", "a/b", "a{b}"] {
            let err = pipeline
                .run(request(&[id]), CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidRequest { .. }), "{id:?}");
        }
    }

    #[tokio::test]
    async fn empty_artifact_is_a_per_chart_failure() {
        let store = store().with_object("s3://b/e.png", Vec::new());
        let pipeline = ChartPipeline::new(Arc::new(store), &config());
        let resp = pipeline
            .run(request(&["a", "e"]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.summary.failed, 1);
        assert!(resp.export_bundle.failed_charts[0].reason.contains("invalid"));
    }

    #[tokio::test]
    async fn pages_follow_assignment_then_section_then_default() {
        let mut req = request(&["a", "c"]);
        req.chart_refs[1].section = Some("_02_01_Brand Health_chart".into());
        req.chart_refs.push(ChartReference::new("d", "D", "s3://b/a.png"));
        req.page_assignment.insert("d".into(), "Appendix".into());

        let pipeline = ChartPipeline::new(Arc::new(store()), &config());
        let resp = pipeline.run(req, CancellationToken::new()).await.unwrap();
        let pages: Vec<&str> = resp
            .export_bundle
            .charts_data
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(pages, ["unknown_page", "Brand Health", "Appendix"]);
    }

    #[tokio::test]
    async fn request_deadline_keeps_completed_charts() {
        let store = store()
            .with_object("s3://b/slow.png", PNG.to_vec())
            .with_delay("s3://b/slow.png", Duration::from_secs(5));
        let mut config = config();
        config.pipeline.request_timeout_secs = 1;
        let pipeline = ChartPipeline::new(Arc::new(store), &config);

        let resp = pipeline
            .run(request(&["a", "slow"]), CancellationToken::new())
            .await
            .unwrap();
        assert!(resp.summary.cancelled);
        assert_eq!(resp.summary.succeeded, 1);
        assert_eq!(resp.export_bundle.failed_charts[0].chart_id, "slow");
        assert_eq!(resp.export_bundle.failed_charts[0].reason, "fetch cancelled");
    }

    #[tokio::test]
    async fn external_cancel_is_honored() {
        let store = store().with_delay("s3://b/a.png", Duration::from_secs(5));
        let pipeline = ChartPipeline::new(Arc::new(store), &config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let resp = pipeline.run(request(&["a"]), cancel).await.unwrap();
        assert!(resp.summary.cancelled);
        assert_eq!(resp.summary.failed, 1);
    }

    #[tokio::test]
    async fn integer_metadata_passes_through() {
        let mut req = request(&["a"]);
        let scores: Vec<u8> = vec![3, 4, 5, 4, 3, 5, 5, 4, 3, 2, 4, 5, 3, 4, 5, 4];
        req.metadata
            .insert("monthly_scores".into(), serde_json::json!(scores));

        let pipeline = ChartPipeline::new(Arc::new(store()), &config());
        let resp = pipeline.run(req, CancellationToken::new()).await.unwrap();
        assert_eq!(resp.metadata["monthly_scores"], serde_json::json!(scores));
        assert_eq!(resp.summary.succeeded, 1);
    }

    #[tokio::test]
    async fn binary_metadata_is_rejected_before_fetching() {
        let store = Arc::new(store());
        let mut req = request(&["a", "c"]);
        req.metadata.insert("bytes".into(), serde_json::json!("AAAA"));

        let pipeline = ChartPipeline::new(store.clone(), &config());
        let err = pipeline.run(req, CancellationToken::new()).await.unwrap_err();
        match err {
            PipelineError::InvalidRequest { reason } => {
                assert!(reason.contains("$.metadata.bytes"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls("s3://b/a.png"), 0);
        assert_eq!(store.calls("s3://b/c.png"), 0);
    }

    #[tokio::test]
    async fn every_buffer_is_encoded_once() {
        let mut store = MemoryObjectStore::new();
        let mut ids = Vec::new();
        for i in 0..6 {
            let id = format!("c{i}");
            store = store
                .with_object(&format!("s3://b/{id}.png"), PNG.to_vec())
                .with_delay(&format!("s3://b/{id}.png"), Duration::from_millis(5));
            ids.push(id);
        }
        let store = Arc::new(store);
        let mut config = config();
        config.fetch.max_concurrency = 2;
        let pipeline = ChartPipeline::new(store.clone(), &config);

        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let resp = pipeline
            .run(request(&ids), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.delivered(), 6);
        assert_eq!(resp.summary.succeeded, 6);
        assert_eq!(resp.export_bundle.chart_count(), 6);
        assert!(store.peak_in_flight() <= 2);
    }
}
