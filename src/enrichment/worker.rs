// src/enrichment/worker.rs
// EnrichmentWorker (spec §4.6): transforms a validated raw observation into
// enriched fields by invoking the enrichment capability under a timeout,
// falling back to deterministic defaults on timeout or failure.

use super::capability::{EnrichRequest, EnrichmentCapability};
use super::fallback::{DeterministicFallbackEnrichment, FALLBACK_MODEL_VERSION};
use crate::types::{Observation, ProcessingMetadata, SemanticAnalysis};
use crate::vecmath::normalize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct EnrichmentWorker {
    capability: Arc<dyn EnrichmentCapability>,
    fallback: DeterministicFallbackEnrichment,
    timeout: Duration,
}

impl EnrichmentWorker {
    pub fn new(capability: Arc<dyn EnrichmentCapability>, timeout: Duration) -> Self {
        Self {
            capability,
            fallback: DeterministicFallbackEnrichment,
            timeout,
        }
    }

    /// Enriches `obs` in place. Enrichment is best-effort (spec §4.1 step 4):
    /// on timeout or capability error, defaults are recorded and
    /// `enrichment_degraded` is set, but the item is never rejected.
    pub async fn enrich(&self, obs: &mut Observation) {
        let req = EnrichRequest {
            highlight: &obs.highlight,
            note: &obs.note,
            tags: &obs.tags,
        };

        let outcome = tokio::time::timeout(self.timeout, self.capability.enrich(req)).await;

        let (result, degraded) = match outcome {
            Ok(Ok(result)) => (result, false),
            Ok(Err(e)) => {
                warn!(observation_id = %obs.id, error = %e, "enrichment capability failed, using fallback");
                let fallback_req = EnrichRequest {
                    highlight: &obs.highlight,
                    note: &obs.note,
                    tags: &obs.tags,
                };
                (
                    self.fallback
                        .enrich(fallback_req)
                        .await
                        .expect("fallback enrichment is infallible"),
                    true,
                )
            }
            Err(_) => {
                warn!(observation_id = %obs.id, "enrichment timed out, using fallback");
                let fallback_req = EnrichRequest {
                    highlight: &obs.highlight,
                    note: &obs.note,
                    tags: &obs.tags,
                };
                (
                    self.fallback
                        .enrich(fallback_req)
                        .await
                        .expect("fallback enrichment is infallible"),
                    true,
                )
            }
        };

        let mut enhanced_tags = result.tags;
        enhanced_tags.sort();
        enhanced_tags.dedup();

        obs.enhanced_tags = enhanced_tags;
        obs.recommended_highlights = extract_recommended_highlights(&obs.note, &result.top_sentences);
        obs.semantic_analysis = SemanticAnalysis {
            topics: result.topics,
            sentiment: Some(result.sentiment),
            complexity: Some(result.complexity),
        };
        let mut embedding = result.embedding;
        normalize(&mut embedding);
        obs.embedding = embedding;
        obs.processing = ProcessingMetadata {
            enrichment_model_version: Some(if degraded {
                FALLBACK_MODEL_VERSION.to_string()
            } else {
                result.model_version
            }),
            enrichment_degraded: degraded,
            backpressure_applied: false,
        };
    }
}

/// Recommended-highlight extraction rule (spec §4.6): short notes emit
/// `[note]` verbatim; otherwise take up to 3 capability-ranked sentences of
/// at least 20 chars.
fn extract_recommended_highlights(note: &str, candidate_sentences: &[String]) -> Vec<String> {
    if note.len() < 100 {
        return vec![note.to_string()];
    }
    candidate_sentences
        .iter()
        .filter(|s| s.len() >= 20)
        .take(3)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::capability::EnrichResult;
    use crate::types::{AccessLevel, Complexity, RawObservation, Sentiment};
    use async_trait::async_trait;
    use chrono::Utc;

    struct SlowCapability;

    #[async_trait]
    impl EnrichmentCapability for SlowCapability {
        async fn enrich(&self, _req: EnrichRequest<'_>) -> anyhow::Result<EnrichResult> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            unreachable!()
        }
    }

    fn raw(id: &str) -> Observation {
        Observation::from_raw(
            RawObservation {
                id: id.to_string(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: Utc::now(),
                source: "notes".into(),
                highlight: "vector databases".into(),
                note: "HNSW is an ANN index".into(),
                address: "n://1".into(),
                tags: vec!["db".into()],
                access: AccessLevel::Private,
            },
            "hash".into(),
        )
    }

    #[tokio::test]
    async fn timeout_falls_back_and_flags_degraded() {
        let worker = EnrichmentWorker::new(Arc::new(SlowCapability), Duration::from_millis(20));
        let mut obs = raw("o1");
        worker.enrich(&mut obs).await;
        assert!(obs.processing.enrichment_degraded);
        assert!(!obs.embedding.is_empty());
        assert_eq!(obs.recommended_highlights, vec![obs.note.clone()]);
    }

    #[tokio::test]
    async fn short_note_yields_note_as_highlight() {
        let worker = EnrichmentWorker::new(
            Arc::new(DeterministicFallbackEnrichment),
            Duration::from_secs(2),
        );
        let mut obs = raw("o2");
        worker.enrich(&mut obs).await;
        assert_eq!(obs.recommended_highlights, vec![obs.note.clone()]);
        assert_eq!(obs.semantic_analysis.complexity, Some(Complexity::Low));
        assert_ne!(obs.semantic_analysis.sentiment, None);
        let _ = Sentiment::Neutral;
    }
}
