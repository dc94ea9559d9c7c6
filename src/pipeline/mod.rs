// src/pipeline/mod.rs
// ObservationPipeline (spec §4.1): validate -> idempotency check -> enrich
// -> score -> tier -> store -> enqueue profile update. Mirrors the
// teacher's ingestion flow shape (validate, dedupe via content hash,
// enrich, persist) from backend/src/memory/service, generalized across the
// three scoring stages this spec adds.

pub mod types;

use crate::attention::{AttentionCache, AttentionScorer};
use crate::audit::AuditLog;
use crate::config::scoring::ScoringConfig;
use crate::config::server::ServerConfig;
use crate::enrichment::EnrichmentWorker;
use crate::error::CoreError;
use crate::keyed_mutex::KeyedMutex;
use crate::profile::ProfileUpdateEvent;
use crate::store::TieredStore;
use crate::types::{
    AccessKind, AccessResult, AccessorKind, AuditRecord, DataKind, Observation, RawObservation, Tier,
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

pub use types::{BatchOptions, BatchSummary, ItemOutcome, PerItemResult, Priority, SubmitBatchRequest};

const HISTORY_LIMIT: i64 = 200;

pub struct ObservationPipeline {
    store: Arc<TieredStore>,
    enrichment: Arc<EnrichmentWorker>,
    attention_scorer: AttentionScorer,
    attention_cache: AttentionCache,
    scoring_cfg: ScoringConfig,
    server_cfg: ServerConfig,
    locks: Arc<KeyedMutex>,
    profile_tx: mpsc::Sender<ProfileUpdateEvent>,
    in_flight_enrichments: AtomicUsize,
    audit: Arc<AuditLog>,
}

impl ObservationPipeline {
    pub fn new(
        store: Arc<TieredStore>,
        enrichment: Arc<EnrichmentWorker>,
        scoring_cfg: ScoringConfig,
        server_cfg: ServerConfig,
        locks: Arc<KeyedMutex>,
        profile_tx: mpsc::Sender<ProfileUpdateEvent>,
        audit: Arc<AuditLog>,
    ) -> Self {
        let attention_window_days = scoring_cfg.attention_window_days;
        let attention_cache_ttl = std::time::Duration::from_secs(scoring_cfg.attention_cache_ttl_secs.max(0) as u64);
        Self {
            store,
            enrichment,
            attention_scorer: AttentionScorer::new(attention_window_days),
            attention_cache: AttentionCache::new(attention_cache_ttl),
            scoring_cfg,
            server_cfg,
            locks,
            profile_tx,
            in_flight_enrichments: AtomicUsize::new(0),
            audit,
        }
    }

    pub async fn submit_batch(&self, request: SubmitBatchRequest) -> Result<BatchSummary, CoreError> {
        let job_id = Uuid::new_v4().to_string();
        let mut per_item = Vec::with_capacity(request.batch.len());
        let mut degraded = false;

        let _guard = self.locks.lock(&request.user_id).await;

        for raw in request.batch {
            match self
                .process_item(&request.app_id, &request.user_id, raw, &request.options, &mut degraded)
                .await
            {
                Ok(result) => per_item.push(result),
                Err(e) => {
                    warn!(error = %e, "item processing failed unexpectedly, recording as storage-transient");
                    per_item.push(PerItemResult {
                        id: String::new(),
                        outcome: ItemOutcome::Rejected { reason: e.to_string() },
                    });
                }
            }
        }

        let accepted = per_item.iter().filter(|r| matches!(r.outcome, ItemOutcome::Accepted { .. })).count();
        let rejected = per_item.len() - accepted;
        crate::metrics::record_batch_submitted(accepted, rejected, degraded);

        Ok(BatchSummary {
            processed_count: per_item.len(),
            job_id,
            per_item,
            degraded,
        })
    }

    async fn process_item(
        &self,
        app_id: &str,
        user_id: &str,
        raw: RawObservation,
        options: &BatchOptions,
        degraded: &mut bool,
    ) -> Result<PerItemResult, CoreError> {
        let id = raw.id.clone();

        if let Some(reason) = validate(&raw, self.server_cfg.max_item_bytes) {
            return Ok(PerItemResult { id, outcome: ItemOutcome::Rejected { reason } });
        }

        let content_hash = compute_content_hash(user_id, &raw);

        let dedup_window = chrono::Duration::hours(self.scoring_cfg.dedup_window_hours);
        if let Some(existing) = self
            .store
            .find_by_content_hash(user_id, &content_hash, dedup_window)
            .await?
        {
            self.record_access(app_id, user_id, &existing.id, AccessKind::Read).await?;
            return Ok(PerItemResult {
                id: existing.id,
                outcome: ItemOutcome::Accepted { influence_weight: existing.influence_weight },
            });
        }

        let mut obs = Observation::from_raw(raw, content_hash.clone());

        let item_degraded = self
            .enrich_with_backpressure(&mut obs, options)
            .await;
        if item_degraded {
            *degraded = true;
        }

        let history = self
            .store
            .recent_for_user(user_id, Utc::now() - chrono::Duration::days(self.scoring_cfg.attention_window_days), HISTORY_LIMIT)
            .await?;

        let scored = match self.attention_cache.get(user_id, &content_hash) {
            Some(cached) => cached,
            None => {
                let scored = self.attention_scorer.score(
                    &obs.highlight,
                    &obs.address,
                    Some(&obs.embedding),
                    &obs.tags,
                    obs.note.len(),
                    &history,
                    Utc::now(),
                );
                self.attention_cache.put(user_id, &content_hash, scored);
                scored
            }
        };
        obs.attention_weight = scored.weight;
        obs.attention_metrics = scored.metrics;

        obs.quality_score = quality_score(&obs, &self.scoring_cfg, item_degraded);
        obs.influence_weight = (obs.quality_score * obs.attention_weight).clamp(0.0, 1.0);
        obs.tier = TieredStore::tier_for(&obs, &self.scoring_cfg, Utc::now());

        self.store.put(&obs).await?;
        self.record_access(app_id, user_id, &obs.id, AccessKind::Write).await?;

        if self.profile_tx.try_send(ProfileUpdateEvent {
            user_id: user_id.to_string(),
            observation_id: obs.id.clone(),
        }).is_err() {
            warn!(observation_id = %obs.id, "profile update queue full or closed, dropping event");
        }

        Ok(PerItemResult {
            id: obs.id,
            outcome: ItemOutcome::Accepted { influence_weight: obs.influence_weight },
        })
    }

    /// Records the audit trail for an observation access (spec §8 invariant
    /// 9: every access to an observation or profile produces exactly one
    /// `AuditRecord`). The accessing app is the accessor, since ingestion
    /// only ever happens on behalf of a registered app.
    async fn record_access(&self, app_id: &str, user_id: &str, observation_id: &str, access_kind: AccessKind) -> Result<(), CoreError> {
        self.audit
            .record(&AuditRecord {
                user_id: user_id.to_string(),
                accessor_id: app_id.to_string(),
                accessor_kind: AccessorKind::App,
                data_kind: DataKind::Observation,
                data_id: observation_id.to_string(),
                access_kind,
                timestamp: Utc::now(),
                ip: None,
                purpose: None,
                result: AccessResult::Allowed,
            })
            .await
    }

    /// Runs enrichment unless the in-flight count already saturates the
    /// configured queue capacity, in which case the pipeline degrades
    /// (spec §4.1 "Backpressure"): enrichment is skipped and defaults are
    /// recorded, but the item is still written.
    async fn enrich_with_backpressure(&self, obs: &mut Observation, options: &BatchOptions) -> bool {
        if !options.enable_enrichment {
            self.mark_degraded(obs);
            crate::metrics::record_enrichment(true, 0.0);
            return true;
        }

        if self.in_flight_enrichments.load(Ordering::SeqCst) >= self.server_cfg.enrichment_queue_capacity {
            warn!(observation_id = %obs.id, "enrichment queue saturated, degrading");
            self.mark_degraded(obs);
            crate::metrics::record_enrichment(true, 0.0);
            return true;
        }

        self.in_flight_enrichments.fetch_add(1, Ordering::SeqCst);
        crate::metrics::set_queue_depth("enrichment", self.in_flight_enrichments.load(Ordering::SeqCst));
        let start = std::time::Instant::now();
        self.enrichment.enrich(obs).await;
        self.in_flight_enrichments.fetch_sub(1, Ordering::SeqCst);
        crate::metrics::record_enrichment(obs.processing.enrichment_degraded, start.elapsed().as_secs_f64());
        obs.processing.enrichment_degraded
    }

    fn mark_degraded(&self, obs: &mut Observation) {
        obs.embedding = crate::vecmath::fallback_embedding(&format!("{} {}", obs.highlight, obs.note), 64);
        obs.processing.enrichment_degraded = true;
        obs.processing.backpressure_applied = true;
    }
}

/// Validates a raw item per spec §4.1 step 1. Returns `Some(reason)` if
/// rejected; the caller reports this in the batch's per-item result
/// without aborting the rest of the batch.
fn validate(raw: &RawObservation, max_item_bytes: usize) -> Option<String> {
    if raw.id.is_empty() {
        return Some("missing id".to_string());
    }
    if raw.address.trim().is_empty() {
        return Some("address must be non-empty".to_string());
    }
    let approx_size = raw.highlight.len() + raw.note.len() + raw.address.len() + raw.tags.iter().map(|t| t.len()).sum::<usize>();
    if approx_size > max_item_bytes {
        return Some(format!("item exceeds {max_item_bytes} bytes"));
    }
    None
}

fn compute_content_hash(user_id: &str, raw: &RawObservation) -> String {
    let mut sorted_tags = raw.tags.clone();
    sorted_tags.sort();
    sorted_tags.dedup();

    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(raw.source.as_bytes());
    hasher.update(b"\0");
    hasher.update(raw.highlight.as_bytes());
    hasher.update(b"\0");
    hasher.update(raw.note.as_bytes());
    hasher.update(b"\0");
    hasher.update(raw.address.as_bytes());
    hasher.update(b"\0");
    hasher.update(sorted_tags.join(",").as_bytes());
    hex::encode(hasher.finalize())
}

/// Quality scoring (spec §4.1 step 6): note length (0.3), tag count (0.2),
/// enriched-field presence (0.3), source trust (0.2), all saturating and
/// clamped to [0,1].
fn quality_score(obs: &Observation, cfg: &ScoringConfig, degraded: bool) -> f32 {
    let note_component = (obs.note.len() as f32 / 500.0).min(1.0) * 0.3;
    let tag_component = (obs.tags.len() as f32 / 5.0).min(1.0) * 0.2;
    let enrichment_component = if degraded { 0.0 } else { 1.0 } * 0.3;
    let trust_component = cfg.trust_for(&obs.source) * 0.2;
    (note_component + tag_component + enrichment_component + trust_component).clamp(0.0, 1.0)
}

/// Determines the initial tier for an observation (spec §4.1 step 8);
/// delegated to [`TieredStore::tier_for`] so the boundary lives in one place.
pub fn tier_for(obs: &Observation, cfg: &ScoringConfig, now: chrono::DateTime<Utc>) -> Tier {
    TieredStore::tier_for(obs, cfg, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessLevel;

    fn raw(id: &str, tags: Vec<String>) -> RawObservation {
        RawObservation {
            id: id.to_string(),
            user_id: "u".into(),
            app_id: "a".into(),
            timestamp: Utc::now(),
            source: "notes".into(),
            highlight: "vector databases".into(),
            note: "HNSW is an ANN index".into(),
            address: "n://1".into(),
            tags,
            access: AccessLevel::Private,
        }
    }

    #[test]
    fn rejects_empty_address() {
        let mut r = raw("o1", vec![]);
        r.address = "   ".into();
        assert!(validate(&r, 64 * 1024).is_some());
    }

    #[test]
    fn rejects_oversized_item() {
        let mut r = raw("o1", vec![]);
        r.note = "x".repeat(100_000);
        assert!(validate(&r, 64 * 1024).is_some());
    }

    #[test]
    fn accepts_well_formed_item() {
        let r = raw("o1", vec!["db".into()]);
        assert!(validate(&r, 64 * 1024).is_none());
    }

    #[test]
    fn content_hash_is_stable_for_same_input_different_tag_order() {
        let a = raw("o1", vec!["x".into(), "y".into()]);
        let mut b = raw("o2", vec!["y".into(), "x".into()]);
        b.id = "different-id-does-not-matter".into();
        assert_eq!(compute_content_hash("u", &a), compute_content_hash("u", &b));
    }

    #[test]
    fn quality_score_is_clamped_and_degrades_without_enrichment() {
        let cfg = ScoringConfig::default();
        let mut obs = Observation::from_raw(raw("o1", vec!["a".into(); 10]), "h".into());
        obs.note = "n".repeat(1000);
        let full = quality_score(&obs, &cfg, false);
        let degraded = quality_score(&obs, &cfg, true);
        assert!(full <= 1.0 && full > degraded);
    }
}
