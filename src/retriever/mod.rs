// src/retriever/mod.rs
// Retriever (spec §4.7): fuses vector, full-text and composite sub-queries
// by Reciprocal Rank Fusion, applies post-filters, and caches results per
// user with an epoch counter so ProfileEngine commits can force a refresh
// without the cache needing to know why.

use crate::audit::AuditLog;
use crate::store::{CompositeFilter, TieredStore};
use crate::types::{AccessKind, AccessResult, AccessorKind, AuditRecord, DataKind, Observation, Tier};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RETRIEVER_ACCESSOR: &str = "retriever";

const RRF_K: f32 = 60.0;
const VECTOR_WEIGHT: f32 = 0.5;
const TEXT_WEIGHT: f32 = 0.3;
const COMPOSITE_WEIGHT: f32 = 0.2;

#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub min_influence_weight: Option<f32>,
    pub min_quality_score: Option<f32>,
    pub tiers: Option<Vec<Tier>>,
    pub tags_required: Vec<String>,
    pub tags_excluded: Vec<String>,
}

impl QueryFilters {
    fn matches(&self, obs: &Observation) -> bool {
        if let Some(min) = self.min_influence_weight {
            if obs.influence_weight < min {
                return false;
            }
        }
        if let Some(min) = self.min_quality_score {
            if obs.quality_score < min {
                return false;
            }
        }
        if let Some(tiers) = &self.tiers {
            if !tiers.contains(&obs.tier) {
                return false;
            }
        }
        let all_tags: Vec<&String> = obs.tags.iter().chain(obs.enhanced_tags.iter()).collect();
        if !self.tags_required.iter().all(|t| all_tags.iter().any(|x| *x == t)) {
            return false;
        }
        if self.tags_excluded.iter().any(|t| all_tags.iter().any(|x| *x == t)) {
            return false;
        }
        true
    }
}

struct CacheEntry {
    results: Vec<Observation>,
    inserted_at: Instant,
    epoch: u64,
}

pub struct Retriever {
    store: Arc<TieredStore>,
    ttl: Duration,
    cache: RwLock<HashMap<(String, String), CacheEntry>>,
    epochs: RwLock<HashMap<String, Arc<AtomicU64>>>,
    audit: Arc<AuditLog>,
}

impl Retriever {
    pub fn new(store: Arc<TieredStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(60),
            cache: RwLock::new(HashMap::new()),
            epochs: RwLock::new(HashMap::new()),
            audit,
        }
    }

    /// Advances the per-user cache epoch, invalidating its cached entries
    /// on next lookup (spec §4.7: "invalidated ... when ProfileEngine
    /// commits updates"). Called by ProfileEngine after `replace`.
    pub fn invalidate_user(&self, user_id: &str) {
        self.epoch_for(user_id).fetch_add(1, Ordering::SeqCst);
    }

    fn epoch_for(&self, user_id: &str) -> Arc<AtomicU64> {
        if let Some(e) = self.epochs.read().get(user_id) {
            return e.clone();
        }
        self.epochs
            .write()
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    pub async fn query(
        &self,
        user_id: &str,
        q_text: &str,
        q_embedding: &[f32],
        filters: &QueryFilters,
        limit: usize,
    ) -> anyhow::Result<Vec<Observation>> {
        let start = Instant::now();
        let cache_key = cache_key(q_text, filters);
        let current_epoch = self.epoch_for(user_id).load(Ordering::SeqCst);

        if let Some(hit) = self.cache_get(user_id, &cache_key, current_epoch) {
            self.record_access(user_id, &hit).await?;
            crate::metrics::record_retriever_query(true, start.elapsed().as_secs_f64());
            return Ok(hit);
        }

        let fan_out = limit.max(20);
        let vector_index = self.store.vector_index();
        let full_text_index = self.store.full_text_index();
        let composite_index = self.store.composite_index();

        let vector_filter = crate::store::VectorFilter {
            min_influence_weight: filters.min_influence_weight,
            tiers: filters.tiers.clone(),
        };
        let composite_filter = CompositeFilter {
            tags_required: filters.tags_required.clone(),
            tags_excluded: filters.tags_excluded.clone(),
            source: None,
            tiers: filters.tiers.clone(),
        };

        let (vector_hits, text_hits, composite_hits) = tokio::join!(
            vector_index.search(user_id, q_embedding, fan_out, &vector_filter),
            async { Ok::<_, anyhow::Error>(full_text_index.search(user_id, q_text, fan_out)) },
            async { Ok::<_, anyhow::Error>(composite_index.query(user_id, &composite_filter, fan_out)) },
        );
        let vector_hits = vector_hits?;
        let text_hits = text_hits?;
        let composite_hits = composite_hits?;

        let mut fused: HashMap<String, f32> = HashMap::new();
        for (rank, m) in vector_hits.iter().enumerate() {
            *fused.entry(m.observation_id.clone()).or_insert(0.0) += VECTOR_WEIGHT * rrf(rank);
        }
        for (rank, m) in text_hits.iter().enumerate() {
            *fused.entry(m.observation_id.clone()).or_insert(0.0) += TEXT_WEIGHT * rrf(rank);
        }
        for (rank, o) in composite_hits.iter().enumerate() {
            *fused.entry(o.id.clone()).or_insert(0.0) += COMPOSITE_WEIGHT * rrf(rank);
        }

        let mut by_id: HashMap<String, Observation> = HashMap::new();
        for o in composite_hits {
            by_id.insert(o.id.clone(), o);
        }
        for id in fused.keys() {
            if by_id.contains_key(id) {
                continue;
            }
            if let Some(obs) = self.store.get(user_id, id).await? {
                by_id.insert(id.clone(), obs);
            }
        }

        let mut ranked: Vec<(String, f32)> = fused.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));

        let results: Vec<Observation> = ranked
            .into_iter()
            .filter_map(|(id, _)| by_id.remove(&id))
            .filter(|o| filters.matches(o))
            .take(limit)
            .collect();

        self.record_access(user_id, &results).await?;
        self.cache_put(user_id, cache_key, results.clone(), current_epoch);
        crate::metrics::record_retriever_query(false, start.elapsed().as_secs_f64());
        Ok(results)
    }

    /// Records one audit entry per observation surfaced by a query (spec §8
    /// invariant 9), including cache hits since those are still an access
    /// to the underlying observations from the caller's point of view.
    async fn record_access(&self, user_id: &str, results: &[Observation]) -> anyhow::Result<()> {
        for obs in results {
            self.audit
                .record(&AuditRecord {
                    user_id: user_id.to_string(),
                    accessor_id: RETRIEVER_ACCESSOR.to_string(),
                    accessor_kind: AccessorKind::System,
                    data_kind: DataKind::Observation,
                    data_id: obs.id.clone(),
                    access_kind: AccessKind::Read,
                    timestamp: Utc::now(),
                    ip: None,
                    purpose: None,
                    result: AccessResult::Allowed,
                })
                .await?;
        }
        Ok(())
    }

    fn cache_get(&self, user_id: &str, key: &str, current_epoch: u64) -> Option<Vec<Observation>> {
        let cache = self.cache.read();
        cache
            .get(&(user_id.to_string(), key.to_string()))
            .filter(|e| e.epoch == current_epoch && e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.results.clone())
    }

    fn cache_put(&self, user_id: &str, key: String, results: Vec<Observation>, epoch: u64) {
        let mut cache = self.cache.write();
        cache.insert(
            (user_id.to_string(), key),
            CacheEntry { results, inserted_at: Instant::now(), epoch },
        );
        if cache.len() > 10_000 {
            cache.clear();
        }
    }
}

fn rrf(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}

fn cache_key(q_text: &str, filters: &QueryFilters) -> String {
    format!("{q_text}|{filters:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_decreases_with_rank() {
        assert!(rrf(0) > rrf(1));
        assert!(rrf(1) > rrf(5));
    }

    #[test]
    fn filters_reject_below_floor() {
        use crate::types::{AccessLevel, RawObservation};
        let mut o = Observation::from_raw(
            RawObservation {
                id: "o1".into(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: chrono::Utc::now(),
                source: "notes".into(),
                highlight: "h".into(),
                note: "n".into(),
                address: "addr".into(),
                tags: vec![],
                access: AccessLevel::Private,
            },
            "h".into(),
        );
        o.influence_weight = 0.1;
        let filters = QueryFilters { min_influence_weight: Some(0.5), ..Default::default() };
        assert!(!filters.matches(&o));
    }
}
