// src/store/mod.rs
// TieredStore (spec §4.3): three-layer persistence plus three indexes,
// with tier migration and consistent retrieval. Put is two-phase
// (write-ahead journal, then index fan-out) so either every index reflects
// the new state or none does.

pub mod cold;
pub mod hot;
pub mod index;
pub mod journal;
pub mod warm;

pub use cold::ColdStore;
pub use hot::HotStore;
pub use index::{
    CompositeFilter, CompositeIndex, FullTextIndex, InMemoryFullTextIndex, InMemoryVectorIndex,
    QdrantVectorIndex, TextMatch, VectorFilter, VectorIndex, VectorMatch,
};
pub use warm::WarmStore;

use crate::error::CoreError;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{Observation, Tier};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

pub struct TieredStore {
    hot: HotStore,
    warm: Arc<WarmStore>,
    cold: ColdStore,
    vector_index: Arc<dyn VectorIndex>,
    full_text_index: Arc<dyn FullTextIndex>,
    composite_index: Arc<CompositeIndex>,
    read_promote_threshold: u32,
    read_promote_window: std::time::Duration,
    cold_reads: parking_lot::RwLock<std::collections::HashMap<String, (u32, std::time::Instant)>>,
}

pub struct TieredStoreConfig {
    pub hot_budget_bytes: usize,
    pub read_promote_threshold: u32,
    pub read_promote_window: std::time::Duration,
    pub cold_store_dir: String,
}

impl TieredStore {
    pub fn new(
        config: TieredStoreConfig,
        warm: Arc<WarmStore>,
        vector_index: Arc<dyn VectorIndex>,
        full_text_index: Arc<dyn FullTextIndex>,
    ) -> Self {
        Self {
            hot: HotStore::new(config.hot_budget_bytes),
            warm,
            cold: ColdStore::new(config.cold_store_dir),
            vector_index,
            full_text_index,
            composite_index: Arc::new(CompositeIndex::new()),
            read_promote_threshold: config.read_promote_threshold,
            read_promote_window: config.read_promote_window,
            cold_reads: parking_lot::RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Determines the initial tier per spec §4.1 step 8.
    pub fn tier_for(obs: &Observation, cfg: &crate::config::scoring::ScoringConfig, now: chrono::DateTime<Utc>) -> Tier {
        let age = obs.age_days(now);
        if age < cfg.hot_age_days && obs.influence_weight >= cfg.hot_influence_floor {
            Tier::Hot
        } else if age < cfg.warm_age_days && obs.influence_weight >= cfg.warm_influence_floor {
            Tier::Warm
        } else {
            Tier::Cold
        }
    }

    /// Writes `obs` durably and updates all three indexes atomically w.r.t.
    /// the observation id (spec §4.3 `put`). Retries transient storage
    /// failures up to 3 times with exponential backoff; on persistent
    /// failure the observation is written to the dead-letter partition
    /// instead of being silently dropped.
    pub async fn put(&self, obs: &Observation) -> Result<(), CoreError> {
        let journal = journal::Journal::new(self.warm.pool());
        journal.begin(&obs.id).await?;

        // Only the warm-tier write is retried: it is the sole step that can
        // fail transiently (SQLite busy/locked) without side effects that
        // retrying would duplicate. Hot/cold/indexes are idempotent upserts
        // keyed by observation id, except cold's append-only log, which is
        // only touched once warm has durably succeeded.
        let write_result: Result<(), CoreError> = with_retry(RetryPolicy::STORAGE, || async {
            self.warm.upsert(obs).await
        })
        .await
        .and_then(|()| {
            if obs.tier == Tier::Hot {
                self.hot.put(obs.clone());
            }
            if obs.tier == Tier::Cold {
                self.cold.append(obs)?;
            }
            self.composite_index.upsert(obs);
            Ok(())
        });

        let write_result = match write_result {
            Ok(()) => self
                .vector_index
                .upsert(obs)
                .await
                .map(|()| self.full_text_index.index(obs))
                .map_err(|e| CoreError::StorageTransient(e.to_string())),
            Err(e) => Err(e),
        };

        match write_result {
            Ok(()) => {
                journal.commit(&obs.id).await?;
                crate::metrics::record_storage_write(obs.tier.as_str(), true);
                Ok(())
            }
            Err(e) => {
                warn!(observation_id = %obs.id, error = %e, "write failed persistently, moving to dead letter");
                let payload = serde_json::to_string(obs).unwrap_or_default();
                self.warm.write_dead_letter(&obs.id, &payload, &e.to_string()).await?;
                journal.rollback(&obs.id).await?;
                crate::metrics::record_storage_write(obs.tier.as_str(), false);
                Err(CoreError::StoragePermanent {
                    item_id: obs.id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Read-through: hot, then warm, then cold. Promotes to hot if the read
    /// count within the promotion window crosses the configured threshold.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Option<Observation>, CoreError> {
        if let Some(obs) = self.hot.get(id) {
            return Ok(Some(obs));
        }

        if let Some(obs) = self.warm.get(id).await? {
            self.maybe_promote(id, &obs);
            return Ok(Some(obs));
        }

        if let Some(obs) = self.cold.get(user_id, id)? {
            self.maybe_promote(id, &obs);
            return Ok(Some(obs));
        }

        Ok(None)
    }

    /// Tracks reads of observations not already in the hot tier, promoting
    /// them once the read count within the promotion window crosses the
    /// configured threshold (spec §4.3 `get`).
    fn maybe_promote(&self, id: &str, obs: &Observation) {
        let now = std::time::Instant::now();
        let mut reads = self.cold_reads.write();
        let (count, first_seen) = reads.entry(id.to_string()).or_insert((0, now));
        if now.duration_since(*first_seen) > self.read_promote_window {
            *first_seen = now;
            *count = 0;
        }
        *count += 1;

        if *count >= self.read_promote_threshold {
            reads.remove(id);
            let mut promoted = obs.clone();
            promoted.tier = Tier::Hot;
            self.hot.put(promoted);
        }
    }

    pub async fn update_tier_and_weight(&self, id: &str, tier: Tier, influence_weight: f32) -> Result<(), CoreError> {
        self.warm.update_tier_and_weight(id, tier, influence_weight).await?;
        if tier != Tier::Hot {
            self.hot.remove(id);
        }
        Ok(())
    }

    pub async fn soft_delete(&self, user_id: &str, id: &str) -> Result<(), CoreError> {
        self.warm.soft_delete(id).await?;
        self.hot.remove(id);
        self.vector_index
            .remove(user_id, id)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        self.full_text_index.remove(id);
        self.composite_index.remove(user_id, id);
        Ok(())
    }

    pub async fn find_by_content_hash(
        &self,
        user_id: &str,
        content_hash: &str,
        within: chrono::Duration,
    ) -> Result<Option<Observation>, CoreError> {
        let since = Utc::now() - within;
        self.warm.find_by_content_hash(user_id, content_hash, since).await
    }

    pub async fn recent_for_user(&self, user_id: &str, since: chrono::DateTime<Utc>, limit: i64) -> Result<Vec<Observation>, CoreError> {
        self.warm.recent_for_user(user_id, since, limit).await
    }

    pub async fn distinct_user_ids(&self) -> Result<Vec<String>, CoreError> {
        self.warm.distinct_user_ids().await
    }

    pub fn vector_index(&self) -> Arc<dyn VectorIndex> {
        self.vector_index.clone()
    }

    pub fn full_text_index(&self) -> Arc<dyn FullTextIndex> {
        self.full_text_index.clone()
    }

    pub fn composite_index(&self) -> Arc<CompositeIndex> {
        self.composite_index.clone()
    }

    /// Background migration (spec §4.3 `migrate`): scans warm for
    /// candidates whose age or weight crosses tier boundaries and
    /// re-persists/reindexes them. Runs with per-user serialization left to
    /// the caller (CoreRuntime schedules one migration task at a time).
    pub async fn migrate(&self, cfg: &crate::config::scoring::ScoringConfig, batch_size: i64) -> Result<usize, CoreError> {
        let candidates = self.warm.candidates_for_migration(batch_size).await?;
        let now = Utc::now();
        let mut migrated = 0;
        for mut obs in candidates {
            let target_tier = Self::tier_for(&obs, cfg, now);
            if target_tier != obs.tier {
                obs.tier = target_tier;
                self.update_tier_and_weight(&obs.id, target_tier, obs.influence_weight).await?;
                if target_tier == Tier::Cold {
                    self.cold.append(&obs)?;
                }
                migrated += 1;
            }
        }
        crate::metrics::record_tier_migration(migrated);
        Ok(migrated)
    }
}
