// src/profile/engine.rs
// ProfileEngine (spec §4.4): merges or creates ProfileComponents from
// observation-update events, rebalances normalized weights, evicts stale
// components. Per-user serialization via KeyedMutex so invariants hold even
// under concurrent events for the same user.

use super::classifier;
use super::store::ProfileStore;
use crate::audit::AuditLog;
use crate::config::scoring::ScoringConfig;
use crate::error::CoreError;
use crate::keyed_mutex::KeyedMutex;
use crate::retriever::Retriever;
use crate::store::TieredStore;
use crate::types::{
    AccessKind, AccessResult, AccessorKind, AuditRecord, DataKind, EvidenceEntry, Priority, ProfileComponent,
};
use crate::vecmath::{cosine, normalize};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const PROFILE_ENGINE_ACCESSOR: &str = "profile-engine";

#[derive(Debug, Clone)]
pub struct ProfileUpdateEvent {
    pub user_id: String,
    pub observation_id: String,
}

pub struct ProfileEngine {
    store: Arc<TieredStore>,
    profiles: ProfileStore,
    locks: Arc<KeyedMutex>,
    cfg: ScoringConfig,
    retriever: Option<Arc<Retriever>>,
    audit: Arc<AuditLog>,
}

impl ProfileEngine {
    pub fn new(store: Arc<TieredStore>, profiles: ProfileStore, cfg: ScoringConfig, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            profiles,
            locks: Arc::new(KeyedMutex::new()),
            cfg,
            retriever: None,
            audit,
        }
    }

    /// Wires the retriever whose per-user cache should be invalidated after
    /// each committed profile update (spec §4.7). Optional so tests and
    /// standalone uses of `ProfileEngine` don't need a `Retriever`.
    pub fn with_retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Spawns a worker task draining profile-update events and applying
    /// them via [`Self::on_observation`]. Returns the sender side so
    /// producers (ObservationPipeline) can enqueue without blocking on the
    /// update itself.
    pub fn spawn_worker(self: Arc<Self>, capacity: usize) -> mpsc::Sender<ProfileUpdateEvent> {
        let (tx, mut rx) = mpsc::channel::<ProfileUpdateEvent>(capacity);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = self.on_observation(&event.user_id, &event.observation_id).await {
                    warn!(user_id = %event.user_id, observation_id = %event.observation_id, error = %e, "profile update failed");
                }
            }
        });
        tx
    }

    /// Loads a user's current profile components, for read-only callers
    /// (diagnostics, the CLI's `dump-profile`) that don't go through
    /// `on_observation`.
    pub async fn load_profile(&self, user_id: &str) -> Result<Vec<ProfileComponent>, CoreError> {
        let components = self.profiles.load(user_id).await?;
        self.record_access(user_id, user_id, DataKind::Profile, AccessKind::Read).await?;
        Ok(components)
    }

    /// Applies one observation to the user's profile (spec §4.4 steps 1-9).
    /// Uses the observation's own carried timestamp as "now" throughout, not
    /// wall-clock time, so replaying the same event sequence always produces
    /// the same merge/create/evict decisions regardless of when it's run.
    pub async fn on_observation(&self, user_id: &str, observation_id: &str) -> Result<(), CoreError> {
        let _guard = self.locks.lock(user_id).await;

        let obs = self
            .store
            .get(user_id, observation_id)
            .await?
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("observation {observation_id} not found for profile update")))?;
        self.record_access(user_id, observation_id, DataKind::Observation, AccessKind::Read).await?;

        let mut components = self.profiles.load(user_id).await?;
        let now = obs.timestamp;

        let intent = obs.embedding.clone();
        let component_type = classifier::classify(&obs);

        let best = components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.component_type == component_type)
            .map(|(i, c)| {
                let age_days = (now - c.last_updated).num_days() as f32;
                let time_decay = 0.95f32.powf(age_days);
                let score = cosine(&intent, &c.embedding) * time_decay * obs.attention_weight;
                (i, score)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        match best {
            Some((idx, score)) if score > self.cfg.merge_similarity_threshold => {
                merge_into(&mut components[idx], &intent, obs.attention_weight, observation_id, now, self.cfg.evidence_cap);
            }
            _ => {
                components.push(create_component(user_id, component_type, &obs, &intent, observation_id, now));
            }
        }

        rebalance(&mut components);
        let before = components.len();
        components.retain(|c| {
            !(c.normalized_weight < self.cfg.eviction_weight_floor
                && (now - c.last_activated).num_days() > self.cfg.eviction_grace_days)
        });
        if components.len() != before {
            rebalance(&mut components);
        }

        self.profiles.replace(user_id, &components).await?;
        self.record_access(user_id, user_id, DataKind::Profile, AccessKind::Write).await?;
        if let Some(retriever) = &self.retriever {
            retriever.invalidate_user(user_id);
        }
        crate::metrics::record_profile_update(components.len());
        info!(user_id, observation_id, components = components.len(), "profile updated");
        Ok(())
    }

    async fn record_access(&self, user_id: &str, data_id: &str, data_kind: DataKind, access_kind: AccessKind) -> Result<(), CoreError> {
        self.audit
            .record(&AuditRecord {
                user_id: user_id.to_string(),
                accessor_id: PROFILE_ENGINE_ACCESSOR.to_string(),
                accessor_kind: AccessorKind::System,
                data_kind,
                data_id: data_id.to_string(),
                access_kind,
                timestamp: Utc::now(),
                ip: None,
                purpose: None,
                result: AccessResult::Allowed,
            })
            .await
    }
}

fn merge_strength(attention_weight: f32) -> f32 {
    if attention_weight > 0.8 {
        1.0
    } else if attention_weight > 0.6 {
        0.8
    } else if attention_weight > 0.4 {
        0.6
    } else {
        0.3
    }
}

fn merge_into(
    c: &mut ProfileComponent,
    intent: &[f32],
    attention_weight: f32,
    observation_id: &str,
    now: chrono::DateTime<Utc>,
    evidence_cap: usize,
) {
    let m = (attention_weight * merge_strength(attention_weight)).clamp(0.1, 1.0);
    let mut blended: Vec<f32> = c
        .embedding
        .iter()
        .zip(intent.iter())
        .map(|(e, i)| (1.0 - m) * e + m * i)
        .collect();
    normalize(&mut blended);
    c.embedding = blended;
    c.total_attention_weight += attention_weight;
    c.push_evidence(
        EvidenceEntry {
            observation_id: observation_id.to_string(),
            attention_weight,
            timestamp: now,
            summary: c.description.clone(),
        },
        evidence_cap,
    );
    c.last_updated = now;
    c.last_activated = now;
}

fn create_component(
    user_id: &str,
    component_type: crate::types::ComponentType,
    obs: &crate::types::Observation,
    intent: &[f32],
    observation_id: &str,
    now: chrono::DateTime<Utc>,
) -> ProfileComponent {
    let attention_weight = obs.attention_weight;
    let activation_threshold = 0.3 + attention_weight.clamp(0.0, 1.0) * 0.5;
    ProfileComponent {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        component_type,
        description: describe(obs),
        embedding: intent.to_vec(),
        confidence: attention_weight,
        total_attention_weight: attention_weight,
        normalized_weight: 0.0,
        priority: Priority::Low,
        activation_threshold,
        supporting_evidence: vec![EvidenceEntry {
            observation_id: observation_id.to_string(),
            attention_weight,
            timestamp: now,
            summary: obs.highlight.clone(),
        }],
        created_at: now,
        last_updated: now,
        last_activated: now,
    }
}

fn describe(obs: &crate::types::Observation) -> String {
    if let Some(topic) = obs.semantic_analysis.topics.first() {
        format!("Interest in {topic}")
    } else {
        obs.highlight.clone()
    }
}

/// Rebalances normalizedWeight/priority across `components` (spec §4.4 step
/// 7). Idempotent: calling twice on the same input yields the same weights.
fn rebalance(components: &mut [ProfileComponent]) {
    let total: f32 = components.iter().map(|c| c.total_attention_weight).sum();
    if total <= 0.0 {
        for c in components.iter_mut() {
            c.normalized_weight = 0.0;
            c.priority = Priority::Low;
        }
        return;
    }
    for c in components.iter_mut() {
        c.normalized_weight = c.total_attention_weight / total;
        c.priority = Priority::from_normalized_weight(c.normalized_weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentType;
    use chrono::Duration;

    fn comp(weight: f32) -> ProfileComponent {
        let now = Utc::now();
        ProfileComponent {
            id: "c1".into(),
            user_id: "u".into(),
            component_type: ComponentType::DomainExpertise,
            description: "d".into(),
            embedding: vec![1.0, 0.0],
            confidence: 0.5,
            total_attention_weight: weight,
            normalized_weight: 0.0,
            priority: Priority::Low,
            activation_threshold: 0.5,
            supporting_evidence: vec![],
            created_at: now - Duration::days(1),
            last_updated: now,
            last_activated: now,
        }
    }

    #[test]
    fn rebalance_sums_to_one() {
        let mut components = vec![comp(1.0), comp(3.0)];
        rebalance(&mut components);
        let sum: f32 = components.iter().map(|c| c.normalized_weight).sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(components[1].priority, Priority::High);
    }

    #[test]
    fn rebalance_is_idempotent() {
        let mut components = vec![comp(1.0), comp(3.0), comp(0.2)];
        rebalance(&mut components);
        let first: Vec<f32> = components.iter().map(|c| c.normalized_weight).collect();
        rebalance(&mut components);
        let second: Vec<f32> = components.iter().map(|c| c.normalized_weight).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn merge_strength_thresholds() {
        assert_eq!(merge_strength(0.9), 1.0);
        assert_eq!(merge_strength(0.7), 0.8);
        assert_eq!(merge_strength(0.5), 0.6);
        assert_eq!(merge_strength(0.1), 0.3);
    }

    #[test]
    fn empty_total_weight_zeros_out() {
        let mut components = vec![comp(0.0)];
        rebalance(&mut components);
        assert_eq!(components[0].normalized_weight, 0.0);
    }
}
