// src/store/index/vector.rs
// Vector index (spec §4.3): per-user collection mapping observationId to
// embedding, supporting cosine k-NN with scalar filters. Trait-based so
// tests run against an in-memory brute-force index instead of a live
// Qdrant server, following the teacher's split between `QdrantMultiStore`
// and the `MemoryStore` trait seam it sits behind.

use crate::types::{Observation, Tier};
use crate::vecmath::cosine;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub min_influence_weight: Option<f32>,
    pub tiers: Option<Vec<Tier>>,
}

impl VectorFilter {
    fn matches(&self, obs: &Observation) -> bool {
        if let Some(min) = self.min_influence_weight {
            if obs.influence_weight < min {
                return false;
            }
        }
        if let Some(tiers) = &self.tiers {
            if !tiers.contains(&obs.tier) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub observation_id: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, obs: &Observation) -> anyhow::Result<()>;
    async fn remove(&self, user_id: &str, observation_id: &str) -> anyhow::Result<()>;
    async fn search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
        filter: &VectorFilter,
    ) -> anyhow::Result<Vec<VectorMatch>>;
}

#[derive(Clone)]
struct Entry {
    embedding: Vec<f32>,
    snapshot: Observation,
}

/// Default in-process vector index: exact cosine k-NN over a per-user
/// HashMap. Fine for the data volumes exercised in tests and small
/// deployments; a `qdrant-client`-backed implementation (see module docs)
/// is the production path for larger corpora.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    by_user: RwLock<HashMap<String, HashMap<String, Entry>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, obs: &Observation) -> anyhow::Result<()> {
        let mut by_user = self.by_user.write();
        let user_map = by_user.entry(obs.user_id.clone()).or_default();
        user_map.insert(
            obs.id.clone(),
            Entry {
                embedding: obs.embedding.clone(),
                snapshot: obs.clone(),
            },
        );
        Ok(())
    }

    async fn remove(&self, user_id: &str, observation_id: &str) -> anyhow::Result<()> {
        let mut by_user = self.by_user.write();
        if let Some(user_map) = by_user.get_mut(user_id) {
            user_map.remove(observation_id);
        }
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
        filter: &VectorFilter,
    ) -> anyhow::Result<Vec<VectorMatch>> {
        let by_user = self.by_user.read();
        let Some(user_map) = by_user.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<VectorMatch> = user_map
            .values()
            .filter(|e| filter.matches(&e.snapshot))
            .map(|e| VectorMatch {
                observation_id: e.snapshot.id.clone(),
                score: cosine(query, &e.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(a.observation_id.cmp(&b.observation_id)));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawObservation;
    use crate::types::AccessLevel;
    use chrono::Utc;

    fn obs(id: &str, embedding: Vec<f32>) -> Observation {
        let mut o = Observation::from_raw(
            RawObservation {
                id: id.into(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: Utc::now(),
                source: "notes".into(),
                highlight: "h".into(),
                note: "n".into(),
                address: "addr".into(),
                tags: vec![],
                access: AccessLevel::Private,
            },
            format!("hash-{id}"),
        );
        o.embedding = embedding;
        o
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let index = InMemoryVectorIndex::new();
        index.upsert(&obs("a", crate::vecmath::normalized(vec![1.0, 0.0]))).await.unwrap();
        index.upsert(&obs("b", crate::vecmath::normalized(vec![0.0, 1.0]))).await.unwrap();
        let results = index
            .search("u", &crate::vecmath::normalized(vec![1.0, 0.1]), 2, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(results[0].observation_id, "a");
    }

    #[tokio::test]
    async fn scopes_search_to_user() {
        let index = InMemoryVectorIndex::new();
        let mut other_user = obs("x", crate::vecmath::normalized(vec![1.0, 0.0]));
        other_user.user_id = "other".into();
        index.upsert(&other_user).await.unwrap();
        let results = index
            .search("u", &crate::vecmath::normalized(vec![1.0, 0.0]), 5, &VectorFilter::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
