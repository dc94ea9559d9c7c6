// src/store/index/vector_qdrant.rs
// Production VectorIndex backed by Qdrant, grounded directly in the
// teacher's QdrantMultiStore (backend/src/memory/storage/qdrant/multi_store.rs):
// same collection-ensure-on-connect pattern, same PointStruct/Filter/
// SearchPointsBuilder usage, generalized from 3 fixed embedding "heads" to
// one collection per observation user scope via a payload filter.

use super::vector::{VectorFilter, VectorIndex, VectorMatch};
use crate::types::{Observation, Tier};
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, Range, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};

pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorIndex {
    pub async fn connect(url: &str, collection: &str, dims: u64) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .context("failed to connect to Qdrant")?;

        let index = Self {
            client,
            collection: collection.to_string(),
        };
        index.ensure_collection(dims).await?;
        Ok(index)
    }

    async fn ensure_collection(&self, dims: u64) -> Result<()> {
        if !self.client.collection_exists(&self.collection).await? {
            info!(collection = %self.collection, "creating qdrant collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dims, Distance::Cosine)),
                )
                .await
                .context("failed to create qdrant collection")?;
        }
        Ok(())
    }

    fn point_id(observation_id: &str) -> PointId {
        observation_id.to_string().into()
    }
}

fn tier_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Hot => "hot",
        Tier::Warm => "warm",
        Tier::Cold => "cold",
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, obs: &Observation) -> Result<()> {
        let mut payload = std::collections::HashMap::new();
        payload.insert("user_id".to_string(), obs.user_id.clone().into());
        payload.insert("influence_weight".to_string(), (obs.influence_weight as f64).into());
        payload.insert("tier".to_string(), tier_str(obs.tier).into());

        let point = PointStruct::new(Self::point_id(&obs.id), obs.embedding.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .context("failed to upsert point to qdrant")?;
        debug!(observation_id = %obs.id, "upserted into qdrant vector index");
        Ok(())
    }

    async fn remove(&self, _user_id: &str, observation_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(vec![Self::point_id(observation_id)])
                    .wait(true),
            )
            .await
            .context("failed to delete point from qdrant")?;
        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let mut conditions = vec![Condition::matches("user_id", user_id.to_string())];
        if let Some(min) = filter.min_influence_weight {
            conditions.push(Condition::range(
                "influence_weight",
                Range {
                    gte: Some(min as f64),
                    ..Default::default()
                },
            ));
        }
        if let Some(tiers) = &filter.tiers {
            let names: Vec<String> = tiers.iter().map(|t| tier_str(*t).to_string()).collect();
            conditions.push(Condition::matches("tier", names));
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query.to_vec(), limit as u64)
                    .filter(Filter::must(conditions))
                    .with_payload(true),
            )
            .await
            .context("failed to search qdrant")?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                let id = match point.id?.point_id_options? {
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u,
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
                };
                Some(VectorMatch {
                    observation_id: id,
                    score: point.score,
                })
            })
            .collect())
    }
}
