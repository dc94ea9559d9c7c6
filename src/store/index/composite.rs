// src/store/index/composite.rs
// Composite index (spec §4.3): sorted on (userId, influenceWeight desc,
// timestamp desc) with secondary filters on tags/source/tier.

use crate::types::{Observation, Tier};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CompositeFilter {
    pub tags_required: Vec<String>,
    pub tags_excluded: Vec<String>,
    pub source: Option<String>,
    pub tiers: Option<Vec<Tier>>,
}

impl CompositeFilter {
    fn matches(&self, obs: &Observation) -> bool {
        if let Some(source) = &self.source {
            if &obs.source != source {
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

#[derive(Default)]
pub struct CompositeIndex {
    by_user: RwLock<HashMap<String, Vec<Observation>>>,
}

impl CompositeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, obs: &Observation) {
        let mut by_user = self.by_user.write();
        let list = by_user.entry(obs.user_id.clone()).or_default();
        list.retain(|o| o.id != obs.id);
        list.push(obs.clone());
        list.sort_by(|a, b| {
            b.influence_weight
                .partial_cmp(&a.influence_weight)
                .unwrap()
                .then(b.timestamp.cmp(&a.timestamp))
        });
    }

    pub fn remove(&self, user_id: &str, observation_id: &str) {
        let mut by_user = self.by_user.write();
        if let Some(list) = by_user.get_mut(user_id) {
            list.retain(|o| o.id != observation_id);
        }
    }

    pub fn query(&self, user_id: &str, filter: &CompositeFilter, limit: usize) -> Vec<Observation> {
        let by_user = self.by_user.read();
        let Some(list) = by_user.get(user_id) else {
            return Vec::new();
        };
        list.iter()
            .filter(|o| filter.matches(o))
            .take(limit)
            .cloned()
            .collect()
    }
}
