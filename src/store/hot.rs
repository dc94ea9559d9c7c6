// src/store/hot.rs
// Hot tier (spec §4.3): low-latency in-process key-value store, evicted by
// lowest influence weight under budget pressure. Budgeted by approximate
// serialized size, per spec §5's per-process hot tier memory budget.
// Read-through promotion counters live in TieredStore, not here, since
// promotion candidates are by definition not yet present in this store.

use crate::types::Observation;
use parking_lot::RwLock;
use std::collections::HashMap;

struct HotEntry {
    observation: Observation,
    approx_bytes: usize,
}

pub struct HotStore {
    budget_bytes: usize,
    used_bytes: RwLock<usize>,
    entries: RwLock<HashMap<String, HotEntry>>,
}

fn approx_size(obs: &Observation) -> usize {
    obs.highlight.len()
        + obs.note.len()
        + obs.address.len()
        + obs.embedding.len() * 4
        + obs.enhanced_tags.iter().map(|t| t.len()).sum::<usize>()
        + 256 // fixed overhead for scalar fields
}

impl HotStore {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            used_bytes: RwLock::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, observation: Observation) {
        let size = approx_size(&observation);
        let mut entries = self.entries.write();
        let mut used = self.used_bytes.write();

        if let Some(old) = entries.remove(&observation.id) {
            *used = used.saturating_sub(old.approx_bytes);
        }

        while *used + size > self.budget_bytes && !entries.is_empty() {
            // Evict the entry with the lowest influence weight, age as tiebreak.
            let victim = entries
                .iter()
                .min_by(|a, b| {
                    a.1.observation
                        .influence_weight
                        .partial_cmp(&b.1.observation.influence_weight)
                        .unwrap()
                        .then(b.1.observation.timestamp.cmp(&a.1.observation.timestamp))
                })
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                if let Some(removed) = entries.remove(&victim) {
                    *used = used.saturating_sub(removed.approx_bytes);
                }
            } else {
                break;
            }
        }

        entries.insert(
            observation.id.clone(),
            HotEntry {
                observation,
                approx_bytes: size,
            },
        );
        *used += size;
    }

    pub fn get(&self, id: &str) -> Option<Observation> {
        let entries = self.entries.read();
        entries.get(id).map(|e| e.observation.clone())
    }

    pub fn remove(&self, id: &str) {
        let mut entries = self.entries.write();
        if let Some(removed) = entries.remove(id) {
            let mut used = self.used_bytes.write();
            *used = used.saturating_sub(removed.approx_bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessLevel, RawObservation, Tier};
    use chrono::Utc;

    fn obs(id: &str, weight: f32) -> Observation {
        let mut o = Observation::from_raw(
            RawObservation {
                id: id.into(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: Utc::now(),
                source: "notes".into(),
                highlight: "h".into(),
                note: "n".repeat(50),
                address: "addr".into(),
                tags: vec![],
                access: AccessLevel::Private,
            },
            format!("hash-{id}"),
        );
        o.influence_weight = weight;
        o.tier = Tier::Hot;
        o
    }

    #[test]
    fn evicts_lowest_influence_weight_under_budget_pressure() {
        let store = HotStore::new(400);
        store.put(obs("low", 0.1));
        store.put(obs("high", 0.9));
        assert!(store.get("low").is_some() || store.get("high").is_some());
        // Budget is small enough that both can't fit; the high-weight one should survive.
        assert!(store.get("high").is_some());
    }

    #[test]
    fn get_is_repeatable() {
        let store = HotStore::new(1_000_000);
        store.put(obs("o1", 0.5));
        store.get("o1");
        store.get("o1");
        assert!(store.get("o1").is_some());
    }

    #[test]
    fn remove_frees_budget() {
        let store = HotStore::new(1_000_000);
        store.put(obs("o1", 0.5));
        store.remove("o1");
        assert!(store.get("o1").is_none());
    }
}
