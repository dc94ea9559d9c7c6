// src/attention/cache.rs
// 1-hour attention-score cache keyed by (userId, contentHash) (spec §4.2).
// Uses parking_lot, following the teacher's preference for parking_lot
// locks over std::sync ones throughout backend/src.

use super::scorer::ScoredAttention;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: ScoredAttention,
    inserted_at: Instant,
}

pub struct AttentionCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl AttentionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str, content_hash: &str) -> Option<ScoredAttention> {
        let entries = self.entries.read();
        entries
            .get(&(user_id.to_string(), content_hash.to_string()))
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value)
    }

    pub fn put(&self, user_id: &str, content_hash: &str, value: ScoredAttention) {
        let mut entries = self.entries.write();
        entries.insert(
            (user_id.to_string(), content_hash.to_string()),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        if entries.len() > 100_000 {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttentionMetrics;

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = AttentionCache::new(Duration::from_millis(5));
        cache.put(
            "u",
            "h",
            ScoredAttention {
                weight: 0.5,
                metrics: AttentionMetrics::default(),
            },
        );
        std::thread::sleep(Duration::from_millis(15));
        assert!(cache.get("u", "h").is_none());
    }

    #[test]
    fn fresh_entries_round_trip() {
        let cache = AttentionCache::new(Duration::from_secs(60));
        cache.put(
            "u",
            "h",
            ScoredAttention {
                weight: 0.42,
                metrics: AttentionMetrics::default(),
            },
        );
        assert_eq!(cache.get("u", "h").unwrap().weight, 0.42);
    }
}
