// src/config/scoring.rs
// Configurable source-trust table and scoring constants. Resolves the
// "source trust" open question from spec §9: a configurable table with
// documented defaults, rather than guessing at the source's undocumented one.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Per-source trust weight used in quality scoring (spec §4.1 step 6).
    /// Unknown sources fall back to `default_source_trust`.
    pub source_trust: HashMap<String, f32>,
    pub default_source_trust: f32,
    /// Observation-count / similarity-threshold window for the attention
    /// scorer (spec §4.2).
    pub attention_window_days: i64,
    pub attention_cache_ttl_secs: i64,
    /// Hot/warm/cold boundaries (spec §4.1 step 8).
    pub hot_age_days: i64,
    pub hot_influence_floor: f32,
    pub warm_age_days: i64,
    pub warm_influence_floor: f32,
    /// Profile match/merge thresholds (spec §4.4).
    pub merge_similarity_threshold: f32,
    pub evidence_cap: usize,
    pub eviction_weight_floor: f32,
    pub eviction_grace_days: i64,
    /// Idempotency window (spec §4.1 step 3).
    pub dedup_window_hours: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut source_trust = HashMap::new();
        source_trust.insert("__chat".to_string(), 0.9);
        source_trust.insert("notes".to_string(), 0.7);
        source_trust.insert("browser".to_string(), 0.5);
        Self {
            source_trust,
            default_source_trust: 0.5,
            attention_window_days: 30,
            attention_cache_ttl_secs: 3600,
            hot_age_days: 7,
            hot_influence_floor: 0.7,
            warm_age_days: 30,
            warm_influence_floor: 0.3,
            merge_similarity_threshold: 0.7,
            evidence_cap: 50,
            eviction_weight_floor: 0.01,
            eviction_grace_days: 14,
            dedup_window_hours: 24,
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.default_source_trust = super::env_or_default(
            "HINATA_DEFAULT_SOURCE_TRUST",
            cfg.default_source_trust,
        );
        cfg.attention_window_days =
            super::env_or_default("HINATA_ATTENTION_WINDOW_DAYS", cfg.attention_window_days);
        cfg.merge_similarity_threshold = super::env_or_default(
            "HINATA_MERGE_SIMILARITY_THRESHOLD",
            cfg.merge_similarity_threshold,
        );
        cfg
    }

    pub fn trust_for(&self, source: &str) -> f32 {
        self.source_trust
            .get(source)
            .copied()
            .unwrap_or(self.default_source_trust)
    }
}
