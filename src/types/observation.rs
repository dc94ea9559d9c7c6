// src/types/observation.rs
// Observation data model (spec §3). Mirrors the teacher's `MemoryEntry`
// convention (examples/ConaryLabs-Mira/backend/src/memory/core/types.rs) of
// a single flat struct carrying both input and enriched fields, with
// builder-style constructors for the common creation paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Private,
    Public,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub complexity: Option<Complexity>,
}

/// Model-version and degradation bookkeeping dropped from the distilled
/// spec's field list but required by its own determinism contract (§4.6)
/// and backpressure flag (§4.1). See SPEC_FULL.md §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub enrichment_model_version: Option<String>,
    pub enrichment_degraded: bool,
    pub backpressure_applied: bool,
}

/// Raw observation as submitted by a client, before enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub highlight: String,
    pub note: String,
    pub address: String,
    pub tags: Vec<String>,
    pub access: AccessLevel,
}

/// Fully enriched, persisted observation (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub highlight: String,
    pub note: String,
    pub address: String,
    pub tags: Vec<String>,
    pub access: AccessLevel,

    pub enhanced_tags: Vec<String>,
    pub recommended_highlights: Vec<String>,
    pub semantic_analysis: SemanticAnalysis,
    pub embedding: Vec<f32>,
    pub quality_score: f32,
    pub attention_weight: f32,
    pub attention_metrics: super::attention::AttentionMetrics,
    pub influence_weight: f32,
    pub tier: Tier,
    pub content_hash: String,

    pub processing: ProcessingMetadata,
    pub soft_deleted: bool,
}

impl Observation {
    /// Construct from a raw observation plus default (pre-enrichment) values.
    /// Callers fill in the enriched fields as the pipeline progresses.
    pub fn from_raw(raw: RawObservation, content_hash: String) -> Self {
        Self {
            id: raw.id,
            user_id: raw.user_id,
            app_id: raw.app_id,
            timestamp: raw.timestamp,
            source: raw.source,
            highlight: raw.highlight,
            note: raw.note,
            address: raw.address,
            tags: raw.tags,
            access: raw.access,
            enhanced_tags: Vec::new(),
            recommended_highlights: Vec::new(),
            semantic_analysis: SemanticAnalysis::default(),
            embedding: Vec::new(),
            quality_score: 0.0,
            attention_weight: 0.0,
            attention_metrics: super::attention::AttentionMetrics::default(),
            influence_weight: 0.0,
            tier: Tier::Cold,
            content_hash,
            processing: ProcessingMetadata::default(),
            soft_deleted: false,
        }
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_days()
    }
}
