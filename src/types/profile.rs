// src/types/profile.rs
// ProfileComponent / UserProfile data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentType {
    CommunicationStyle,
    DomainExpertise,
    PriorityFocus,
    CognitivePattern,
    ValueSystem,
    ContextPreference,
    LearningPattern,
}

impl ComponentType {
    pub const ALL: [ComponentType; 7] = [
        ComponentType::CommunicationStyle,
        ComponentType::DomainExpertise,
        ComponentType::PriorityFocus,
        ComponentType::CognitivePattern,
        ComponentType::ValueSystem,
        ComponentType::ContextPreference,
        ComponentType::LearningPattern,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Fixed thresholds from spec §3 invariants.
    pub fn from_normalized_weight(weight: f32) -> Self {
        if weight > 0.15 {
            Priority::High
        } else if weight > 0.08 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub observation_id: String,
    pub attention_weight: f32,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileComponent {
    pub id: String,
    pub user_id: String,
    pub component_type: ComponentType,
    pub description: String,
    pub embedding: Vec<f32>,
    pub confidence: f32,
    pub total_attention_weight: f32,
    pub normalized_weight: f32,
    pub priority: Priority,
    pub activation_threshold: f32,
    pub supporting_evidence: Vec<EvidenceEntry>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_activated: DateTime<Utc>,
}

impl ProfileComponent {
    pub fn push_evidence(&mut self, entry: EvidenceEntry, cap: usize) {
        self.supporting_evidence.push(entry);
        while self.supporting_evidence.len() > cap {
            self.supporting_evidence.remove(0);
        }
    }

    /// One-line rule string used when serializing into a composed prompt
    /// (spec §4.5 compression rule).
    pub fn as_rule_string(&self) -> String {
        format!(
            "[{:?}] {} (confidence {:.2})",
            self.component_type, self.description, self.confidence
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub components: Vec<ProfileComponent>,
    pub last_updated: DateTime<Utc>,
    pub total_components: usize,
    pub active_component_ids: Vec<String>,
}

impl UserProfile {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            components: Vec::new(),
            last_updated: Utc::now(),
            total_components: 0,
            active_component_ids: Vec::new(),
        }
    }
}
