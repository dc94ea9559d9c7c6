// src/types/attention.rs
// AttentionMetrics data carried on each observation (spec §4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionDepth {
    Low,
    Medium,
    High,
}

impl Default for InteractionDepth {
    fn default() -> Self {
        InteractionDepth::Low
    }
}

impl InteractionDepth {
    pub fn multiplier(self) -> f32 {
        match self {
            InteractionDepth::Low => 0.8,
            InteractionDepth::Medium => 1.0,
            InteractionDepth::High => 1.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttentionMetrics {
    pub highlight_frequency: u32,
    pub note_count: u32,
    pub address_revisit: u32,
    pub time_investment_secs: u32,
    pub interaction_depth: InteractionDepth,
}
