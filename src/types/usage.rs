// src/types/usage.rs
// UsageRecord [NEW] (SPEC_FULL.md §3), grounded in the teacher's
// BudgetTracker/BudgetUsage pair (backend/src/budget/mod.rs), generalized
// from "LLM API cost" to per-user-per-app-per-day usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub app_id: String,
    pub day: chrono::NaiveDate,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub cache_hit: bool,
    pub routing_decision: String,
    pub failed: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UsageSummary {
    pub total_cost_usd: f64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub request_count: u64,
    pub failed_count: u64,
}
