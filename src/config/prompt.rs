// src/config/prompt.rs

#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Target token budget T (spec §4.5). Configurable per deployment.
    pub default_token_budget: usize,
    pub core_memory_share: f32,
    pub working_memory_share: f32,
    pub context_memory_share: f32,
    pub buffer_memory_share: f32,
    pub context_top_m: usize,
    pub buffer_window_minutes: i64,
    pub working_memory_recent_hours: i64,
    pub min_influence_for_context: f32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            default_token_budget: 50_000,
            core_memory_share: 0.20,
            working_memory_share: 0.40,
            context_memory_share: 0.30,
            buffer_memory_share: 0.10,
            context_top_m: 10,
            buffer_window_minutes: 10,
            working_memory_recent_hours: 24,
            min_influence_for_context: 0.2,
        }
    }
}

impl PromptConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.default_token_budget =
            super::env_or_default("HINATA_DEFAULT_TOKEN_BUDGET", cfg.default_token_budget);
        cfg
    }
}
