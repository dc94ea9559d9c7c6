// src/config/server.rs

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_batch_size: usize,
    pub max_item_bytes: usize,
    /// Bound on in-flight enrichment calls (spec §5 resource policy). Once
    /// saturated, the pipeline switches to degraded mode for new items
    /// rather than queueing unboundedly.
    pub enrichment_queue_capacity: usize,
    pub enrichment_timeout_ms: u64,
    pub storage_write_timeout_ms: u64,
    pub external_model_timeout_ms: u64,
    pub visibility_target_ms: u64,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            max_item_bytes: 64 * 1024,
            enrichment_queue_capacity: 64,
            enrichment_timeout_ms: 2_000,
            storage_write_timeout_ms: 1_000,
            external_model_timeout_ms: 30_000,
            visibility_target_ms: 500,
            log_json: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.max_batch_size = super::env_or_default("HINATA_MAX_BATCH_SIZE", cfg.max_batch_size);
        cfg.log_json = super::env_or_default("HINATA_LOG_JSON", cfg.log_json);
        cfg
    }
}
