// src/config/store.rs

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub sqlite_max_connections: u32,
    pub cold_store_dir: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub enable_vector_index: bool,
    pub enable_full_text_index: bool,
    /// Hot-tier memory budget in bytes (spec §5 resource policy).
    pub hot_tier_budget_bytes: usize,
    pub read_promote_threshold: u32,
    pub read_promote_window_secs: i64,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("HINATA_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite::memory:".to_string()),
            sqlite_max_connections: super::env_or_default("HINATA_SQLITE_MAX_CONNECTIONS", 8),
            cold_store_dir: std::env::var("HINATA_COLD_STORE_DIR")
                .unwrap_or_else(|_| "./data/cold".to_string()),
            qdrant_url: std::env::var("HINATA_QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6334".to_string()),
            qdrant_collection: std::env::var("HINATA_QDRANT_COLLECTION")
                .unwrap_or_else(|_| "observations".to_string()),
            enable_vector_index: super::env_or_default("HINATA_ENABLE_VECTOR_INDEX", true),
            enable_full_text_index: super::env_or_default("HINATA_ENABLE_FULL_TEXT_INDEX", true),
            hot_tier_budget_bytes: super::env_or_default(
                "HINATA_HOT_TIER_BUDGET_BYTES",
                2usize * 1024 * 1024 * 1024,
            ),
            read_promote_threshold: super::env_or_default("HINATA_READ_PROMOTE_THRESHOLD", 3),
            read_promote_window_secs: super::env_or_default("HINATA_READ_PROMOTE_WINDOW_SECS", 3600),
        }
    }
}
