// src/config/mod.rs
// Central configuration for the hinata-core backend, composed of domain
// configs the way the teacher's `MiraConfig` composes `llm`/`memory`/`server`
// sub-configs (examples/ConaryLabs-Mira/backend/src/config/mod.rs).

pub mod prompt;
pub mod scoring;
pub mod server;
pub mod store;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref CONFIG: CoreConfig = CoreConfig::from_env();
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub scoring: scoring::ScoringConfig,
    pub store: store::StoreConfig,
    pub prompt: prompt::PromptConfig,
    pub server: server::ServerConfig,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            scoring: scoring::ScoringConfig::from_env(),
            store: store::StoreConfig::from_env(),
            prompt: prompt::PromptConfig::from_env(),
            server: server::ServerConfig::from_env(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) use env_or as env_or_default;
