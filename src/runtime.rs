// src/runtime.rs
// CoreRuntime: the single process-wide object that owns every capability
// handle, constructor-injected (spec §9: "define a single process-wide
// 'core runtime' object that owns all handles so tests can substitute
// in-memory fakes"). Grounded in the teacher's `AppState` (backend/src/
// state.rs): one big struct built once in `new`, wiring shared SqlitePool
// clones and Arc-wrapped services into each other in dependency order.

use crate::config::CoreConfig;
use crate::enrichment::capability::EnrichmentCapability;
use crate::enrichment::fallback::DeterministicFallbackEnrichment;
use crate::enrichment::worker::EnrichmentWorker;
use crate::error::CoreError;
use crate::gateway::capability::{ExternalModelCapability, ProviderOption};
use crate::gateway::fake::EchoModelCapability;
use crate::gateway::ExternalModelGateway;
use crate::keyed_mutex::KeyedMutex;
use crate::pipeline::ObservationPipeline;
use crate::privacy::PrivacyStore;
use crate::profile::{ProfileEngine, ProfileStore, ProfileUpdateEvent};
use crate::prompt::{PromptComposer, PromptComposerConfig};
use crate::ratelimit::AppRateLimiter;
use crate::registry::AppRegistry;
use crate::retriever::Retriever;
use crate::store::index::{InMemoryFullTextIndex, InMemoryVectorIndex};
use crate::store::{FullTextIndex, QdrantVectorIndex, TieredStore, TieredStoreConfig, VectorIndex, WarmStore};
use crate::usage::UsageRecorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PROFILE_UPDATE_QUEUE_CAPACITY: usize = 1024;
const EMBEDDING_DIMS: u64 = 64;

/// Owns every shared handle the crate's entry points need. Construct once
/// per process via [`CoreRuntime::new`]; tests use [`CoreRuntime::for_tests`]
/// to substitute in-memory fakes for Qdrant and the external capabilities.
pub struct CoreRuntime {
    pub config: CoreConfig,
    pub store: Arc<TieredStore>,
    pub profile_engine: Arc<ProfileEngine>,
    pub profile_tx: mpsc::Sender<ProfileUpdateEvent>,
    pub retriever: Arc<Retriever>,
    pub prompt_composer: Arc<PromptComposer>,
    pub prompt_cfg: PromptComposerConfig,
    pub pipeline: Arc<ObservationPipeline>,
    pub gateway: Arc<ExternalModelGateway>,
    pub registry: Arc<AppRegistry>,
    pub audit: Arc<crate::audit::AuditLog>,
    pub usage: Arc<UsageRecorder>,
    pub privacy: Arc<PrivacyStore>,
    pub rate_limiter: Arc<AppRateLimiter>,
    pub locks: Arc<KeyedMutex>,
}

impl CoreRuntime {
    /// Builds the full runtime against real backends: SQLite for every
    /// relational table, Qdrant for the vector index, and the supplied
    /// enrichment/external-model capabilities (typically real provider
    /// clients in production).
    pub async fn new(
        config: CoreConfig,
        enrichment_capability: Arc<dyn EnrichmentCapability>,
        external_model_capability: Arc<dyn ExternalModelCapability>,
        providers: Vec<ProviderOption>,
    ) -> anyhow::Result<Self> {
        let warm = Arc::new(
            WarmStore::connect(&config.store.database_url, config.store.sqlite_max_connections).await?,
        );
        let pool = warm.pool().clone();

        let vector_index: Arc<dyn VectorIndex> = if config.store.enable_vector_index {
            Arc::new(QdrantVectorIndex::connect(&config.store.qdrant_url, &config.store.qdrant_collection, EMBEDDING_DIMS).await?)
        } else {
            Arc::new(InMemoryVectorIndex::new())
        };
        let full_text_index: Arc<dyn FullTextIndex> = Arc::new(InMemoryFullTextIndex::new());

        Self::assemble(config, pool, warm, vector_index, full_text_index, enrichment_capability, external_model_capability, providers).await
    }

    /// In-memory runtime for tests: a single shared SQLite in-memory
    /// connection, in-memory vector/full-text indexes, a deterministic
    /// enrichment fallback, and the echo chat capability.
    pub async fn for_tests() -> anyhow::Result<Self> {
        let mut config = CoreConfig::from_env();
        config.store.database_url = "sqlite::memory:".to_string();
        // A single connection, since separate connections to
        // "sqlite::memory:" are separate, unrelated databases.
        config.store.sqlite_max_connections = 1;
        config.store.cold_store_dir = std::env::temp_dir()
            .join(format!("hinata-core-test-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        config.store.enable_vector_index = false;

        let warm = Arc::new(WarmStore::connect(&config.store.database_url, config.store.sqlite_max_connections).await?);
        let pool = warm.pool().clone();
        let vector_index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let full_text_index: Arc<dyn FullTextIndex> = Arc::new(InMemoryFullTextIndex::new());

        let providers = vec![ProviderOption {
            provider: "fake".to_string(),
            model: "echo".to_string(),
            quality: 0.5,
        }];

        Self::assemble(
            config,
            pool,
            warm,
            vector_index,
            full_text_index,
            Arc::new(DeterministicFallbackEnrichment),
            Arc::new(EchoModelCapability),
            providers,
        )
        .await
    }

    async fn assemble(
        config: CoreConfig,
        pool: sqlx::SqlitePool,
        warm: Arc<WarmStore>,
        vector_index: Arc<dyn VectorIndex>,
        full_text_index: Arc<dyn FullTextIndex>,
        enrichment_capability: Arc<dyn EnrichmentCapability>,
        external_model_capability: Arc<dyn ExternalModelCapability>,
        providers: Vec<ProviderOption>,
    ) -> anyhow::Result<Self> {
        let audit = Arc::new(crate::audit::AuditLog::new(pool.clone()));
        audit.migrate().await.map_err(anyhow::Error::from)?;

        let store = Arc::new(TieredStore::new(
            TieredStoreConfig {
                hot_budget_bytes: config.store.hot_tier_budget_bytes,
                read_promote_threshold: config.store.read_promote_threshold,
                read_promote_window: Duration::from_secs(config.store.read_promote_window_secs.max(0) as u64),
                cold_store_dir: config.store.cold_store_dir.clone(),
            },
            warm,
            vector_index,
            full_text_index,
        ));

        let locks = Arc::new(KeyedMutex::new());

        let profiles = ProfileStore::new(pool.clone());
        profiles.migrate().await.map_err(anyhow::Error::from)?;

        let retriever = Arc::new(Retriever::new(store.clone(), audit.clone()));

        let profile_engine = Arc::new(
            ProfileEngine::new(store.clone(), profiles, config.scoring.clone(), audit.clone())
                .with_retriever(retriever.clone()),
        );
        let profile_tx = profile_engine.clone().spawn_worker(PROFILE_UPDATE_QUEUE_CAPACITY);

        let enrichment = Arc::new(EnrichmentWorker::new(
            enrichment_capability,
            Duration::from_millis(config.server.enrichment_timeout_ms),
        ));

        let pipeline = Arc::new(ObservationPipeline::new(
            store.clone(),
            enrichment,
            config.scoring.clone(),
            config.server.clone(),
            locks.clone(),
            profile_tx.clone(),
            audit.clone(),
        ));

        let prompt_cfg = PromptComposerConfig::from(&config.prompt);
        let prompt_composer = Arc::new(PromptComposer::new(store.clone(), retriever.clone()));

        let registry = Arc::new(AppRegistry::new(pool.clone()));
        registry.migrate().await.map_err(anyhow::Error::from)?;

        let usage = Arc::new(UsageRecorder::new(pool.clone(), audit.clone()));
        usage.migrate().await.map_err(anyhow::Error::from)?;

        let privacy = Arc::new(PrivacyStore::new(pool.clone()));
        privacy.migrate().await.map_err(anyhow::Error::from)?;

        let rate_limiter = Arc::new(AppRateLimiter::new());

        let gateway = Arc::new(ExternalModelGateway::new(
            prompt_composer.clone(),
            PromptComposerConfig::from(&config.prompt),
            external_model_capability,
            usage.clone(),
            pipeline.clone(),
            providers,
            privacy.clone(),
            rate_limiter.clone(),
            audit.clone(),
        ));

        Ok(Self {
            config,
            store,
            profile_engine,
            profile_tx,
            retriever,
            prompt_composer,
            prompt_cfg,
            pipeline,
            gateway,
            registry,
            audit,
            usage,
            privacy,
            rate_limiter,
            locks,
        })
    }

    /// Runs one bounded pass of tier migration (spec §4.3 `migrate`). A
    /// deployment schedules this on an interval; tests call it directly.
    pub async fn run_migration_pass(&self, batch_size: i64) -> Result<usize, CoreError> {
        self.store.migrate(&self.config.scoring, batch_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn for_tests_runtime_assembles_without_error() {
        let runtime = CoreRuntime::for_tests().await.unwrap();
        assert!(Arc::strong_count(&runtime.store) >= 1);
    }
}
