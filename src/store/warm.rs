// src/store/warm.rs
// Warm tier (spec §4.3): transactional record store, primary table of full
// observations with JSON columns for enriched structures; dead-letter table
// for permanently-failed writes (spec §6 persisted layout). Grounded in the
// teacher's sqlx-over-SQLite pattern (backend/src/memory/storage/sqlite).

use crate::error::CoreError;
use crate::types::{AccessLevel, Observation, ProcessingMetadata, SemanticAnalysis, Tier};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct WarmStore {
    pool: SqlitePool,
}

impl WarmStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                app_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                source TEXT NOT NULL,
                highlight TEXT NOT NULL,
                note TEXT NOT NULL,
                address TEXT NOT NULL,
                tags TEXT NOT NULL,
                access TEXT NOT NULL,
                enhanced_tags TEXT NOT NULL,
                recommended_highlights TEXT NOT NULL,
                semantic_analysis TEXT NOT NULL,
                embedding TEXT NOT NULL,
                quality_score REAL NOT NULL,
                attention_weight REAL NOT NULL,
                attention_metrics TEXT NOT NULL,
                influence_weight REAL NOT NULL,
                tier TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                processing TEXT NOT NULL,
                soft_deleted INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_obs_user_ts ON observations(user_id, timestamp DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_obs_user_influence ON observations(user_id, influence_weight DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_obs_user_source ON observations(user_id, source)")
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_obs_user_hash ON observations(user_id, content_hash)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observation_dead_letter (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                error TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS write_journal (
                observation_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        Ok(())
    }

    pub async fn upsert(&self, obs: &Observation) -> Result<(), CoreError> {
        let tags = serde_json::to_string(&obs.tags).unwrap();
        let enhanced_tags = serde_json::to_string(&obs.enhanced_tags).unwrap();
        let recommended = serde_json::to_string(&obs.recommended_highlights).unwrap();
        let semantic = serde_json::to_string(&obs.semantic_analysis).unwrap();
        let embedding = serde_json::to_string(&obs.embedding).unwrap();
        let metrics = serde_json::to_string(&obs.attention_metrics).unwrap();
        let processing = serde_json::to_string(&obs.processing).unwrap();
        let access = access_str(obs.access);
        let tier = tier_str(obs.tier);

        sqlx::query(
            r#"
            INSERT INTO observations (
                id, user_id, app_id, timestamp, source, highlight, note, address, tags, access,
                enhanced_tags, recommended_highlights, semantic_analysis, embedding,
                quality_score, attention_weight, attention_metrics, influence_weight, tier,
                content_hash, processing, soft_deleted
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
            ON CONFLICT(id) DO UPDATE SET
                tier = excluded.tier,
                influence_weight = excluded.influence_weight,
                processing = excluded.processing,
                soft_deleted = excluded.soft_deleted
            "#,
        )
        .bind(&obs.id)
        .bind(&obs.user_id)
        .bind(&obs.app_id)
        .bind(obs.timestamp.to_rfc3339())
        .bind(&obs.source)
        .bind(&obs.highlight)
        .bind(&obs.note)
        .bind(&obs.address)
        .bind(tags)
        .bind(access)
        .bind(enhanced_tags)
        .bind(recommended)
        .bind(semantic)
        .bind(embedding)
        .bind(obs.quality_score)
        .bind(obs.attention_weight)
        .bind(metrics)
        .bind(obs.influence_weight)
        .bind(tier)
        .bind(&obs.content_hash)
        .bind(processing)
        .bind(obs.soft_deleted as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Observation>, CoreError> {
        let row = sqlx::query("SELECT * FROM observations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        row.map(|r| row_to_observation(&r)).transpose()
    }

    pub async fn find_by_content_hash(
        &self,
        user_id: &str,
        content_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Observation>, CoreError> {
        let row = sqlx::query(
            "SELECT * FROM observations WHERE user_id = ? AND content_hash = ? AND timestamp >= ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(content_hash)
        .bind(since.to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        row.map(|r| row_to_observation(&r)).transpose()
    }

    pub async fn recent_for_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Observation>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM observations WHERE user_id = ? AND timestamp >= ? AND soft_deleted = 0 ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(since.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        rows.iter().map(row_to_observation).collect()
    }

    pub async fn update_tier_and_weight(
        &self,
        id: &str,
        tier: Tier,
        influence_weight: f32,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE observations SET tier = ?, influence_weight = ? WHERE id = ?")
            .bind(tier_str(tier))
            .bind(influence_weight)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn soft_delete(&self, id: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE observations SET soft_deleted = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    /// Distinct users with at least one observation, for administrative
    /// sweeps (tier migration batches, invariant checks) that operate
    /// per-user.
    pub async fn distinct_user_ids(&self) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT DISTINCT user_id FROM observations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    pub async fn candidates_for_migration(&self, limit: i64) -> Result<Vec<Observation>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM observations WHERE soft_deleted = 0 ORDER BY timestamp ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        rows.iter().map(row_to_observation).collect()
    }

    pub async fn write_dead_letter(&self, id: &str, payload: &str, error: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO observation_dead_letter (id, payload, error, timestamp) VALUES (?,?,?,?)",
        )
        .bind(id)
        .bind(payload)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }
}

fn access_str(access: AccessLevel) -> &'static str {
    match access {
        AccessLevel::Private => "private",
        AccessLevel::Public => "public",
        AccessLevel::Restricted => "restricted",
    }
}

fn access_from_str(s: &str) -> AccessLevel {
    match s {
        "public" => AccessLevel::Public,
        "restricted" => AccessLevel::Restricted,
        _ => AccessLevel::Private,
    }
}

fn tier_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Hot => "hot",
        Tier::Warm => "warm",
        Tier::Cold => "cold",
    }
}

fn tier_from_str(s: &str) -> Tier {
    match s {
        "hot" => Tier::Hot,
        "cold" => Tier::Cold,
        _ => Tier::Warm,
    }
}

fn row_to_observation(row: &sqlx::sqlite::SqliteRow) -> Result<Observation, CoreError> {
    let tags: Vec<String> =
        serde_json::from_str(row.get::<String, _>("tags").as_str()).unwrap_or_default();
    let enhanced_tags: Vec<String> =
        serde_json::from_str(row.get::<String, _>("enhanced_tags").as_str()).unwrap_or_default();
    let recommended_highlights: Vec<String> =
        serde_json::from_str(row.get::<String, _>("recommended_highlights").as_str()).unwrap_or_default();
    let semantic_analysis: SemanticAnalysis =
        serde_json::from_str(row.get::<String, _>("semantic_analysis").as_str()).unwrap_or_default();
    let embedding: Vec<f32> =
        serde_json::from_str(row.get::<String, _>("embedding").as_str()).unwrap_or_default();
    let attention_metrics =
        serde_json::from_str(row.get::<String, _>("attention_metrics").as_str()).unwrap_or_default();
    let processing: ProcessingMetadata =
        serde_json::from_str(row.get::<String, _>("processing").as_str()).unwrap_or_default();
    let timestamp = DateTime::parse_from_rfc3339(row.get::<String, _>("timestamp").as_str())
        .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?
        .with_timezone(&Utc);

    Ok(Observation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        app_id: row.get("app_id"),
        timestamp,
        source: row.get("source"),
        highlight: row.get("highlight"),
        note: row.get("note"),
        address: row.get("address"),
        tags,
        access: access_from_str(row.get::<String, _>("access").as_str()),
        enhanced_tags,
        recommended_highlights,
        semantic_analysis,
        embedding,
        quality_score: row.get("quality_score"),
        attention_weight: row.get("attention_weight"),
        attention_metrics,
        influence_weight: row.get("influence_weight"),
        tier: tier_from_str(row.get::<String, _>("tier").as_str()),
        content_hash: row.get("content_hash"),
        processing,
        soft_deleted: row.get::<i64, _>("soft_deleted") != 0,
    })
}
