// src/privacy.rs
// PrivacyStore (spec §4.8 step 1 "check ... user privacy preferences", spec
// §3 PrivacyPreferences): persisted per-user preferences, following
// ProfileStore's single-row-per-user sqlx pattern (profile/store.rs).

use crate::error::CoreError;
use crate::types::{ConsentFlags, PolicyLevel, PrivacyPreferences};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

pub struct PrivacyStore {
    pool: SqlitePool,
}

impl PrivacyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS privacy_preferences (
                user_id TEXT PRIMARY KEY,
                policy_level TEXT NOT NULL,
                consent TEXT NOT NULL,
                retention_days INTEGER NOT NULL,
                allow_app_ids TEXT NOT NULL,
                block_app_ids TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    /// Loads `user_id`'s preferences, returning a permissive default row
    /// (never persisted) when none exists yet.
    pub async fn load(&self, user_id: &str) -> Result<PrivacyPreferences, CoreError> {
        let row = sqlx::query("SELECT * FROM privacy_preferences WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        match row {
            Some(row) => row_to_preferences(&row),
            None => Ok(PrivacyPreferences::default_for(user_id)),
        }
    }

    pub async fn save(&self, prefs: &PrivacyPreferences) -> Result<(), CoreError> {
        let consent = serde_json::to_string(&prefs.consent).unwrap();
        let allow: Vec<&String> = prefs.allow_app_ids.iter().collect();
        let block: Vec<&String> = prefs.block_app_ids.iter().collect();
        sqlx::query(
            r#"
            INSERT INTO privacy_preferences (
                user_id, policy_level, consent, retention_days, allow_app_ids, block_app_ids
            ) VALUES (?,?,?,?,?,?)
            ON CONFLICT(user_id) DO UPDATE SET
                policy_level = excluded.policy_level,
                consent = excluded.consent,
                retention_days = excluded.retention_days,
                allow_app_ids = excluded.allow_app_ids,
                block_app_ids = excluded.block_app_ids
            "#,
        )
        .bind(&prefs.user_id)
        .bind(policy_level_str(prefs.policy_level))
        .bind(consent)
        .bind(prefs.retention_days)
        .bind(serde_json::to_string(&allow).unwrap())
        .bind(serde_json::to_string(&block).unwrap())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }
}

fn policy_level_str(p: PolicyLevel) -> &'static str {
    match p {
        PolicyLevel::Strict => "strict",
        PolicyLevel::Balanced => "balanced",
        PolicyLevel::Permissive => "permissive",
    }
}

fn policy_level_from_str(s: &str) -> PolicyLevel {
    match s {
        "strict" => PolicyLevel::Strict,
        "permissive" => PolicyLevel::Permissive,
        _ => PolicyLevel::Balanced,
    }
}

fn row_to_preferences(row: &sqlx::sqlite::SqliteRow) -> Result<PrivacyPreferences, CoreError> {
    let consent: ConsentFlags =
        serde_json::from_str(row.get::<String, _>("consent").as_str()).unwrap_or_default();
    let allow: Vec<String> =
        serde_json::from_str(row.get::<String, _>("allow_app_ids").as_str()).unwrap_or_default();
    let block: Vec<String> =
        serde_json::from_str(row.get::<String, _>("block_app_ids").as_str()).unwrap_or_default();
    Ok(PrivacyPreferences {
        user_id: row.get("user_id"),
        policy_level: policy_level_from_str(row.get::<String, _>("policy_level").as_str()),
        consent,
        retention_days: row.get("retention_days"),
        allow_app_ids: allow.into_iter().collect::<HashSet<_>>(),
        block_app_ids: block.into_iter().collect::<HashSet<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> PrivacyStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = PrivacyStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_user_gets_permissive_default() {
        let store = test_store().await;
        let prefs = store.load("u").await.unwrap();
        assert!(prefs.permits_app("any-app"));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_block_list() {
        let store = test_store().await;
        let mut prefs = PrivacyPreferences::default_for("u");
        prefs.block_app_ids.insert("bad-app".to_string());
        store.save(&prefs).await.unwrap();

        let loaded = store.load("u").await.unwrap();
        assert!(!loaded.permits_app("bad-app"));
        assert!(loaded.permits_app("other-app"));
    }
}
