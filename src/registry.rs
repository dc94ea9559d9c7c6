// src/registry.rs
// AppRegistry (spec §6 registerApp): issues and verifies per-app API keys.
// Keys are hashed at rest with sha2, mirroring the content-hash idempotency
// approach used for observations, so a leaked database dump never exposes
// usable credentials.

use crate::error::CoreError;
use crate::types::{AppRegistration, NewAppCredentials};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct AppRegistry {
    pool: SqlitePool,
}

impl AppRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_registrations (
                app_id TEXT PRIMARY KEY,
                api_key_hash TEXT NOT NULL,
                permissions TEXT NOT NULL,
                rate_limit_per_minute INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                is_active INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    /// Registers a new app, returning the one-time plaintext API key
    /// alongside its permissions and rate limit (spec §6 `registerApp`).
    /// The plaintext key is never persisted; only its hash is.
    pub async fn register(
        &self,
        permissions: Vec<String>,
        rate_limit_per_minute: u32,
    ) -> Result<NewAppCredentials, CoreError> {
        let app_id = Uuid::new_v4().to_string();
        let api_key = format!("hnk_{}", Uuid::new_v4().simple());
        let api_key_hash = hash_key(&api_key);

        sqlx::query(
            r#"
            INSERT INTO app_registrations (app_id, api_key_hash, permissions, rate_limit_per_minute, created_at, is_active)
            VALUES (?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(&app_id)
        .bind(&api_key_hash)
        .bind(permissions.join(","))
        .bind(rate_limit_per_minute)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        Ok(NewAppCredentials { app_id, api_key, permissions, rate_limit_per_minute })
    }

    /// Rotates `app_id`'s API key, returning the new plaintext key.
    pub async fn rotate_key(&self, app_id: &str) -> Result<String, CoreError> {
        let api_key = format!("hnk_{}", Uuid::new_v4().simple());
        let api_key_hash = hash_key(&api_key);
        let result = sqlx::query("UPDATE app_registrations SET api_key_hash = ? WHERE app_id = ?")
            .bind(&api_key_hash)
            .bind(app_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Validation { item_id: app_id.to_string(), reason: "unknown app".into() });
        }
        Ok(api_key)
    }

    /// Verifies a bearer token against the stored hash for `app_id`,
    /// returning the registration if the key matches and the app is active.
    pub async fn verify(&self, app_id: &str, api_key: &str) -> Result<Option<AppRegistration>, CoreError> {
        let row = sqlx::query("SELECT * FROM app_registrations WHERE app_id = ?")
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let reg = row_to_registration(&row);
        if !reg.is_active || reg.api_key_hash != hash_key(api_key) {
            return Ok(None);
        }
        Ok(Some(reg))
    }

    pub async fn deactivate(&self, app_id: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE app_registrations SET is_active = 0 WHERE app_id = ?")
            .bind(app_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }
}

fn hash_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn row_to_registration(row: &sqlx::sqlite::SqliteRow) -> AppRegistration {
    let permissions: Vec<String> = row
        .get::<String, _>("permissions")
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    AppRegistration {
        app_id: row.get("app_id"),
        api_key_hash: row.get("api_key_hash"),
        permissions,
        rate_limit_per_minute: row.get::<i64, _>("rate_limit_per_minute") as u32,
        created_at: chrono::DateTime::parse_from_rfc3339(row.get::<String, _>("created_at").as_str())
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        is_active: row.get::<i64, _>("is_active") != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_registry() -> AppRegistry {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let registry = AppRegistry::new(pool);
        registry.migrate().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn register_then_verify_round_trips() {
        let registry = test_registry().await;
        let creds = registry.register(vec!["observation:write".into()], 60).await.unwrap();
        let verified = registry.verify(&creds.app_id, &creds.api_key).await.unwrap();
        assert!(verified.is_some());
        assert!(registry.verify(&creds.app_id, "wrong-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deactivated_app_fails_verification() {
        let registry = test_registry().await;
        let creds = registry.register(vec![], 60).await.unwrap();
        registry.deactivate(&creds.app_id).await.unwrap();
        assert!(registry.verify(&creds.app_id, &creds.api_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotate_key_invalidates_old_key() {
        let registry = test_registry().await;
        let creds = registry.register(vec![], 60).await.unwrap();
        let new_key = registry.rotate_key(&creds.app_id).await.unwrap();
        assert!(registry.verify(&creds.app_id, &creds.api_key).await.unwrap().is_none());
        assert!(registry.verify(&creds.app_id, &new_key).await.unwrap().is_some());
    }
}
