// src/store/journal.rs
// Two-phase write-ahead journal (spec §4.3 `put`): failure is all-or-nothing
// per observation — either every index reflects the new state or none does.
// A pending row is written before the indexes are touched; it's marked
// committed only after all three succeed, so a crash mid-write leaves a
// detectable "pending" row that `recover()` can roll forward or drop.

use crate::error::CoreError;
use sqlx::{Row, SqlitePool};

pub struct Journal<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Journal<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self, observation_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO write_journal (observation_id, status, started_at) VALUES (?, 'pending', ?)",
        )
        .bind(observation_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn commit(&self, observation_id: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE write_journal SET status = 'committed' WHERE observation_id = ?")
            .bind(observation_id)
            .execute(self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn rollback(&self, observation_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM write_journal WHERE observation_id = ?")
            .bind(observation_id)
            .execute(self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    /// Observation ids left in `pending` state, e.g. after a crash, that
    /// need reindexing or dropping on restart.
    pub async fn pending_ids(&self) -> Result<Vec<String>, CoreError> {
        let rows = sqlx::query("SELECT observation_id FROM write_journal WHERE status = 'pending'")
            .fetch_all(self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(rows.iter().map(|r| r.get("observation_id")).collect())
    }
}
