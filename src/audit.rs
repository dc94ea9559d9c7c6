// src/audit.rs
// AuditLog (spec §6, invariant 9): append-only recorder. Every access to an
// observation or profile produces exactly one AuditRecord; rows are never
// updated, matching the warm tier's dead-letter table convention of
// insert-only bookkeeping tables alongside the mutable domain tables.

use crate::error::CoreError;
use crate::types::{AccessKind, AccessResult, AccessorKind, AuditRecord, DataKind};
use sqlx::{Row, SqlitePool};

pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                accessor_id TEXT NOT NULL,
                accessor_kind TEXT NOT NULL,
                data_kind TEXT NOT NULL,
                data_id TEXT NOT NULL,
                access_kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                ip TEXT,
                purpose TEXT,
                result TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn record(&self, record: &AuditRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                user_id, accessor_id, accessor_kind, data_kind, data_id,
                access_kind, timestamp, ip, purpose, result
            ) VALUES (?,?,?,?,?,?,?,?,?,?)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.accessor_id)
        .bind(accessor_kind_str(record.accessor_kind))
        .bind(data_kind_str(record.data_kind))
        .bind(&record.data_id)
        .bind(access_kind_str(record.access_kind))
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.ip)
        .bind(&record.purpose)
        .bind(access_result_str(record.result))
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn for_user(&self, user_id: &str, limit: i64) -> Result<Vec<AuditRecord>, CoreError> {
        let rows = sqlx::query("SELECT * FROM audit_log WHERE user_id = ? ORDER BY id DESC LIMIT ?")
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        rows.iter().map(row_to_record).collect()
    }
}

fn accessor_kind_str(k: AccessorKind) -> &'static str {
    match k {
        AccessorKind::App => "app",
        AccessorKind::Admin => "admin",
        AccessorKind::System => "system",
    }
}

fn data_kind_str(k: DataKind) -> &'static str {
    match k {
        DataKind::Observation => "observation",
        DataKind::Profile => "profile",
        DataKind::Usage => "usage",
    }
}

fn access_kind_str(k: AccessKind) -> &'static str {
    match k {
        AccessKind::Read => "read",
        AccessKind::Write => "write",
        AccessKind::Delete => "delete",
    }
}

fn access_result_str(r: AccessResult) -> &'static str {
    match r {
        AccessResult::Allowed => "allowed",
        AccessResult::Denied => "denied",
        AccessResult::Error => "error",
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord, CoreError> {
    let accessor_kind = match row.get::<String, _>("accessor_kind").as_str() {
        "admin" => AccessorKind::Admin,
        "system" => AccessorKind::System,
        _ => AccessorKind::App,
    };
    let data_kind = match row.get::<String, _>("data_kind").as_str() {
        "profile" => DataKind::Profile,
        "usage" => DataKind::Usage,
        _ => DataKind::Observation,
    };
    let access_kind = match row.get::<String, _>("access_kind").as_str() {
        "write" => AccessKind::Write,
        "delete" => AccessKind::Delete,
        _ => AccessKind::Read,
    };
    let result = match row.get::<String, _>("result").as_str() {
        "denied" => AccessResult::Denied,
        "error" => AccessResult::Error,
        _ => AccessResult::Allowed,
    };
    Ok(AuditRecord {
        user_id: row.get("user_id"),
        accessor_id: row.get("accessor_id"),
        accessor_kind,
        data_kind,
        data_id: row.get("data_id"),
        access_kind,
        timestamp: chrono::DateTime::parse_from_rfc3339(row.get::<String, _>("timestamp").as_str())
            .map(|d| d.with_timezone(&chrono::Utc))
            .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))?,
        ip: row.get("ip"),
        purpose: row.get("purpose"),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_log() -> AuditLog {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let log = AuditLog::new(pool);
        log.migrate().await.unwrap();
        log
    }

    #[tokio::test]
    async fn records_round_trip() {
        let log = test_log().await;
        log.record(&AuditRecord {
            user_id: "u".into(),
            accessor_id: "app-1".into(),
            accessor_kind: AccessorKind::App,
            data_kind: DataKind::Observation,
            data_id: "o1".into(),
            access_kind: AccessKind::Read,
            timestamp: chrono::Utc::now(),
            ip: None,
            purpose: None,
            result: AccessResult::Allowed,
        })
        .await
        .unwrap();
        let records = log.for_user("u", 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data_id, "o1");
    }
}
