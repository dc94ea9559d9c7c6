// src/usage.rs
// UsageRecorder (spec §6 getUsage, §4.8 step 5): persists one UsageRecord
// per chat invocation and rolls them up into a UsageSummary. Grounded in
// the teacher's BudgetTracker (backend/src/budget/mod.rs), generalized from
// a single running total to per-user-per-app-per-day rows a caller can
// filter and sum.

use crate::audit::AuditLog;
use crate::error::CoreError;
use crate::types::{AccessKind, AccessResult, AccessorKind, AuditRecord, DataKind, UsageRecord, UsageSummary};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const USAGE_READ_ACCESSOR: &str = "usage-recorder";

#[derive(Debug, Clone, Default)]
pub struct UsageFilter {
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub since: Option<chrono::NaiveDate>,
}

pub struct UsageRecorder {
    pool: SqlitePool,
    audit: Arc<AuditLog>,
}

impl UsageRecorder {
    pub fn new(pool: SqlitePool, audit: Arc<AuditLog>) -> Self {
        Self { pool, audit }
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                app_id TEXT NOT NULL,
                day TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                cost_usd REAL NOT NULL,
                cache_hit INTEGER NOT NULL,
                routing_decision TEXT NOT NULL,
                failed INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn record(&self, r: &UsageRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                user_id, app_id, day, provider, model, prompt_tokens,
                completion_tokens, cost_usd, cache_hit, routing_decision, failed, timestamp
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?)
            "#,
        )
        .bind(&r.user_id)
        .bind(&r.app_id)
        .bind(r.day.to_string())
        .bind(&r.provider)
        .bind(&r.model)
        .bind(r.prompt_tokens as i64)
        .bind(r.completion_tokens as i64)
        .bind(r.cost_usd)
        .bind(r.cache_hit)
        .bind(&r.routing_decision)
        .bind(r.failed)
        .bind(r.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn summarize(&self, filter: &UsageFilter) -> Result<UsageSummary, CoreError> {
        let mut query = String::from("SELECT * FROM usage_records WHERE 1=1");
        if filter.user_id.is_some() {
            query.push_str(" AND user_id = ?");
        }
        if filter.app_id.is_some() {
            query.push_str(" AND app_id = ?");
        }
        if filter.since.is_some() {
            query.push_str(" AND day >= ?");
        }

        let mut q = sqlx::query(&query);
        if let Some(u) = &filter.user_id {
            q = q.bind(u);
        }
        if let Some(a) = &filter.app_id {
            q = q.bind(a);
        }
        if let Some(s) = &filter.since {
            q = q.bind(s.to_string());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        let mut summary = UsageSummary::default();
        for row in &rows {
            summary.total_cost_usd += row.get::<f64, _>("cost_usd");
            summary.total_prompt_tokens += row.get::<i64, _>("prompt_tokens") as u64;
            summary.total_completion_tokens += row.get::<i64, _>("completion_tokens") as u64;
            summary.request_count += 1;
            if row.get::<i64, _>("failed") != 0 {
                summary.failed_count += 1;
            }
        }

        self.audit
            .record(&AuditRecord {
                user_id: filter.user_id.clone().unwrap_or_default(),
                accessor_id: filter.app_id.clone().unwrap_or_else(|| USAGE_READ_ACCESSOR.to_string()),
                accessor_kind: AccessorKind::System,
                data_kind: DataKind::Usage,
                data_id: filter.user_id.clone().unwrap_or_else(|| "*".to_string()),
                access_kind: AccessKind::Read,
                timestamp: chrono::Utc::now(),
                ip: None,
                purpose: None,
                result: AccessResult::Allowed,
            })
            .await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    fn record(user_id: &str, cost: f64, failed: bool) -> UsageRecord {
        UsageRecord {
            user_id: user_id.into(),
            app_id: "a".into(),
            day: chrono::Utc::now().date_naive(),
            provider: "anthropic".into(),
            model: "sonnet".into(),
            prompt_tokens: 100,
            completion_tokens: 50,
            cost_usd: cost,
            cache_hit: false,
            routing_decision: "auto:anthropic/sonnet".into(),
            failed,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn summary_sums_cost_and_counts_failures() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let audit = Arc::new(crate::audit::AuditLog::new(pool.clone()));
        audit.migrate().await.unwrap();
        let recorder = UsageRecorder::new(pool, audit);
        recorder.migrate().await.unwrap();
        recorder.record(&record("u", 0.01, false)).await.unwrap();
        recorder.record(&record("u", 0.0, true)).await.unwrap();
        recorder.record(&record("other", 5.0, false)).await.unwrap();

        let summary = recorder
            .summarize(&UsageFilter { user_id: Some("u".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(summary.request_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert!((summary.total_cost_usd - 0.01).abs() < 1e-9);
    }
}
