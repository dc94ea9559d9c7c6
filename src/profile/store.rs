// src/profile/store.rs
// Persisted ProfileComponent rows (spec §6): composite key (userId,
// componentId), sharing the warm tier's SqlitePool. Rebalance rewrites a
// user's full component set in one transaction, mirroring the teacher's
// pattern of committing a user's derived state as a single unit rather than
// diffing individual rows.

use crate::error::CoreError;
use crate::types::{ComponentType, EvidenceEntry, Priority, ProfileComponent};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profile_components (
                user_id TEXT NOT NULL,
                component_id TEXT NOT NULL,
                component_type TEXT NOT NULL,
                description TEXT NOT NULL,
                embedding TEXT NOT NULL,
                confidence REAL NOT NULL,
                total_attention_weight REAL NOT NULL,
                normalized_weight REAL NOT NULL,
                priority TEXT NOT NULL,
                activation_threshold REAL NOT NULL,
                supporting_evidence TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                last_activated TEXT NOT NULL,
                PRIMARY KEY (user_id, component_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }

    pub async fn load(&self, user_id: &str) -> Result<Vec<ProfileComponent>, CoreError> {
        let rows = sqlx::query("SELECT * FROM profile_components WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        rows.iter().map(row_to_component).collect()
    }

    /// Atomically replaces the full component set for `user_id` (spec §4.4
    /// step 9: "atomic update of UserProfile and affected component rows").
    pub async fn replace(&self, user_id: &str, components: &[ProfileComponent]) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        sqlx::query("DELETE FROM profile_components WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        for c in components {
            let embedding = serde_json::to_string(&c.embedding).unwrap();
            let evidence = serde_json::to_string(&c.supporting_evidence).unwrap();
            sqlx::query(
                r#"
                INSERT INTO profile_components (
                    user_id, component_id, component_type, description, embedding,
                    confidence, total_attention_weight, normalized_weight, priority,
                    activation_threshold, supporting_evidence, created_at, last_updated, last_activated
                ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)
                "#,
            )
            .bind(&c.user_id)
            .bind(&c.id)
            .bind(component_type_str(c.component_type))
            .bind(&c.description)
            .bind(embedding)
            .bind(c.confidence)
            .bind(c.total_attention_weight)
            .bind(c.normalized_weight)
            .bind(priority_str(c.priority))
            .bind(c.activation_threshold)
            .bind(evidence)
            .bind(c.created_at.to_rfc3339())
            .bind(c.last_updated.to_rfc3339())
            .bind(c.last_activated.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        Ok(())
    }
}

fn component_type_str(t: ComponentType) -> &'static str {
    match t {
        ComponentType::CommunicationStyle => "communicationStyle",
        ComponentType::DomainExpertise => "domainExpertise",
        ComponentType::PriorityFocus => "priorityFocus",
        ComponentType::CognitivePattern => "cognitivePattern",
        ComponentType::ValueSystem => "valueSystem",
        ComponentType::ContextPreference => "contextPreference",
        ComponentType::LearningPattern => "learningPattern",
    }
}

fn component_type_from_str(s: &str) -> ComponentType {
    match s {
        "communicationStyle" => ComponentType::CommunicationStyle,
        "priorityFocus" => ComponentType::PriorityFocus,
        "cognitivePattern" => ComponentType::CognitivePattern,
        "valueSystem" => ComponentType::ValueSystem,
        "contextPreference" => ComponentType::ContextPreference,
        "learningPattern" => ComponentType::LearningPattern,
        _ => ComponentType::DomainExpertise,
    }
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::High => "high",
        Priority::Medium => "medium",
        Priority::Low => "low",
    }
}

fn priority_from_str(s: &str) -> Priority {
    match s {
        "high" => Priority::High,
        "medium" => Priority::Medium,
        _ => Priority::Low,
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| CoreError::Internal(anyhow::anyhow!(e)))
}

fn row_to_component(row: &sqlx::sqlite::SqliteRow) -> Result<ProfileComponent, CoreError> {
    let embedding: Vec<f32> =
        serde_json::from_str(row.get::<String, _>("embedding").as_str()).unwrap_or_default();
    let supporting_evidence: Vec<EvidenceEntry> =
        serde_json::from_str(row.get::<String, _>("supporting_evidence").as_str()).unwrap_or_default();

    Ok(ProfileComponent {
        id: row.get("component_id"),
        user_id: row.get("user_id"),
        component_type: component_type_from_str(row.get::<String, _>("component_type").as_str()),
        description: row.get("description"),
        embedding,
        confidence: row.get("confidence"),
        total_attention_weight: row.get("total_attention_weight"),
        normalized_weight: row.get("normalized_weight"),
        priority: priority_from_str(row.get::<String, _>("priority").as_str()),
        activation_threshold: row.get("activation_threshold"),
        supporting_evidence,
        created_at: parse_ts(row.get::<String, _>("created_at").as_str())?,
        last_updated: parse_ts(row.get::<String, _>("last_updated").as_str())?,
        last_activated: parse_ts(row.get::<String, _>("last_activated").as_str())?,
    })
}
