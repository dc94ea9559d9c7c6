// src/types/app.rs
// AppRegistration data model (spec §3), grounded in the teacher's
// auth::models::User pattern but for machine (app) credentials rather than
// interactive human accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRegistration {
    pub app_id: String,
    /// SHA-256 hex digest of the API key; the raw key is never stored.
    pub api_key_hash: String,
    pub permissions: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAppCredentials {
    pub app_id: String,
    pub api_key: String,
    pub permissions: Vec<String>,
    pub rate_limit_per_minute: u32,
}
