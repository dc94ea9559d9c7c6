// src/types/privacy.rs
// PrivacyPreferences data model (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    Strict,
    Balanced,
    Permissive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentFlags {
    pub sharing: bool,
    pub analytics: bool,
    pub personalization: bool,
    pub external: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyPreferences {
    pub user_id: String,
    pub policy_level: PolicyLevel,
    pub consent: ConsentFlags,
    pub retention_days: i64,
    pub allow_app_ids: HashSet<String>,
    pub block_app_ids: HashSet<String>,
}

impl PrivacyPreferences {
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            policy_level: PolicyLevel::Balanced,
            consent: ConsentFlags {
                sharing: false,
                analytics: true,
                personalization: true,
                external: false,
            },
            retention_days: 365,
            allow_app_ids: HashSet::new(),
            block_app_ids: HashSet::new(),
        }
    }

    pub fn permits_app(&self, app_id: &str) -> bool {
        if self.block_app_ids.contains(app_id) {
            return false;
        }
        self.allow_app_ids.is_empty() || self.allow_app_ids.contains(app_id)
    }
}
