// src/error.rs
// Closed error taxonomy shared by every boundary in the crate (spec §7).
// Internal glue code still uses anyhow; `Internal` lets it cross the seam
// without leaking low-level identifiers to callers.

use thiserror::Error;

/// The kinds enumerated in spec §7. Each variant carries enough context to
/// build a stable code + human-readable message without exposing storage
/// internals.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed for item {item_id}: {reason}")]
    Validation { item_id: String, reason: String },

    #[error("missing capability: {capability}")]
    Authz { capability: String },

    #[error("quota exceeded for {subject}, retry after {retry_after_ms}ms")]
    Quota { subject: String, retry_after_ms: u64 },

    #[error("storage temporarily unavailable: {0}")]
    StorageTransient(String),

    #[error("storage permanently failed for {item_id}: {reason}")]
    StoragePermanent { item_id: String, reason: String },

    #[error("enrichment degraded for {item_id}: {reason}")]
    EnrichmentDegraded { item_id: String, reason: String },

    #[error("profile update conflict for user {user_id}")]
    ProfileConflict { user_id: String },

    #[error("external model error: {0}")]
    ExternalModel(String),

    #[error("operation cancelled: deadline exceeded")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable machine-readable code, independent of the Display message.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "VALIDATION_ERROR",
            CoreError::Authz { .. } => "AUTHZ_ERROR",
            CoreError::Quota { .. } => "QUOTA_ERROR",
            CoreError::StorageTransient(_) => "STORAGE_TRANSIENT",
            CoreError::StoragePermanent { .. } => "STORAGE_PERMANENT",
            CoreError::EnrichmentDegraded { .. } => "ENRICHMENT_DEGRADED",
            CoreError::ProfileConflict { .. } => "PROFILE_CONFLICT",
            CoreError::ExternalModel(_) => "EXTERNAL_MODEL_ERROR",
            CoreError::Cancelled => "CANCELLED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a retry of the same operation might succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CoreError::StorageTransient(_) | CoreError::Quota { .. } | CoreError::ExternalModel(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
