// src/context.rs
// Explicit request context: auth subject, capabilities, deadline, correlation id.
// Replaces the "global mutable state for request context" pattern flagged
// in spec §9 — every entry point takes one of these instead of reaching for
// thread-locals or ambient globals.

use std::time::{Duration, Instant};
use uuid::Uuid;

/// A capability string as defined in spec §6 (`hinata:write`, `profile:read`, ...).
pub type Capability = String;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub app_id: String,
    /// `None` for admin-scoped callers acting without a fixed subject.
    pub subject_user_id: Option<String>,
    pub capabilities: Vec<Capability>,
}

impl AuthContext {
    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability || c == "admin:*")
    }
}

/// Carried through every entry point. Cancellation and deadline live here,
/// per spec §9 ("global mutable state for request context ... replace with
/// an explicit context object").
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub auth: AuthContext,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(auth: AuthContext) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            auth,
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_wildcard_grants_any_capability() {
        let auth = AuthContext {
            app_id: "a".into(),
            subject_user_id: None,
            capabilities: vec!["admin:*".into()],
        };
        assert!(auth.has("hinata:write"));
        assert!(auth.has("profile:read"));
    }

    #[test]
    fn missing_capability_is_denied() {
        let auth = AuthContext {
            app_id: "a".into(),
            subject_user_id: Some("u".into()),
            capabilities: vec!["observation:read".into()],
        };
        assert!(!auth.has("observation:write"));
    }

    #[test]
    fn expired_deadline_is_detected() {
        let ctx = RequestContext::new(AuthContext {
            app_id: "a".into(),
            subject_user_id: None,
            capabilities: vec![],
        })
        .with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(ctx.is_expired());
    }
}
