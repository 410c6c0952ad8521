//! Audit log entries - fire-and-forget records of security-relevant actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Audit log entity.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLog {
    pub audit_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl AuditLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        organization_id: Option<Uuid>,
        actor_user_id: Option<Uuid>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        before_state: Option<serde_json::Value>,
        after_state: Option<serde_json::Value>,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            organization_id,
            actor_user_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            before_state,
            after_state,
            created_utc: Utc::now(),
        }
    }
}
