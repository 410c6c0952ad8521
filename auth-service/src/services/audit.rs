use uuid::Uuid;

use crate::db::Database;
use crate::models::AuditLog;

/// Fire-and-forget audit boundary. Recording never blocks or fails the
/// calling flow; a lost entry is logged and dropped.
pub trait AuditRecorder: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        organization_id: Option<Uuid>,
        actor_user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        before_state: Option<serde_json::Value>,
        after_state: Option<serde_json::Value>,
    );
}

/// Writes audit rows on a spawned task.
#[derive(Clone)]
pub struct DbAuditRecorder {
    db: Database,
}

impl DbAuditRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl AuditRecorder for DbAuditRecorder {
    fn record(
        &self,
        organization_id: Option<Uuid>,
        actor_user_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        before_state: Option<serde_json::Value>,
        after_state: Option<serde_json::Value>,
    ) {
        let entry = AuditLog::new(
            organization_id,
            actor_user_id,
            action,
            entity_type,
            entity_id,
            before_state,
            after_state,
        );
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.insert_audit_log(&entry).await {
                tracing::warn!(error = %e, action = %entry.action, "Failed to record audit entry");
            }
        });
    }
}

/// Drops entries; used in tests.
#[derive(Clone, Default)]
pub struct NoopAuditRecorder;

impl AuditRecorder for NoopAuditRecorder {
    fn record(
        &self,
        _organization_id: Option<Uuid>,
        _actor_user_id: Option<Uuid>,
        _action: &str,
        _entity_type: &str,
        _entity_id: &str,
        _before_state: Option<serde_json::Value>,
        _after_state: Option<serde_json::Value>,
    ) {
    }
}
