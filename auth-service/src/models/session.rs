//! Session model - durable, revocable records backing refresh tokens.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity. Stores only the Argon2 hash of the refresh token, never
/// the raw value. Superseded by a new row on re-login; invalidated by
/// revocation or expiry.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// None for system-admin sessions.
    pub organization_id: Option<Uuid>,
    pub refresh_token_hash: String,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Session {
    /// Create a new session.
    pub fn new(
        user_id: Uuid,
        organization_id: Option<Uuid>,
        refresh_token_hash: String,
        expiry_days: i64,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            organization_id,
            refresh_token_hash,
            expiry_utc: Utc::now() + Duration::days(expiry_days),
            revoked_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Session expiry is the authoritative cutoff for refresh validity,
    /// even if the token's own embedded expiry disagrees.
    pub fn is_valid(&self) -> bool {
        self.revoked_utc.is_none() && self.expiry_utc > Utc::now()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }
}

/// Session info for API responses.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
}

impl From<Session> for SessionInfo {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.session_id,
            organization_id: s.organization_id,
            created_utc: s.created_utc,
            expiry_utc: s.expiry_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_valid() {
        let session = Session::new(Uuid::new_v4(), None, "hash".to_string(), 7);
        assert!(session.is_valid());
        assert!(!session.is_expired());
        assert!(!session.is_revoked());
    }

    #[test]
    fn expired_session_is_invalid_even_if_not_revoked() {
        let mut session = Session::new(Uuid::new_v4(), None, "hash".to_string(), 7);
        session.expiry_utc = Utc::now() - Duration::minutes(1);
        assert!(!session.is_valid());
        assert!(session.is_expired());
    }

    #[test]
    fn revoked_session_is_invalid_before_expiry() {
        let mut session = Session::new(Uuid::new_v4(), None, "hash".to_string(), 7);
        session.revoked_utc = Some(Utc::now());
        assert!(!session.is_valid());
        assert!(!session.is_expired());
    }
}
