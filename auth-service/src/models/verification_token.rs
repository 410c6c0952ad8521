//! Email verification tokens - registration, organization email, password reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Verification token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Registration,
    OrganizationEmail,
    PasswordReset,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Registration => "registration",
            VerificationKind::OrganizationEmail => "organization_email",
            VerificationKind::PasswordReset => "password_reset",
        }
    }
}

/// Verification token entity. The token column holds the random value sent
/// by email; `verified_utc` marks single use.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub verification_id: Uuid,
    pub user_id: Uuid,
    /// Address being verified - the user's own email, or the organization
    /// email for `organization_email` tokens.
    pub email: String,
    pub token: String,
    pub kind_code: String,
    pub expiry_utc: DateTime<Utc>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new_registration(user_id: Uuid, email: String, token: String) -> Self {
        Self::new(user_id, email, token, VerificationKind::Registration, 24)
    }

    pub fn new_organization_email(user_id: Uuid, email: String, token: String) -> Self {
        Self::new(user_id, email, token, VerificationKind::OrganizationEmail, 24)
    }

    pub fn new_password_reset(user_id: Uuid, email: String, token: String) -> Self {
        Self::new(user_id, email, token, VerificationKind::PasswordReset, 1)
    }

    fn new(
        user_id: Uuid,
        email: String,
        token: String,
        kind: VerificationKind,
        expiry_hours: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            verification_id: Uuid::new_v4(),
            user_id,
            email,
            token,
            kind_code: kind.as_str().to_string(),
            expiry_utc: now + Duration::hours(expiry_hours),
            verified_utc: None,
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expiry_utc
    }

    pub fn is_used(&self) -> bool {
        self.verified_utc.is_some()
    }

    pub fn kind(&self) -> Option<VerificationKind> {
        match self.kind_code.as_str() {
            "registration" => Some(VerificationKind::Registration),
            "organization_email" => Some(VerificationKind::OrganizationEmail),
            "password_reset" => Some(VerificationKind::PasswordReset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_tokens_expire_in_24_hours() {
        let t = VerificationToken::new_registration(
            Uuid::new_v4(),
            "user@example.com".to_string(),
            "tok".to_string(),
        );
        assert!(!t.is_expired());
        assert!(t.expiry_utc - t.created_utc == Duration::hours(24));
    }

    #[test]
    fn password_reset_tokens_expire_in_1_hour() {
        let t = VerificationToken::new_password_reset(
            Uuid::new_v4(),
            "user@example.com".to_string(),
            "tok".to_string(),
        );
        assert!(t.expiry_utc - t.created_utc == Duration::hours(1));
    }

    #[test]
    fn kind_round_trips_through_code() {
        let t = VerificationToken::new_organization_email(
            Uuid::new_v4(),
            "org@example.com".to_string(),
            "tok".to_string(),
        );
        assert_eq!(t.kind(), Some(VerificationKind::OrganizationEmail));
    }
}
