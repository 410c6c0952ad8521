//! User model - platform-wide user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// User state codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Active,
    Suspended,
    Deactivated,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Active => "active",
            UserState::Suspended => "suspended",
            UserState::Deactivated => "deactivated",
        }
    }
}

/// User entity. Never hard-deleted; state transitions instead.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub email_verified_utc: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
    /// TOTP secret (base32). Only present once setup has been confirmed.
    pub mfa_secret: Option<String>,
    /// Single-use backup codes; a code is removed from the set when consumed.
    pub mfa_backup_codes: Vec<String>,
    pub mfa_setup_completed_utc: Option<DateTime<Utc>>,
    pub is_system_admin: bool,
    pub system_admin_role: Option<String>,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub user_state_code: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user pending email verification.
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            email_verified: false,
            email_verified_utc: None,
            mfa_enabled: false,
            mfa_secret: None,
            mfa_backup_codes: Vec::new(),
            mfa_setup_completed_utc: None,
            is_system_admin: false,
            system_admin_role: None,
            last_login_utc: None,
            user_state_code: UserState::Active.as_str().to_string(),
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Check if user is active.
    pub fn is_active(&self) -> bool {
        self.user_state_code == UserState::Active.as_str()
    }

    /// MFA counts as set up only once the confirmation step has completed.
    pub fn mfa_setup_complete(&self) -> bool {
        self.mfa_enabled && self.mfa_secret.is_some() && self.mfa_setup_completed_utc.is_some()
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub is_system_admin: bool,
    pub user_state_code: String,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            display_name: u.display_name,
            email_verified: u.email_verified,
            mfa_enabled: u.mfa_enabled,
            is_system_admin: u.is_system_admin,
            user_state_code: u.user_state_code,
            created_utc: u.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_unverified_without_mfa() {
        let user = User::new(
            "user@example.com".to_string(),
            "$argon2id$stub".to_string(),
            None,
        );
        assert!(user.is_active());
        assert!(!user.email_verified);
        assert!(!user.mfa_setup_complete());
    }

    #[test]
    fn mfa_setup_requires_secret_and_completion_timestamp() {
        let mut user = User::new(
            "user@example.com".to_string(),
            "$argon2id$stub".to_string(),
            None,
        );
        user.mfa_enabled = true;
        assert!(!user.mfa_setup_complete());

        user.mfa_secret = Some("JBSWY3DPEHPK3PXP".to_string());
        assert!(!user.mfa_setup_complete());

        user.mfa_setup_completed_utc = Some(Utc::now());
        assert!(user.mfa_setup_complete());
    }
}
