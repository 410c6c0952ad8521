//! Organization model - tenants with their own email identity and MFA mandate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization state codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationState {
    Active,
    Suspended,
}

impl OrganizationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationState::Active => "active",
            OrganizationState::Suspended => "suspended",
        }
    }
}

/// Organization entity.
///
/// The organization email is globally unique across all organizations. It
/// may happen to equal a member's personal email, but one address can back
/// at most one organization.
#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub org_id: Uuid,
    pub org_name: String,
    pub org_slug: String,
    pub email: String,
    pub email_verified: bool,
    /// When set, every member must complete MFA setup on next login.
    pub mfa_required: bool,
    pub org_state_code: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization pending email verification.
    pub fn new(name: String, slug: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            org_id: Uuid::new_v4(),
            org_name: name,
            org_slug: slug,
            email,
            email_verified: false,
            mfa_required: false,
            org_state_code: OrganizationState::Active.as_str().to_string(),
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.org_state_code == OrganizationState::Active.as_str()
    }
}

/// Generate a URL-safe slug from an organization name.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Organization projection returned after login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationResponse {
    pub org_id: Uuid,
    pub org_name: String,
    pub org_slug: String,
}

impl From<Organization> for OrganizationResponse {
    fn from(org: Organization) -> Self {
        Self {
            org_id: org.org_id,
            org_name: org.org_name,
            org_slug: org.org_slug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_and_dash_separated() {
        assert_eq!(generate_slug("Acme Corporation"), "acme-corporation");
        assert_eq!(generate_slug("  Spaced   Out  "), "spaced-out");
        assert_eq!(generate_slug("Already-Slugged_Name"), "already-slugged-name");
        assert_eq!(generate_slug("Punctuation! & Co."), "punctuation-co");
    }
}
