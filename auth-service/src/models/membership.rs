//! Organization membership model - links a user to an organization with a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::Role;

/// Membership state codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Active,
    Invited,
    Removed,
}

impl MembershipState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipState::Active => "active",
            MembershipState::Invited => "invited",
            MembershipState::Removed => "removed",
        }
    }
}

/// Membership entity. A user holds at most one active membership per
/// organization (enforced by a partial unique index).
#[derive(Debug, Clone, FromRow)]
pub struct OrgMembership {
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub member_state_code: String,
    pub joined_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl OrgMembership {
    /// Create a new active membership joining now.
    pub fn new(user_id: Uuid, organization_id: Uuid, role_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            user_id,
            organization_id,
            role_id,
            member_state_code: MembershipState::Active.as_str().to_string(),
            joined_utc: Some(Utc::now()),
            created_utc: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.member_state_code == MembershipState::Active.as_str()
    }
}

/// Membership joined with its role and organization, as resolved for a
/// login or an authenticated request.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipDetail {
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub member_state_code: String,
    // organization columns
    pub org_name: String,
    pub org_slug: String,
    pub org_email_verified: bool,
    pub org_mfa_required: bool,
    pub org_state_code: String,
    // role columns
    pub role_slug: String,
    pub role_name: String,
    pub is_organization_owner: bool,
    pub is_system_role: bool,
    pub is_default: bool,
    pub hierarchy_level: Option<i32>,
}

impl MembershipDetail {
    /// View of the member's role for hierarchy evaluation.
    pub fn role(&self) -> Role {
        Role {
            role_id: self.role_id,
            organization_id: Some(self.organization_id),
            role_slug: self.role_slug.clone(),
            role_name: self.role_name.clone(),
            is_organization_owner: self.is_organization_owner,
            is_system_role: self.is_system_role,
            is_default: self.is_default,
            hierarchy_level: self.hierarchy_level,
            is_active: true,
            created_utc: Utc::now(),
        }
    }
}

/// Candidate organization offered during organization selection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationCandidate {
    pub org_id: Uuid,
    pub org_name: String,
    pub org_slug: String,
    pub role: String,
}

impl From<&MembershipDetail> for OrganizationCandidate {
    fn from(m: &MembershipDetail) -> Self {
        Self {
            org_id: m.organization_id,
            org_name: m.org_name.clone(),
            org_slug: m.org_slug.clone(),
            role: m.role_name.clone(),
        }
    }
}
