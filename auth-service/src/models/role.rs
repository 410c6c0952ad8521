//! Role model - fixed system roles plus organization-scoped custom roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Slug of the fixed administrator role (authority level 2).
pub const ADMIN_ROLE_SLUG: &str = "admin";

/// Slug of the organization owner role (authority level 1).
pub const OWNER_ROLE_SLUG: &str = "organization-owner";

/// Role entity.
///
/// System/default roles have no organization id and are immutable. Custom
/// roles are organization-scoped and carry an explicit hierarchy level
/// (always >= 3; owner and admin occupy the fixed levels 1 and 2).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role_slug: String,
    pub role_name: String,
    pub is_organization_owner: bool,
    pub is_system_role: bool,
    pub is_default: bool,
    pub hierarchy_level: Option<i32>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new organization-scoped custom role.
    pub fn new_custom(
        organization_id: Uuid,
        slug: String,
        name: String,
        hierarchy_level: i32,
    ) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            organization_id: Some(organization_id),
            role_slug: slug,
            role_name: name,
            is_organization_owner: false,
            is_system_role: false,
            is_default: false,
            hierarchy_level: Some(hierarchy_level),
            is_active: true,
            created_utc: Utc::now(),
        }
    }

    /// The fixed admin role is recognized only among system/default roles,
    /// so an org-scoped role slugged "admin" cannot claim level 2.
    pub fn is_fixed_admin(&self) -> bool {
        self.role_slug == ADMIN_ROLE_SLUG && (self.is_system_role || self.is_default)
    }

    /// Owner and the fixed admin role cannot be edited or re-leveled.
    pub fn is_immutable(&self) -> bool {
        self.is_organization_owner || self.is_fixed_admin() || self.is_system_role || self.is_default
    }
}

/// Permission entity (flat catalog, not organization-scoped).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub permission_id: Uuid,
    pub perm_slug: String,
    pub perm_name: String,
    pub category: String,
}

/// Role-permission mapping.
#[derive(Debug, Clone, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}
