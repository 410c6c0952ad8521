use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Role;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetHierarchyLevelRequest {
    #[validate(range(min = 3, message = "Hierarchy level must be 3 or higher"))]
    #[schema(example = 3, minimum = 3)]
    pub hierarchy_level: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetMfaRequiredRequest {
    pub mfa_required: bool,
}
