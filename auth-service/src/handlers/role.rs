use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{
        role::{AssignRoleRequest, RoleListResponse, SetHierarchyLevelRequest, SetMfaRequiredRequest},
        MessageResponse,
    },
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

fn organization_context(user: &AuthUser) -> Result<Uuid, AppError> {
    user.0
        .organization_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Organization context required")))
}

/// List roles visible to the caller's organization
#[utoipa::path(
    get,
    path = "/roles",
    responses(
        (status = 200, description = "Roles", body = RoleListResponse),
        (status = 403, description = "Missing permission", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let roles = state
        .auth_service
        .list_roles(user.0.user_id, organization_id)
        .await?;
    Ok((StatusCode::OK, Json(RoleListResponse { roles })))
}

/// List roles the caller may assign, filtered by authority
#[utoipa::path(
    get,
    path = "/roles/assignable",
    responses(
        (status = 200, description = "Assignable roles", body = RoleListResponse),
        (status = 403, description = "Missing permission", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn list_assignable_roles(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let roles = state
        .auth_service
        .list_assignable_roles(user.0.user_id, organization_id)
        .await?;
    Ok((StatusCode::OK, Json(RoleListResponse { roles })))
}

/// Assign a role to a member, enforcing the role hierarchy
#[utoipa::path(
    post,
    path = "/roles/assign/{user_id}",
    params(("user_id" = Uuid, Path, description = "Target member's user id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role assigned", body = MessageResponse),
        (status = 403, description = "Hierarchy violation or missing permission", body = ErrorResponse),
        (status = 404, description = "Role or member not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    state
        .auth_service
        .assign_role(user.0.user_id, organization_id, target_user_id, req.role_id)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Role assigned successfully")),
    ))
}

/// Set a custom role's hierarchy level (owner/admin only, >= 3)
#[utoipa::path(
    patch,
    path = "/roles/{role_id}/hierarchy",
    params(("role_id" = Uuid, Path, description = "Role id")),
    request_body = SetHierarchyLevelRequest,
    responses(
        (status = 200, description = "Hierarchy level updated", body = MessageResponse),
        (status = 400, description = "Invalid level or immutable role", body = ErrorResponse),
        (status = 403, description = "Insufficient authority", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
pub async fn set_role_hierarchy(
    State(state): State<AppState>,
    user: AuthUser,
    Path(role_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SetHierarchyLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    state
        .auth_service
        .set_role_hierarchy_level(user.0.user_id, organization_id, role_id, req.hierarchy_level)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Hierarchy level updated")),
    ))
}

/// Toggle the organization-wide MFA mandate (owner/admin only)
#[utoipa::path(
    patch,
    path = "/organizations/mfa",
    request_body = SetMfaRequiredRequest,
    responses(
        (status = 200, description = "MFA requirement updated", body = MessageResponse),
        (status = 403, description = "Insufficient authority", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("bearer_auth" = []))
)]
pub async fn set_organization_mfa(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SetMfaRequiredRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    state
        .auth_service
        .set_organization_mfa_required(user.0.user_id, organization_id, req.mfa_required)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Organization MFA requirement updated")),
    ))
}
