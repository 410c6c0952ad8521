use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;

/// Verified principal attached to every authenticated request. Downstream
/// consumers rely on this tuple plus the hierarchy functions for any
/// privilege check.
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub user_id: Uuid,
    pub email: String,
    pub organization_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub is_system_admin: bool,
    /// Present when the request was authenticated with an ephemeral MFA
    /// setup token instead of an access token.
    pub setup_token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Validate an access token and revalidate the account and membership
/// state behind it. `skip_mfa_gate` is set for MFA setup endpoints so a
/// user who still has to enroll is not bounced by the enrollment check
/// itself.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    skip_mfa_gate: bool,
) -> Result<AuthPrincipal, AppError> {
    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
    })?;

    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    let user = state
        .db
        .find_active_user_by_id(claims.sub)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("User not found")))?;

    if !user.email_verified {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Email address must be verified before accessing protected routes"
        )));
    }

    if claims.is_system_admin && user.is_system_admin {
        return Ok(AuthPrincipal {
            user_id: user.user_id,
            email: user.email,
            organization_id: None,
            role_id: None,
            is_system_admin: true,
            setup_token: None,
        });
    }

    let organization_id = claims.organization_id.ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Organization context required"))
    })?;

    let membership = state
        .db
        .find_active_membership_detail(user.user_id, organization_id)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Organization membership not found"))
        })?;

    if !membership.org_email_verified {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Organization email address must be verified before accessing this organization"
        )));
    }

    if !skip_mfa_gate && membership.org_mfa_required && !user.mfa_setup_complete() {
        return Err(AppError::Unauthorized(anyhow::anyhow!("MFA setup required")));
    }

    Ok(AuthPrincipal {
        user_id: user.user_id,
        email: user.email,
        organization_id: Some(organization_id),
        role_id: Some(membership.role_id),
        is_system_admin: false,
        setup_token: None,
    })
}

/// Middleware to require authentication.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = authenticate(&state, req.headers(), false).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Extractor to easily get the principal in handlers.
pub struct AuthUser(pub AuthPrincipal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<AuthPrincipal>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth principal missing from request extensions"
            ))
        })?;

        Ok(AuthUser(principal.clone()))
    }
}
