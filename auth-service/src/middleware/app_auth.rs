//! Step-up gate for sensitive routes.
//!
//! Layered after the auth guard. Requests must present a step-up token in
//! the `x-app-session` header; the token is audience-scoped and bound to
//! the authenticated user, so another user's token fails closed.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::AppState;

use super::auth::AuthPrincipal;

pub const APP_SESSION_HEADER: &str = "x-app-session";

pub async fn require_app_session(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<AuthPrincipal>()
        .cloned()
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth principal missing from request extensions"
            ))
        })?;

    let token = req
        .headers()
        .get(APP_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!(
                "Recent re-authentication required for this action"
            ))
        })?;

    state
        .auth_service
        .verify_step_up_token(principal.user_id, token)
        .map_err(AppError::from)?;

    Ok(next.run(req).await)
}
