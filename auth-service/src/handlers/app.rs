use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::app::{AppSessionRequest, AppSessionResponse},
    middleware::AuthUser,
    AppState,
};

/// Prove recent re-authentication and receive a short-lived step-up token
///
/// Present a password or a current MFA code; the returned token goes in
/// the `x-app-session` header on subsequent sensitive calls within its TTL.
#[utoipa::path(
    post,
    path = "/auth/app/session",
    request_body = AppSessionRequest,
    responses(
        (status = 200, description = "Step-up token issued", body = AppSessionResponse),
        (status = 400, description = "Password or MFA code required", body = ErrorResponse),
        (status = 401, description = "Re-authentication failed", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn create_app_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AppSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state
        .auth_service
        .issue_step_up_token(
            user.0.user_id,
            req.password.as_deref(),
            req.mfa_code.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(AppSessionResponse {
            app_session_token: token,
            expires_in: state.jwt.step_up_token_expiry_seconds(),
        }),
    ))
}
