use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{
            ForgotPasswordRequest, LoginRequest, LogoutRequest, MfaSetupRequiredResponse,
            MfaVerificationRequiredResponse, OrgSelectionResponse, RefreshRequest,
            RegisterOrganizationRequest, ResetPasswordRequest, VerifyEmailQuery,
            VerifyMfaLoginRequest,
        },
        MessageResponse,
    },
    middleware::AuthUser,
    services::LoginFlow,
    utils::ValidatedJson,
    AppState,
};

/// Register an organization with its owner account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterOrganizationRequest,
    responses(
        (status = 201, description = "Organization registered", body = RegisterOrganizationResponse),
        (status = 409, description = "Name or email already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.register_organization(req).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Verify a user or organization email address
#[utoipa::path(
    get,
    path = "/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let message = state.auth_service.verify_email(&query.token).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

/// Login with email and password
///
/// Returns tokens directly, or one of the pending states: organization
/// selection, MFA setup, or MFA verification.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login complete or pending state returned", body = LoginSuccessResponse),
        (status = 401, description = "Invalid credentials or verification gate failed", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Service unavailable", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let flow = state.auth_service.login(req).await?;

    let response = match flow {
        LoginFlow::Complete(success) => (StatusCode::OK, Json(*success)).into_response(),
        LoginFlow::OrgSelectionPending { organizations } => (
            StatusCode::OK,
            Json(OrgSelectionResponse {
                requires_organization_selection: true,
                organizations,
                message: "Please select an organization to continue".to_string(),
            }),
        )
            .into_response(),
        LoginFlow::MfaSetupRequired { temp_setup_token } => (
            StatusCode::OK,
            Json(MfaSetupRequiredResponse {
                requires_mfa_setup: true,
                temp_setup_token,
                message: "MFA is required. Please set up two-factor authentication first."
                    .to_string(),
            }),
        )
            .into_response(),
        LoginFlow::MfaVerificationRequired { temp_token } => (
            StatusCode::OK,
            Json(MfaVerificationRequiredResponse {
                requires_mfa_verification: true,
                temp_token,
                message: "Please verify your two-factor authentication code".to_string(),
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// System administrator login (no organization context)
#[utoipa::path(
    post,
    path = "/auth/login/system-admin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginSuccessResponse),
        (status = 401, description = "Invalid credentials or not a system admin", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn system_admin_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .auth_service
        .system_admin_login(&req.email, &req.password)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Complete a pending login with an MFA code
#[utoipa::path(
    post,
    path = "/auth/login/verify-mfa",
    request_body = VerifyMfaLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginSuccessResponse),
        (status = 401, description = "Invalid code or challenge", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_mfa_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyMfaLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state
        .auth_service
        .verify_mfa_and_login(&req.temp_token, &req.code)
        .await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Refresh the access token using a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// Logout and revoke the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out successfully", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .logout(user.0.user_id, &req.refresh_token)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.forgot_password(&req.email).await?;
    // Same response whether or not the address is registered
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "If the email exists, a password reset link has been sent",
        )),
    ))
}

/// Reset the password with an emailed token
#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password reset successfully")),
    ))
}
