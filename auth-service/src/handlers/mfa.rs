use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::mfa::{
        BackupCodesResponse, ConfirmMfaSetupRequest, ConfirmMfaSetupResponse, MfaCodeRequest,
        MfaSetupInitiationResponse, MfaStatusResponse,
    },
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

fn organization_context(user: &AuthUser) -> Result<uuid::Uuid, AppError> {
    user.0
        .organization_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Organization context required")))
}

/// Begin MFA enrollment: returns the secret, provisioning URI and QR code
///
/// Accepts either a bearer token or an `x-mfa-setup-token` from login.
#[utoipa::path(
    post,
    path = "/mfa/setup/initialize",
    responses(
        (status = 200, description = "Setup staged", body = MfaSetupInitiationResponse),
        (status = 400, description = "MFA not required or already set up", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn initialize_setup(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let initiation = state
        .mfa_service
        .initialize_setup(user.0.user_id, organization_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MfaSetupInitiationResponse {
            secret: initiation.secret,
            otp_url: initiation.otp_url,
            qr_code_base64: initiation.qr_code_base64,
            temp_setup_token: initiation.temp_setup_token,
            user_email: initiation.user_email,
        }),
    ))
}

/// Confirm MFA enrollment with a live code; returns one-time backup codes
#[utoipa::path(
    post,
    path = "/mfa/setup/confirm",
    request_body = ConfirmMfaSetupRequest,
    responses(
        (status = 200, description = "Setup complete", body = ConfirmMfaSetupResponse),
        (status = 401, description = "Invalid code or setup token", body = ErrorResponse)
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn confirm_setup(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ConfirmMfaSetupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let setup_token = req
        .temp_setup_token
        .or_else(|| user.0.setup_token.clone())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Setup token required")))?;

    let backup_codes = state
        .mfa_service
        .confirm_setup(user.0.user_id, organization_id, &setup_token, &req.code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ConfirmMfaSetupResponse {
            message: "MFA setup completed successfully".to_string(),
            backup_codes,
        }),
    ))
}

/// Regenerate backup codes (requires a valid current code)
#[utoipa::path(
    post,
    path = "/mfa/backup-codes/regenerate",
    request_body = MfaCodeRequest,
    responses(
        (status = 200, description = "New backup codes", body = BackupCodesResponse),
        (status = 401, description = "Invalid code", body = ErrorResponse)
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<MfaCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let backup_codes = state
        .mfa_service
        .regenerate_backup_codes(user.0.user_id, organization_id, &req.code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(BackupCodesResponse {
            backup_codes,
            message: "Backup codes regenerated successfully".to_string(),
        }),
    ))
}

/// Disable MFA for the authenticated user (requires a valid current code)
#[utoipa::path(
    post,
    path = "/mfa/disable",
    request_body = MfaCodeRequest,
    responses(
        (status = 200, description = "MFA disabled", body = MessageResponse),
        (status = 401, description = "Invalid code", body = ErrorResponse)
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn disable_mfa(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<MfaCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    state
        .mfa_service
        .disable(user.0.user_id, organization_id, &req.code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(crate::dtos::MessageResponse::new("MFA disabled successfully")),
    ))
}

/// Whether MFA is required for this user and whether setup is complete
#[utoipa::path(
    get,
    path = "/mfa/status",
    responses(
        (status = 200, description = "MFA status", body = MfaStatusResponse)
    ),
    tag = "MFA",
    security(("bearer_auth" = []))
)]
pub async fn mfa_status(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let organization_id = organization_context(&user)?;
    let (required, setup_completed) = state
        .mfa_service
        .status(user.0.user_id, organization_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MfaStatusResponse {
            required,
            setup_completed,
        }),
    ))
}
