use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaSetupInitiationResponse {
    /// Base32 secret for manual entry.
    pub secret: String,
    /// otpauth:// provisioning URI.
    pub otp_url: String,
    /// QR code as base64 PNG for inline rendering.
    pub qr_code_base64: String,
    pub temp_setup_token: String,
    pub user_email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmMfaSetupRequest {
    #[validate(length(min = 6, message = "Code is required"))]
    #[schema(example = "123456")]
    pub code: String,

    /// Explicit setup token; falls back to the guard-resolved token when
    /// the request was authenticated with one.
    pub temp_setup_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmMfaSetupResponse {
    pub message: String,
    /// Shown exactly once; each code is single-use.
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MfaCodeRequest {
    #[validate(length(min = 6, message = "Code is required"))]
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaStatusResponse {
    pub required: bool,
    pub setup_completed: bool,
}
