use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Re-authentication proof for sensitive actions: a password or a current
/// MFA code. Within the step-up TTL, callers present the issued token via
/// the `x-app-session` header instead.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AppSessionRequest {
    pub password: Option<String>,
    pub mfa_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppSessionResponse {
    pub app_session_token: String,
    pub expires_in: i64,
}
