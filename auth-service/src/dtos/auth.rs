use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{OrganizationCandidate, OrganizationResponse, UserResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterOrganizationRequest {
    #[validate(length(min = 2, message = "Organization name must be at least 2 characters"))]
    #[schema(example = "Acme Corporation")]
    pub organization_name: String,

    #[validate(email(message = "Invalid organization email format"))]
    #[schema(example = "contact@acme.example.com")]
    pub organization_email: String,

    #[validate(email(message = "Invalid owner email format"))]
    #[schema(example = "owner@example.com")]
    pub owner_email: String,

    /// Required when registering a new owner account.
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub owner_password: Option<String>,

    #[schema(example = "Jordan Smith")]
    pub owner_display_name: Option<String>,

    /// Attach the organization to an already-registered owner account.
    #[serde(default)]
    pub is_existing_user: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterOrganizationResponse {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    #[schema(
        example = "Organization registered. Please verify both your personal and organization email addresses."
    )]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,

    /// Omit to auto-select when the user belongs to exactly one organization.
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyMfaLoginRequest {
    #[validate(length(min = 1, message = "Temporary token is required"))]
    pub temp_token: String,

    #[validate(length(min = 6, message = "Code is required"))]
    #[schema(example = "123456")]
    pub code: String,
}

/// Terminal login response carrying tokens and projections.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginSuccessResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
    /// None for system-admin sessions.
    pub organization: Option<OrganizationResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrgSelectionResponse {
    pub requires_organization_selection: bool,
    pub organizations: Vec<OrganizationCandidate>,
    #[schema(example = "Please select an organization to continue")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaSetupRequiredResponse {
    pub requires_mfa_setup: bool,
    pub temp_setup_token: String,
    #[schema(example = "MFA is required. Please set up two-factor authentication first.")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaVerificationRequiredResponse {
    pub requires_mfa_verification: bool,
    pub temp_token: String,
    #[schema(example = "Please verify your two-factor authentication code")]
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[schema(example = "refresh-token-123")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    #[schema(example = "refresh-token-123")]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema, IntoParams)]
pub struct VerifyEmailQuery {
    #[validate(length(min = 1, message = "Token is required"))]
    #[param(example = "abc123token")]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "newPassword123", min_length = 8)]
    pub new_password: String,
}
