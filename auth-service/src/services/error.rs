use service_core::error::AppError;
use thiserror::Error;

/// Domain errors for the authentication core.
///
/// Every variant here is terminal and user-facing; none are retried by the
/// service itself. Transient infrastructure faults surface as
/// `Unavailable` and are never folded into `InvalidCredentials`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ephemeral store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Wrong password or unknown email - deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email address before logging in")]
    EmailNotVerified,

    #[error("Organization email address must be verified before you can access this organization")]
    OrganizationEmailNotVerified,

    #[error("You are not a member of this organization")]
    MembershipNotFound,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Role not found or not available for this organization")]
    RoleNotFound,

    #[error("MFA is not enabled for this user")]
    MfaNotEnabled,

    #[error("MFA is not enabled for this organization")]
    MfaNotRequiredByOrganization,

    #[error("MFA is already set up for this user")]
    MfaAlreadySetUp,

    #[error("MFA setup required")]
    MfaSetupRequired,

    #[error("Invalid or expired MFA token")]
    MfaChallengeInvalid,

    #[error("MFA token expired; please login again to get a new one")]
    MfaChallengeExpired,

    #[error("Invalid MFA code")]
    InvalidMfaCode,

    #[error("Insufficient authority: {0}")]
    InsufficientAuthority(String),

    #[error("You do not have permission to {0}")]
    MissingPermission(String),

    /// Refresh or step-up token failed signature, expiry, or binding checks.
    #[error("Invalid or expired token")]
    AuthTokenInvalid,

    /// Generic message; never confirms whether a token was ever issued.
    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token has expired; please request a new one")]
    TokenExpired,

    #[error("Token has already been used; please request a new one")]
    TokenAlreadyUsed,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Organization name already exists")]
    OrganizationNameTaken,

    #[error("This email address is already used as an organization email for another organization")]
    OrganizationEmailTaken,

    #[error("System administrator access required")]
    SystemAdminRequired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email error: {0}")]
    Email(String),
}

/// Distinguish transient connectivity faults from query-level failures so
/// callers can retry with backoff instead of seeing a credentials error.
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) if is_transient(&e) => {
                AppError::ServiceUnavailable(e.to_string())
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Store(e) => AppError::ServiceUnavailable(e.to_string()),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            e @ ServiceError::EmailNotVerified => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::OrganizationEmailNotVerified => {
                AppError::Unauthorized(anyhow::anyhow!(e))
            }
            e @ ServiceError::MembershipNotFound => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::OrganizationNotFound => AppError::NotFound(anyhow::anyhow!(e)),
            e @ ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!(e)),
            e @ ServiceError::RoleNotFound => AppError::NotFound(anyhow::anyhow!(e)),
            e @ ServiceError::MfaNotEnabled => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ ServiceError::MfaNotRequiredByOrganization => {
                AppError::BadRequest(anyhow::anyhow!(e))
            }
            e @ ServiceError::MfaAlreadySetUp => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ ServiceError::MfaSetupRequired => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::MfaChallengeInvalid => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::MfaChallengeExpired => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::InvalidMfaCode => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::InsufficientAuthority(_) => AppError::Forbidden(anyhow::anyhow!(e)),
            e @ ServiceError::MissingPermission(_) => AppError::Forbidden(anyhow::anyhow!(e)),
            e @ ServiceError::AuthTokenInvalid => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::TokenInvalid => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ ServiceError::TokenExpired => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ ServiceError::TokenAlreadyUsed => AppError::BadRequest(anyhow::anyhow!(e)),
            e @ ServiceError::SessionNotFound => AppError::Unauthorized(anyhow::anyhow!(e)),
            e @ ServiceError::EmailAlreadyRegistered => AppError::Conflict(anyhow::anyhow!(e)),
            e @ ServiceError::OrganizationNameTaken => AppError::Conflict(anyhow::anyhow!(e)),
            e @ ServiceError::OrganizationEmailTaken => AppError::Conflict(anyhow::anyhow!(e)),
            e @ ServiceError::SystemAdminRequired => AppError::Unauthorized(anyhow::anyhow!(e)),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::Email(e) => AppError::EmailError(e),
        }
    }
}
