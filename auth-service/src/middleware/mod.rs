pub mod app_auth;
pub mod auth;
pub mod mfa_setup;

pub use app_auth::require_app_session;
pub use auth::{auth_middleware, AuthPrincipal, AuthUser};
pub use mfa_setup::mfa_setup_middleware;
