//! Guard for MFA enrollment endpoints.
//!
//! Users mid-enrollment cannot hold a full access token yet (the auth
//! guard would reject them with "MFA setup required"), so these endpoints
//! also accept the ephemeral setup token minted at login or at
//! initialize-setup - checked in both setup namespaces. With no setup
//! token present, the request falls back to normal JWT auth with the
//! enrollment gate skipped.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::services::challenge::{self, LoginChallenge, SetupStage};
use crate::AppState;

use super::auth::{authenticate, AuthPrincipal};

pub const SETUP_TOKEN_HEADER: &str = "x-mfa-setup-token";

fn setup_token_from_request(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(value) = headers.get(SETUP_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("temp_setup_token="))
        .map(|v| v.to_string())
}

fn principal_from_payload(raw: &str, token: &str) -> Result<AuthPrincipal, AppError> {
    // Login-issued tokens and staged-setup tokens carry different payloads
    if let Ok(pending) = serde_json::from_str::<LoginChallenge>(raw) {
        if Utc::now().timestamp_millis() > pending.expires_at {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "MFA setup token expired. Please login again to get a new token."
            )));
        }
        return Ok(AuthPrincipal {
            user_id: pending.user_id,
            email: pending.email,
            organization_id: Some(pending.organization_id),
            role_id: Some(pending.role_id),
            is_system_admin: false,
            setup_token: Some(token.to_string()),
        });
    }

    let stage: SetupStage = serde_json::from_str(raw)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid MFA setup token")))?;
    if Utc::now().timestamp_millis() > stage.expires_at {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "MFA setup token expired. Please login again to get a new token."
        )));
    }
    Ok(AuthPrincipal {
        user_id: stage.user_id,
        email: stage.user_email,
        organization_id: Some(stage.organization_id),
        role_id: None,
        is_system_admin: false,
        setup_token: Some(token.to_string()),
    })
}

/// Middleware accepting either a setup token or a JWT (setup gate skipped).
pub async fn mfa_setup_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = setup_token_from_request(req.headers(), req.uri().query());

    let principal = match token {
        Some(token) => {
            // A presented setup token must resolve; no silent JWT fallback
            let found = challenge::find_setup_token(state.store.as_ref(), &token)
                .await
                .map_err(|e| AppError::from(e))?;
            match found {
                Some((_, raw)) => principal_from_payload(&raw, &token)?,
                None => {
                    return Err(AppError::Unauthorized(anyhow::anyhow!(
                        "Invalid or expired MFA setup token. Please login again to get a new token."
                    )))
                }
            }
        }
        None => authenticate(&state, req.headers(), true).await?,
    };

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
