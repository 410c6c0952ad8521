pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AuthConfig;
use crate::db::Database;
use crate::services::{
    AuditRecorder, AuthService, EmailProvider, EphemeralStore, JwtService, MfaService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::verify_email,
        handlers::auth::login,
        handlers::auth::system_admin_login,
        handlers::auth::verify_mfa_login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::app::create_app_session,
        handlers::mfa::initialize_setup,
        handlers::mfa::confirm_setup,
        handlers::mfa::regenerate_backup_codes,
        handlers::mfa::disable_mfa,
        handlers::mfa::mfa_status,
        handlers::role::list_roles,
        handlers::role::list_assignable_roles,
        handlers::role::assign_role,
        handlers::role::set_role_hierarchy,
        handlers::role::set_organization_mfa,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::RegisterOrganizationRequest,
            dtos::auth::RegisterOrganizationResponse,
            dtos::auth::LoginRequest,
            dtos::auth::VerifyMfaLoginRequest,
            dtos::auth::LoginSuccessResponse,
            dtos::auth::OrgSelectionResponse,
            dtos::auth::MfaSetupRequiredResponse,
            dtos::auth::MfaVerificationRequiredResponse,
            dtos::auth::RefreshRequest,
            dtos::auth::RefreshResponse,
            dtos::auth::LogoutRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::app::AppSessionRequest,
            dtos::app::AppSessionResponse,
            dtos::mfa::MfaSetupInitiationResponse,
            dtos::mfa::ConfirmMfaSetupRequest,
            dtos::mfa::ConfirmMfaSetupResponse,
            dtos::mfa::MfaCodeRequest,
            dtos::mfa::BackupCodesResponse,
            dtos::mfa::MfaStatusResponse,
            dtos::role::AssignRoleRequest,
            dtos::role::SetHierarchyLevelRequest,
            dtos::role::RoleListResponse,
            dtos::role::SetMfaRequiredRequest,
            models::Role,
            models::Permission,
            models::user::UserResponse,
            models::organization::OrganizationResponse,
            models::membership::OrganizationCandidate,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, registration, tokens, and password lifecycle"),
        (name = "MFA", description = "Two-factor enrollment and verification"),
        (name = "Roles", description = "Role hierarchy and assignment"),
        (name = "Organizations", description = "Organization security settings"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "mfa_setup_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-mfa-setup-token"))),
            );
            components.add_security_scheme(
                "app_session",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-app-session"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub db: Database,
    pub store: Arc<dyn EphemeralStore>,
    pub email: Arc<dyn EmailProvider>,
    pub jwt: JwtService,
    pub audit: Arc<dyn AuditRecorder>,
    pub auth_service: AuthService,
    pub mfa_service: MfaService,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub register_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub password_reset_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub app_session_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Login-adjacent routes share the strictest limiter
    let login_limiter = state.login_rate_limiter.clone();
    let login_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/auth/login/system-admin",
            post(handlers::auth::system_admin_login),
        )
        .route(
            "/auth/login/verify-mfa",
            post(handlers::auth::verify_mfa_login),
        )
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    let reset_limiter = state.password_reset_rate_limiter.clone();
    let reset_request_route = Router::new()
        .route(
            "/auth/password/forgot",
            post(handlers::auth::forgot_password),
        )
        .layer(from_fn_with_state(reset_limiter, ip_rate_limit_middleware));

    // MFA enrollment accepts either a JWT or an ephemeral setup token
    let mfa_setup_routes = Router::new()
        .route("/mfa/setup/initialize", post(handlers::mfa::initialize_setup))
        .route("/mfa/setup/confirm", post(handlers::mfa::confirm_setup))
        .route("/mfa/status", get(handlers::mfa::mfa_status))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::mfa_setup_middleware,
        ));

    let app_session_limiter = state.app_session_rate_limiter.clone();
    let app_session_route = Router::new()
        .route("/auth/app/session", post(handlers::app::create_app_session))
        .layer(from_fn_with_state(
            app_session_limiter,
            ip_rate_limit_middleware,
        ));

    let authenticated_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/mfa/backup-codes/regenerate",
            post(handlers::mfa::regenerate_backup_codes),
        )
        .route("/mfa/disable", post(handlers::mfa::disable_mfa))
        .route("/roles", get(handlers::role::list_roles))
        .route(
            "/roles/assignable",
            get(handlers::role::list_assignable_roles),
        )
        .route("/roles/assign/:user_id", post(handlers::role::assign_role))
        .route(
            "/roles/:role_id/hierarchy",
            patch(handlers::role::set_role_hierarchy),
        )
        .route(
            "/organizations/mfa",
            patch(handlers::role::set_organization_mfa),
        )
        .merge(app_session_route)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new().route("/health", get(health_check));

    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => match state.config.swagger.enabled {
            crate::config::SwaggerMode::Public | crate::config::SwaggerMode::Authenticated => true,
            crate::config::SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/auth/verify-email", get(handlers::auth::verify_email))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/password/reset",
            post(handlers::auth::reset_password),
        )
        .merge(login_routes)
        .merge(register_route)
        .merge(reset_request_route)
        .merge(mfa_setup_routes)
        .merge(authenticated_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        // Tracing span per request
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::HeaderName::from_static("x-mfa-setup-token"),
                    axum::http::header::HeaderName::from_static("x-app-session"),
                    axum::http::header::HeaderName::from_static("x-request-id"),
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::ServiceUnavailable(e.to_string())
    })?;

    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::ServiceUnavailable(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up",
            "redis": "up"
        }
    })))
}
