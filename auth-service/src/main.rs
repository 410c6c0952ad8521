use auth_service::{
    build_router,
    config::AuthConfig,
    db::Database,
    migrations,
    services::{AuthService, DbAuditRecorder, EmailService, JwtService, MfaService, RedisStore},
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    // Initialize database connections
    tracing::info!("Initializing database connections");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            service_core::error::AppError::DatabaseError(anyhow::anyhow!(
                "Failed to connect to Postgres: {}",
                e
            ))
        })?;

    migrations::bootstrap_schema(&pool).await?;
    let db = Database::new(pool);
    tracing::info!("Database initialized successfully");

    // Ephemeral challenge store
    let store = Arc::new(RedisStore::new(&config.redis).await?);
    tracing::info!("Ephemeral store initialized");

    // Email service
    let email = Arc::new(EmailService::new(&config.smtp)?);
    tracing::info!("Email service initialized");

    // JWT service
    let jwt = JwtService::new(&config.jwt)?;
    tracing::info!("JWT service initialized");

    // Rate limiters
    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
    );
    let app_session_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.app_session_attempts,
        config.rate_limit.app_session_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized");

    // Domain services
    let audit = Arc::new(DbAuditRecorder::new(db.clone()));
    let mfa_service = MfaService::new(db.clone(), store.clone(), audit.clone(), config.mfa.clone());
    let auth_service = AuthService::new(
        db.clone(),
        email.clone(),
        jwt.clone(),
        store.clone(),
        audit.clone(),
        mfa_service.clone(),
        config.mfa.clone(),
        config.common.base_url.clone(),
    );

    let state = AppState {
        config: config.clone(),
        db,
        store,
        email,
        jwt,
        audit,
        auth_service,
        mfa_service,
        login_rate_limiter,
        register_rate_limiter,
        password_reset_rate_limiter,
        app_session_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
