use portal_auth::{
    build_router,
    config::PortalConfig,
    db,
    services::{
        spawn_token_sweeper, AccountService, Database, EmailProvider, MockEmailService,
        SmtpEmailService, SystemClock, TokenService,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = PortalConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting portal auth service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    let database = Arc::new(Database::new(pool));

    let email: Arc<dyn EmailProvider> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp)?),
        None => {
            tracing::warn!(
                "SMTP not configured; outgoing email is kept in a bounded in-memory outbox and never delivered"
            );
            Arc::new(MockEmailService::new())
        }
    };

    let clock = Arc::new(SystemClock);
    let tokens = TokenService::new(database.clone(), database.clone(), clock.clone());
    let accounts = AccountService::new(
        tokens.clone(),
        database,
        email,
        clock,
        config.public_base_url.clone(),
    );

    let state = AppState {
        service_name: config.service_name.clone(),
        service_version: config.service_version.clone(),
        accounts,
        admin_api_key: config.security.admin_api_key.clone(),
        allowed_origins: config.security.allowed_origins.clone(),
        auth_rate_limiter: create_ip_rate_limiter(config.rate_limit.auth_policy()),
        code_rate_limiter: create_ip_rate_limiter(config.rate_limit.auth_policy()),
        api_rate_limiter: create_ip_rate_limiter(config.rate_limit.api_policy()),
    };
    tracing::info!(
        auth_attempts = config.rate_limit.auth_attempts,
        api_limit = config.rate_limit.api_limit,
        "Rate limiters initialized"
    );

    let shutdown = CancellationToken::new();
    let sweeper = spawn_token_sweeper(
        tokens,
        Duration::from_secs(config.sweeper.interval_seconds),
        shutdown.clone(),
    );

    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e)))?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Token sweeper task failed");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
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

    shutdown.cancel();
}
