use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use service_core::observability::logging::init_tracing;
use tenancy_service::{
    build_router,
    config::TenancyConfig,
    db,
    services::{
        AuditService, Database, IntegrationService, LiveProbes, MemberAdminService,
        OrgContextResolver, VerificationCache,
    },
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = TenancyConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting tenancy service"
    );

    // Database
    let pool = db::create_pool(&config.database)
        .await
        .map_err(service_core::error::AppError::from)?;
    db::run_migrations(&pool).await?;
    let database = Arc::new(Database::new(pool));
    tracing::info!("Database initialized successfully");

    // Core services
    let codec = config.secret_codec()?;
    let env_defaults = Arc::new(config.env_defaults());
    let cache = Arc::new(VerificationCache::new());
    let probe_timeout = Duration::from_secs(config.probe.timeout_seconds);
    let probes = Arc::new(
        LiveProbes::new(probe_timeout)
            .map_err(|e| service_core::error::AppError::InternalError(anyhow::anyhow!(e)))?,
    );

    let resolver = OrgContextResolver::new(database.clone());
    let audit = AuditService::new(database.clone());
    let integrations = IntegrationService::new(
        database.clone(),
        audit.clone(),
        codec,
        env_defaults,
        cache,
        probes,
        probe_timeout,
    );
    let members = MemberAdminService::new(database.clone(), audit.clone());

    let state = AppState {
        config: config.clone(),
        resolver,
        audit,
        integrations,
        members,
    };

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
