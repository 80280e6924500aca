pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::cors::CorsLayer;

use crate::config::TenancyConfig;
use crate::services::{
    AuditService, IntegrationService, MemberAdminService, OrgContextResolver,
};

#[derive(Clone)]
pub struct AppState {
    pub config: TenancyConfig,
    pub resolver: OrgContextResolver,
    pub audit: AuditService,
    pub integrations: IntegrationService,
    pub members: MemberAdminService,
}

/// Service health check.
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": state.config.service_name,
            "version": state.config.service_version,
        })),
    )
}

pub fn build_router(state: AppState) -> Result<Router, service_core::error::AppError> {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                        tracing::error!("Invalid CORS origin '{}': {}. Using fallback.", o, e);
                        axum::http::HeaderValue::from_static("http://localhost:3000")
                    })
                })
                .collect::<Vec<axum::http::HeaderValue>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static("x-user-id"),
            axum::http::header::HeaderName::from_static("x-user-email"),
            axum::http::header::HeaderName::from_static("x-org-id"),
            axum::http::header::HeaderName::from_static("x-request-id"),
        ]);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/context", get(handlers::context::get_context))
        .route(
            "/integrations/:key",
            get(handlers::integrations::get_settings)
                .put(handlers::integrations::set_settings)
                .delete(handlers::integrations::delete_settings),
        )
        .route(
            "/integrations/:key/test",
            post(handlers::integrations::test_connection),
        )
        .route("/audit-log", get(handlers::audit::query_audit_log))
        .route("/members/:user_id", delete(handlers::members::remove_member))
        .with_state(state.clone())
        // Resolve the caller once per request, before any handler runs
        .layer(from_fn_with_state(
            state,
            middleware::identity::identity_middleware,
        ))
        // Correlation id + request span
        .layer(from_fn(request_id_middleware))
        // Security headers on every response
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}
