//! Audit log query endpoint. Admin-only, always scoped to the caller's
//! active organization.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::Caller;
use crate::models::{AuditAction, AuditEntityKind, AuditPage, AuditQuery, OrgRole};
use crate::services::authz::require_role;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogParams {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn query_audit_log(
    State(state): State<AppState>,
    Query(params): Query<AuditLogParams>,
    caller: Caller,
) -> Result<Json<AuditPage>, AppError> {
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Admin)?;

    let action = params
        .action
        .as_deref()
        .map(|raw| {
            raw.parse::<AuditAction>()
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))
        })
        .transpose()?;
    let entity_kind = params
        .entity_type
        .as_deref()
        .map(|raw| {
            raw.parse::<AuditEntityKind>()
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))
        })
        .transpose()?;

    let query = AuditQuery {
        // Cross-tenant queries do not exist on this surface.
        organization_id: Some(auth.organization_id),
        actor_user_id: params.actor,
        action,
        entity_kind,
        entity_id: params.entity_id,
        from_utc: params.from,
        to_utc: params.to,
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset: params.offset.unwrap_or(0).max(0),
    };

    let page = state.audit.query(&query).await?;
    Ok(Json(page))
}
