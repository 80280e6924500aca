//! Integration settings endpoints: masked reads, admin-gated writes, and
//! connection tests. Thin adapters over [`IntegrationService`].

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use validator::{Validate, ValidationError};

use crate::middleware::Caller;
use crate::models::{IntegrationKey, MaskedSettings, OrgRole, TestResult};
use crate::services::authz::require_role;
use crate::AppState;

fn parse_key(raw: &str) -> Result<IntegrationKey, AppError> {
    raw.parse::<IntegrationKey>()
        .map_err(|_| AppError::NotFound(anyhow::anyhow!("unknown integration '{}'", raw)))
}

/// Any member may see the masked effective settings.
pub async fn get_settings(
    State(state): State<AppState>,
    Path(key): Path<String>,
    caller: Caller,
) -> Result<Json<MaskedSettings>, AppError> {
    let key = parse_key(&key)?;
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Staff)?;
    let masked = state.integrations.get(auth.organization_id, key).await?;
    Ok(Json(masked))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetSettingsRequest {
    #[validate(custom(function = "validate_field_shape"))]
    pub fields: BTreeMap<String, String>,
}

fn validate_field_shape(fields: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if fields.len() > 32 {
        return Err(ValidationError::new("too_many_fields"));
    }
    if fields.keys().any(|name| name.is_empty() || name.len() > 64) {
        return Err(ValidationError::new("bad_field_name"));
    }
    Ok(())
}

pub async fn set_settings(
    State(state): State<AppState>,
    Path(key): Path<String>,
    caller: Caller,
    Json(request): Json<SetSettingsRequest>,
) -> Result<Json<MaskedSettings>, AppError> {
    let key = parse_key(&key)?;
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Admin)?;
    request.validate()?;

    let audit_ctx = auth.audit_context(&caller.meta);
    let masked = state
        .integrations
        .set(&auth, key, request.fields, &audit_ctx)
        .await?;
    Ok(Json(masked))
}

pub async fn delete_settings(
    State(state): State<AppState>,
    Path(key): Path<String>,
    caller: Caller,
) -> Result<StatusCode, AppError> {
    let key = parse_key(&key)?;
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Admin)?;

    let audit_ctx = auth.audit_context(&caller.meta);
    state.integrations.delete(&auth, key, &audit_ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_connection(
    State(state): State<AppState>,
    Path(key): Path<String>,
    caller: Caller,
) -> Result<Json<TestResult>, AppError> {
    let key = parse_key(&key)?;
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Admin)?;

    let audit_ctx = auth.audit_context(&caller.meta);
    let result = state
        .integrations
        .test_connection(&auth, key, &audit_ctx)
        .await?;
    Ok(Json(result))
}
