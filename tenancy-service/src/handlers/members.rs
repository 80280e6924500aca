//! Membership removal endpoint. The guardrails live in
//! [`MemberAdminService`]; this is the transport shim.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::Caller;
use crate::models::OrgRole;
use crate::services::authz::require_role;
use crate::AppState;

pub async fn remove_member(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    caller: Caller,
) -> Result<StatusCode, AppError> {
    let auth = require_role(caller.identity.as_ref(), &caller.context, OrgRole::Admin)?;

    let audit_ctx = auth.audit_context(&caller.meta);
    state
        .members
        .remove_member(&auth, user_id, &audit_ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
