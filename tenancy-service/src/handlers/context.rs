//! Org-context endpoint: who am I acting as, and where.

use axum::Json;
use serde::Serialize;
use service_core::error::AppError;

use crate::middleware::Caller;
use crate::models::OrgMembership;
use crate::services::org_context::ActiveOrg;

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub memberships: Vec<OrgMembership>,
    pub active: Option<ActiveOrg>,
    /// True when the user belongs to no organization yet. The UI routes
    /// this to onboarding rather than an error page.
    pub needs_onboarding: bool,
}

pub async fn get_context(caller: Caller) -> Result<Json<ContextResponse>, AppError> {
    if caller.identity.is_none() {
        return Err(AppError::Unauthenticated(anyhow::anyhow!(
            "authentication required"
        )));
    }

    Ok(Json(ContextResponse {
        needs_onboarding: caller.context.needs_onboarding(),
        active: caller.context.active,
        memberships: caller.context.memberships,
    }))
}
