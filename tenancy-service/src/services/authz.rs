//! Authorization engine: the single checkpoint for privileged operations.
//!
//! `require_role` is pure and synchronous over the org context the identity
//! middleware already resolved; it performs no I/O and records no audit
//! entries, so read-only checks stay out of the audit trail.

use anyhow::anyhow;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::identity::{RequestMeta, SessionIdentity};
use crate::models::{AuditContext, OrgRole};
use crate::services::org_context::OrgContext;

/// Proof of a passed authorization check.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub actor_email: String,
    pub organization_id: Uuid,
    pub role: OrgRole,
}

impl AuthContext {
    /// Ambient audit fields for operations performed under this context.
    pub fn audit_context(&self, meta: &RequestMeta) -> AuditContext {
        AuditContext {
            actor_user_id: Some(self.user_id),
            actor_email: Some(self.actor_email.clone()),
            organization_id: Some(self.organization_id),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        }
    }
}

/// Refused authorization. The internal reason is logged but never shown:
/// callers get one generic message, so "role too low" is indistinguishable
/// from "no such organization".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    reason: DenyReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    NoActiveOrganization,
    InsufficientRole,
}

impl Denied {
    fn new(reason: DenyReason) -> Self {
        Self { reason }
    }

    pub fn reason(&self) -> DenyReason {
        self.reason
    }

    pub fn message(&self) -> &'static str {
        match self.reason {
            DenyReason::Unauthenticated => "authentication required",
            _ => "not authorized",
        }
    }
}

impl From<Denied> for AppError {
    fn from(denied: Denied) -> Self {
        tracing::debug!(reason = ?denied.reason, "authorization denied");
        match denied.reason {
            DenyReason::Unauthenticated => AppError::Unauthenticated(anyhow!(denied.message())),
            _ => AppError::Forbidden(anyhow!(denied.message())),
        }
    }
}

/// Check that the caller holds at least `min_role` in their active
/// organization. Never panics and never returns an `AppError`: every refusal
/// is a [`Denied`] value.
pub fn require_role(
    identity: Option<&SessionIdentity>,
    context: &OrgContext,
    min_role: OrgRole,
) -> Result<AuthContext, Denied> {
    let identity = identity.ok_or_else(|| Denied::new(DenyReason::Unauthenticated))?;

    let active = context
        .active
        .ok_or_else(|| Denied::new(DenyReason::NoActiveOrganization))?;

    if !active.role.at_least(min_role) {
        return Err(Denied::new(DenyReason::InsufficientRole));
    }

    Ok(AuthContext {
        user_id: identity.user_id,
        actor_email: identity.email.clone(),
        organization_id: active.organization_id,
        role: active.role,
    })
}
