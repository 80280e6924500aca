//! Membership mutation guardrails. The row itself belongs to the membership
//! store; this layer enforces who may remove whom and keeps the audit trail.

use std::sync::Arc;

use anyhow::anyhow;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{AuditAction, AuditContext, AuditDraft, AuditEntityKind, OrgRole};
use crate::services::audit::AuditService;
use crate::services::authz::AuthContext;
use crate::services::store::MembershipStore;

#[derive(Clone)]
pub struct MemberAdminService {
    store: Arc<dyn MembershipStore>,
    audit: AuditService,
}

impl MemberAdminService {
    pub fn new(store: Arc<dyn MembershipStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Remove a member from the caller's active organization.
    ///
    /// Admin may remove non-owners; removing an owner takes an owner. The
    /// last owner can never be removed - an organization without an owner is
    /// unrecoverable.
    pub async fn remove_member(
        &self,
        auth: &AuthContext,
        target_user_id: Uuid,
        audit_ctx: &AuditContext,
    ) -> Result<(), AppError> {
        let organization_id = auth.organization_id;

        let target_role = self
            .store
            .role_in_org(target_user_id, organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("no such member in this organization")))?;

        if target_role == OrgRole::Owner {
            if !auth.role.at_least(OrgRole::Owner) {
                return Err(AppError::Forbidden(anyhow!("not authorized")));
            }
            let owners = self.store.count_owners(organization_id).await?;
            if owners <= 1 {
                return Err(AppError::Conflict(anyhow!(
                    "cannot remove the last owner of an organization"
                )));
            }
        }

        let removed = self
            .store
            .remove_membership(target_user_id, organization_id)
            .await?;
        if !removed {
            // Raced with another removal; the membership is already gone.
            return Err(AppError::NotFound(anyhow!("no such member in this organization")));
        }

        self.audit
            .record(
                AuditDraft::new(
                    AuditAction::MemberRemoved,
                    format!("removed {} member", target_role),
                )
                .entity(AuditEntityKind::Membership, Some(target_user_id))
                .metadata(serde_json::json!({ "removed_role": target_role.as_str() })),
                audit_ctx,
            )
            .await;
        Ok(())
    }
}
