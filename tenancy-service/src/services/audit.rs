//! Audit trail service: best-effort recording and filtered queries.

use std::sync::Arc;

use service_core::error::AppError;

use crate::models::{AuditContext, AuditDraft, AuditLogEntry, AuditPage, AuditQuery};
use crate::services::store::AuditStore;

#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry for a completed privileged action.
    ///
    /// Called strictly after the primary state change committed. A failed
    /// write is logged and swallowed: audit is best-effort and must never
    /// undo or fail the operation it describes.
    pub async fn record(&self, draft: AuditDraft, ctx: &AuditContext) {
        let entry = AuditLogEntry::from_draft(draft, ctx);
        if let Err(e) = self.store.append(&entry).await {
            tracing::error!(
                error = %e,
                action = %entry.action_key,
                organization_id = ?entry.organization_id,
                "failed to write audit log entry"
            );
        }
    }

    /// Filtered audit query, newest first.
    pub async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AppError> {
        self.store.query(query).await
    }
}
