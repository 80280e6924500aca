//! Audit log model - immutable records of privileged actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audited action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MemberRemoved,
    IntegrationSettingsUpdated,
    IntegrationSettingsDeleted,
    IntegrationConnectionTested,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::MemberRemoved => "member_removed",
            AuditAction::IntegrationSettingsUpdated => "integration_settings_updated",
            AuditAction::IntegrationSettingsDeleted => "integration_settings_deleted",
            AuditAction::IntegrationConnectionTested => "integration_connection_tested",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member_removed" => Ok(AuditAction::MemberRemoved),
            "integration_settings_updated" => Ok(AuditAction::IntegrationSettingsUpdated),
            "integration_settings_deleted" => Ok(AuditAction::IntegrationSettingsDeleted),
            "integration_connection_tested" => Ok(AuditAction::IntegrationConnectionTested),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Kinds of entities an audit entry can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityKind {
    Membership,
    IntegrationSettings,
}

impl AuditEntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntityKind::Membership => "membership",
            AuditEntityKind::IntegrationSettings => "integration_settings",
        }
    }
}

impl std::str::FromStr for AuditEntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "membership" => Ok(AuditEntityKind::Membership),
            "integration_settings" => Ok(AuditEntityKind::IntegrationSettings),
            _ => Err(format!("Unknown audit entity kind: {}", s)),
        }
    }
}

/// One immutable audit record. Never updated or deleted by the application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// None for cross-tenant/system events.
    pub organization_id: Option<Uuid>,
    /// None for system actions.
    pub actor_user_id: Option<Uuid>,
    /// Denormalized so entries survive user deletion.
    pub actor_email: Option<String>,
    pub action_key: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// The semantic half of an audit entry, supplied by the operation being
/// recorded. Ambient actor/network fields come from [`AuditContext`].
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub action: AuditAction,
    pub entity_kind: Option<AuditEntityKind>,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl AuditDraft {
    pub fn new(action: AuditAction, description: impl Into<String>) -> Self {
        Self {
            action,
            entity_kind: None,
            entity_id: None,
            description: description.into(),
            metadata: None,
        }
    }

    pub fn entity(mut self, kind: AuditEntityKind, id: Option<Uuid>) -> Self {
        self.entity_kind = Some(kind);
        self.entity_id = id;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Ambient context merged into every entry recorded during a request.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub actor_user_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub organization_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditLogEntry {
    pub fn from_draft(draft: AuditDraft, ctx: &AuditContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: ctx.organization_id,
            actor_user_id: ctx.actor_user_id,
            actor_email: ctx.actor_email.clone(),
            action_key: draft.action.as_str().to_string(),
            entity_kind: draft.entity_kind.map(|k| k.as_str().to_string()),
            entity_id: draft.entity_id,
            description: draft.description,
            metadata: draft.metadata,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            created_utc: Utc::now(),
        }
    }
}

/// Filter set for audit queries. Filters combine with AND; the time range is
/// inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub organization_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub entity_kind: Option<AuditEntityKind>,
    pub entity_id: Option<Uuid>,
    pub from_utc: Option<DateTime<Utc>>,
    pub to_utc: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditQuery {
    pub fn for_organization(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
            limit: 50,
            ..Default::default()
        }
    }
}

/// One page of audit results, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: i64,
}
