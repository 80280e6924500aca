//! Persistence seams for memberships, integration settings, and the audit
//! trail, plus an in-memory implementation used by the test suite.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, AuditPage, AuditQuery, IntegrationKey, IntegrationSettingsRecord, Membership,
    OrgMembership, OrgRole, Organization, User,
};

/// Read access to users, organizations, and role memberships. Membership
/// rows are mutated through [`Self::remove_membership`] only; creation and
/// role changes belong to the onboarding/invitation flows upstream.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError>;

    /// All memberships for a user, ordered by organization id ascending.
    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<OrgMembership>, AppError>;

    async fn role_in_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgRole>, AppError>;

    async fn count_owners(&self, organization_id: Uuid) -> Result<i64, AppError>;

    /// Remove one membership row. Returns whether a row existed.
    async fn remove_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError>;
}

/// Storage for per-organization integration settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn find_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<Option<IntegrationSettingsRecord>, AppError>;

    /// Insert or fully replace the record for (organization, key).
    async fn upsert_settings(&self, record: &IntegrationSettingsRecord) -> Result<(), AppError>;

    /// Delete the record. Returns whether a row existed.
    async fn delete_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<bool, AppError>;

    /// Stamp the cached verification outcome on an existing record. A
    /// missing record is a no-op, not an error.
    async fn mark_verification(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Append-only audit storage. No update or delete exists on this interface.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError>;

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AppError>;
}

/// In-memory store backing the test suite, so integration-style tests run
/// without PostgreSQL. Implements all three store seams.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<InMemoryInner>,
}

#[derive(Default)]
struct InMemoryInner {
    users: HashMap<Uuid, User>,
    organizations: HashMap<Uuid, Organization>,
    memberships: Vec<Membership>,
    settings: HashMap<(Uuid, IntegrationKey), IntegrationSettingsRecord>,
    audit: Vec<AuditLogEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.inner.lock().unwrap().users.insert(user.user_id, user);
    }

    pub fn insert_organization(&self, organization: Organization) {
        self.inner
            .lock()
            .unwrap()
            .organizations
            .insert(organization.organization_id, organization);
    }

    pub fn insert_membership(&self, membership: Membership) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .memberships
            .retain(|m| !(m.user_id == membership.user_id && m.organization_id == membership.organization_id));
        inner.memberships.push(membership);
    }

    /// Test hook: number of audit entries recorded so far.
    pub fn audit_len(&self) -> usize {
        self.inner.lock().unwrap().audit.len()
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .organizations
            .get(&organization_id)
            .cloned())
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<OrgMembership>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<OrgMembership> = inner
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| OrgMembership {
                organization_id: m.organization_id,
                organization_name: inner
                    .organizations
                    .get(&m.organization_id)
                    .map(|o| o.name.clone())
                    .unwrap_or_default(),
                role: m.role,
            })
            .collect();
        rows.sort_by_key(|m| m.organization_id);
        Ok(rows)
    }

    async fn role_in_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgRole>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .map(|m| m.role))
    }

    async fn count_owners(&self, organization_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|m| m.organization_id == organization_id && m.role == OrgRole::Owner)
            .count() as i64)
    }

    async fn remove_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.memberships.len();
        inner
            .memberships
            .retain(|m| !(m.user_id == user_id && m.organization_id == organization_id));
        Ok(inner.memberships.len() < before)
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn find_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<Option<IntegrationSettingsRecord>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .settings
            .get(&(organization_id, key))
            .cloned())
    }

    async fn upsert_settings(&self, record: &IntegrationSettingsRecord) -> Result<(), AppError> {
        let key: IntegrationKey = record
            .integration_key
            .parse()
            .map_err(|e: String| AppError::InternalError(anyhow::anyhow!(e)))?;
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert((record.organization_id, key), record.clone());
        Ok(())
    }

    async fn delete_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<bool, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .settings
            .remove(&(organization_id, key))
            .is_some())
    }

    async fn mark_verification(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(record) = self
            .inner
            .lock()
            .unwrap()
            .settings
            .get_mut(&(organization_id, key))
        {
            record.verified = Some(verified);
            record.verified_utc = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        self.inner.lock().unwrap().audit.push(entry.clone());
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<AuditLogEntry> = inner
            .audit
            .iter()
            .filter(|e| {
                query
                    .organization_id
                    .map_or(true, |org| e.organization_id == Some(org))
                    && query
                        .actor_user_id
                        .map_or(true, |actor| e.actor_user_id == Some(actor))
                    && query
                        .action
                        .map_or(true, |action| e.action_key == action.as_str())
                    && query
                        .entity_kind
                        .map_or(true, |kind| e.entity_kind.as_deref() == Some(kind.as_str()))
                    && query.entity_id.map_or(true, |id| e.entity_id == Some(id))
                    && query.from_utc.map_or(true, |from| e.created_utc >= from)
                    && query.to_utc.map_or(true, |to| e.created_utc <= to)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));

        let total = matches.len() as i64;
        let offset = query.offset.max(0) as usize;
        let limit = if query.limit > 0 { query.limit as usize } else { 50 };
        let entries = matches.into_iter().skip(offset).take(limit).collect();
        Ok(AuditPage { entries, total })
    }
}

/// Test fixture map helper.
pub fn field_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
