//! Org context resolution: which organizations a user belongs to and which
//! one the request is acting as.

use std::sync::Arc;

use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{OrgMembership, OrgRole};
use crate::services::store::MembershipStore;

/// The caller's resolved tenancy for one request. Resolved once by the
/// identity middleware and carried in request extensions, so every read
/// within a request sees the same snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrgContext {
    pub memberships: Vec<OrgMembership>,
    pub active: Option<ActiveOrg>,
}

/// The organization a request acts as, with the caller's role in it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActiveOrg {
    pub organization_id: Uuid,
    pub role: OrgRole,
}

impl OrgContext {
    /// Zero memberships means "needs onboarding", not an error.
    pub fn needs_onboarding(&self) -> bool {
        self.memberships.is_empty()
    }
}

/// Resolves org context from the membership store. Read-only.
#[derive(Clone)]
pub struct OrgContextResolver {
    store: Arc<dyn MembershipStore>,
}

impl OrgContextResolver {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Resolve the caller's organizations and pick the active one.
    ///
    /// Active-org precedence: the explicit request hint when the caller is a
    /// member of it, else the user's most-recently-used organization, else
    /// the first membership by organization id ascending.
    pub async fn resolve(
        &self,
        user_id: Uuid,
        org_hint: Option<Uuid>,
    ) -> Result<OrgContext, AppError> {
        let user = self.store.find_user(user_id).await?;
        let mut memberships = self.store.memberships_for_user(user_id).await?;

        // Legacy single-org users predate membership rows; synthesize one
        // membership from the old columns so they keep working.
        if memberships.is_empty() {
            if let Some(user) = &user {
                if let (Some(org_id), Some(raw_role)) =
                    (user.legacy_organization_id, user.legacy_role.as_deref())
                {
                    match raw_role.parse::<OrgRole>() {
                        Ok(role) => {
                            let organization_name = self
                                .store
                                .find_organization(org_id)
                                .await?
                                .map(|o| o.name)
                                .unwrap_or_default();
                            memberships.push(OrgMembership {
                                organization_id: org_id,
                                organization_name,
                                role,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(
                                user_id = %user_id,
                                error = %e,
                                "ignoring unparseable legacy role"
                            );
                        }
                    }
                }
            }
        }

        let find = |wanted: Uuid| {
            memberships
                .iter()
                .find(|m| m.organization_id == wanted)
                .map(|m| ActiveOrg {
                    organization_id: m.organization_id,
                    role: m.role,
                })
        };

        let active = org_hint
            .and_then(|id| find(id))
            .or_else(|| {
                user.as_ref()
                    .and_then(|u| u.last_org_id)
                    .and_then(|id| find(id))
            })
            .or_else(|| {
                memberships.first().map(|m| ActiveOrg {
                    organization_id: m.organization_id,
                    role: m.role,
                })
            });

        Ok(OrgContext {
            memberships,
            active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Membership, Organization, User};
    use crate::services::store::InMemoryStore;

    fn seeded() -> (Arc<InMemoryStore>, Uuid, Uuid, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let user = User::new("pat@example.com".to_string());
        let user_id = user.user_id;

        // Two orgs with ids in a known ascending order.
        let mut org_a = Organization::new("Alpha Estates".to_string());
        let mut org_b = Organization::new("Beta Rentals".to_string());
        org_a.organization_id = Uuid::from_u128(1);
        org_b.organization_id = Uuid::from_u128(2);
        let (a, b) = (org_a.organization_id, org_b.organization_id);

        store.insert_user(user);
        store.insert_organization(org_a);
        store.insert_organization(org_b);
        store.insert_membership(Membership::new(user_id, a, OrgRole::Admin));
        store.insert_membership(Membership::new(user_id, b, OrgRole::Staff));
        (store, user_id, a, b)
    }

    #[tokio::test]
    async fn hint_selects_the_active_org() {
        let (store, user_id, _a, b) = seeded();
        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, Some(b)).await.unwrap();
        let active = ctx.active.unwrap();
        assert_eq!(active.organization_id, b);
        assert_eq!(active.role, OrgRole::Staff);
    }

    #[tokio::test]
    async fn hint_for_foreign_org_is_ignored() {
        let (store, user_id, a, _b) = seeded();
        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, Some(Uuid::from_u128(99))).await.unwrap();
        // Falls through to the first membership by org id.
        assert_eq!(ctx.active.unwrap().organization_id, a);
    }

    #[tokio::test]
    async fn most_recently_used_org_wins_without_a_hint() {
        let (store, user_id, _a, b) = seeded();
        let mut user = fetch_user(&store, user_id).await;
        user.last_org_id = Some(b);
        store.insert_user(user);

        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, None).await.unwrap();
        assert_eq!(ctx.active.unwrap().organization_id, b);
    }

    #[tokio::test]
    async fn first_membership_by_org_id_is_the_default() {
        let (store, user_id, a, _b) = seeded();
        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, None).await.unwrap();
        assert_eq!(ctx.active.unwrap().organization_id, a);
        assert_eq!(ctx.memberships.len(), 2);
    }

    #[tokio::test]
    async fn zero_memberships_is_onboarding_not_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let user = User::new("new@example.com".to_string());
        let user_id = user.user_id;
        store.insert_user(user);

        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, None).await.unwrap();
        assert!(ctx.needs_onboarding());
        assert!(ctx.active.is_none());
    }

    #[tokio::test]
    async fn legacy_columns_back_fill_a_membership() {
        let store = Arc::new(InMemoryStore::new());
        let org = Organization::new("Legacy Props".to_string());
        let org_id = org.organization_id;
        let mut user = User::new("old@example.com".to_string());
        user.legacy_organization_id = Some(org_id);
        user.legacy_role = Some("owner".to_string());
        let user_id = user.user_id;
        store.insert_organization(org);
        store.insert_user(user);

        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, None).await.unwrap();
        let active = ctx.active.unwrap();
        assert_eq!(active.organization_id, org_id);
        assert_eq!(active.role, OrgRole::Owner);
        assert_eq!(ctx.memberships[0].organization_name, "Legacy Props");
    }

    #[tokio::test]
    async fn membership_rows_shadow_legacy_columns() {
        let (store, user_id, a, _b) = seeded();
        let mut user = fetch_user(&store, user_id).await;
        user.legacy_organization_id = Some(Uuid::from_u128(77));
        user.legacy_role = Some("owner".to_string());
        store.insert_user(user);

        let resolver = OrgContextResolver::new(store);
        let ctx = resolver.resolve(user_id, None).await.unwrap();
        assert_eq!(ctx.active.unwrap().organization_id, a);
        assert_eq!(ctx.memberships.len(), 2);
    }

    async fn fetch_user(store: &Arc<InMemoryStore>, user_id: Uuid) -> User {
        use crate::services::store::MembershipStore;
        store.find_user(user_id).await.unwrap().unwrap()
    }
}
