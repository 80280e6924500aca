use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::OrgRole;

/// A user's role within one organization. At most one row per
/// (user, organization) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: OrgRole,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: OrgRole) -> Self {
        Self {
            user_id,
            organization_id,
            role,
            created_utc: Utc::now(),
        }
    }
}

/// Membership joined with its organization, as returned by org resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMembership {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: OrgRole,
}
