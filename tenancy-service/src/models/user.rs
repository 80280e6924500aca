use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Platform user. Authentication is handled by the identity provider; this
/// row only carries what org resolution needs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    /// Pre-multi-tenant organization column. Consulted only when the user
    /// has no membership rows.
    pub legacy_organization_id: Option<Uuid>,
    /// Pre-multi-tenant role column, paired with `legacy_organization_id`.
    pub legacy_role: Option<String>,
    /// Most-recently-used organization. Written by the session layer,
    /// read-only here.
    pub last_org_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn new(email: String) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            legacy_organization_id: None,
            legacy_role: None,
            last_org_id: None,
            created_utc: Utc::now(),
        }
    }
}
