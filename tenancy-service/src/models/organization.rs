use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An organization (tenant). All audit entries, integration settings, and
/// role memberships are scoped to exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub organization_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            organization_id: Uuid::new_v4(),
            name,
            created_utc: now,
            updated_utc: now,
        }
    }
}
