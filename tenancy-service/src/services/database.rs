//! PostgreSQL store for memberships, integration settings, and the audit
//! trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, AuditPage, AuditQuery, IntegrationKey, IntegrationSettingsRecord, OrgMembership,
    OrgRole, Organization, User,
};
use crate::services::store::{AuditStore, MembershipStore, SettingsStore};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}

fn parse_role(raw: &str) -> Result<OrgRole, AppError> {
    raw.parse::<OrgRole>()
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Corrupt membership row: {}", e)))
}

#[async_trait]
impl MembershipStore for Database {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<OrgMembership>, AppError> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            r#"
            SELECT m.organization_id, o.name, m.role
            FROM memberships m
            JOIN organizations o ON o.organization_id = m.organization_id
            WHERE m.user_id = $1
            ORDER BY m.organization_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        rows.into_iter()
            .map(|(organization_id, organization_name, role)| {
                Ok(OrgMembership {
                    organization_id,
                    organization_name,
                    role: parse_role(&role)?,
                })
            })
            .collect()
    }

    async fn role_in_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgRole>, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT role FROM memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        row.map(|(role,)| parse_role(&role)).transpose()
    }

    async fn count_owners(&self, organization_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE organization_id = $1 AND role = 'owner'",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(count)
    }

    async fn remove_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn find_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<Option<IntegrationSettingsRecord>, AppError> {
        sqlx::query_as::<_, IntegrationSettingsRecord>(
            "SELECT * FROM integration_settings WHERE organization_id = $1 AND integration_key = $2",
        )
        .bind(organization_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn upsert_settings(&self, record: &IntegrationSettingsRecord) -> Result<(), AppError> {
        // Single-statement upsert: the record is fully persisted or not at
        // all, and a replacement resets the verification columns.
        sqlx::query(
            r#"
            INSERT INTO integration_settings
                (organization_id, integration_key, fields, verified, verified_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, NULL, NULL, $4, $4)
            ON CONFLICT (organization_id, integration_key)
            DO UPDATE SET
                fields = EXCLUDED.fields,
                verified = NULL,
                verified_utc = NULL,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(record.organization_id)
        .bind(&record.integration_key)
        .bind(&record.fields)
        .bind(record.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn delete_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM integration_settings WHERE organization_id = $1 AND integration_key = $2",
        )
        .bind(organization_id)
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_verification(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE integration_settings
            SET verified = $3, verified_utc = $4
            WHERE organization_id = $1 AND integration_key = $2
            "#,
        )
        .bind(organization_id)
        .bind(key.as_str())
        .bind(verified)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for Database {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, organization_id, actor_user_id, actor_email, action_key, entity_kind,
                 entity_id, description, metadata, ip_address, user_agent, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.id)
        .bind(entry.organization_id)
        .bind(entry.actor_user_id)
        .bind(&entry.actor_email)
        .bind(&entry.action_key)
        .bind(&entry.entity_kind)
        .bind(entry.entity_id)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AppError> {
        // Build dynamic WHERE clause
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_idx = 1;

        if query.organization_id.is_some() {
            conditions.push(format!("organization_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.actor_user_id.is_some() {
            conditions.push(format!("actor_user_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.action.is_some() {
            conditions.push(format!("action_key = ${}", param_idx));
            param_idx += 1;
        }
        if query.entity_kind.is_some() {
            conditions.push(format!("entity_kind = ${}", param_idx));
            param_idx += 1;
        }
        if query.entity_id.is_some() {
            conditions.push(format!("entity_id = ${}", param_idx));
            param_idx += 1;
        }
        if query.from_utc.is_some() {
            conditions.push(format!("created_utc >= ${}", param_idx));
            param_idx += 1;
        }
        if query.to_utc.is_some() {
            conditions.push(format!("created_utc <= ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM audit_log WHERE {}", where_clause);
        let data_query = format!(
            "SELECT * FROM audit_log WHERE {} ORDER BY created_utc DESC LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        macro_rules! bind_filters {
            ($q:expr) => {{
                let mut q = $q;
                if let Some(org) = query.organization_id {
                    q = q.bind(org);
                }
                if let Some(actor) = query.actor_user_id {
                    q = q.bind(actor);
                }
                if let Some(action) = query.action {
                    q = q.bind(action.as_str());
                }
                if let Some(kind) = query.entity_kind {
                    q = q.bind(kind.as_str());
                }
                if let Some(entity_id) = query.entity_id {
                    q = q.bind(entity_id);
                }
                if let Some(from) = query.from_utc {
                    q = q.bind(from);
                }
                if let Some(to) = query.to_utc {
                    q = q.bind(to);
                }
                q
            }};
        }

        let (total,) = bind_filters!(sqlx::query_as::<_, (i64,)>(&count_query))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let entries = bind_filters!(sqlx::query_as::<_, AuditLogEntry>(&data_query))
            .bind(if query.limit > 0 { query.limit } else { 50 })
            .bind(query.offset.max(0))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(AuditPage { entries, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn health_check_pings_database() {
        let pool = PgPool::connect("postgres://localhost/tenancy_test")
            .await
            .expect("connect");
        let db = Database::new(pool);
        assert!(db.health_check().await.is_ok());
    }
}
