//! Integration credential store: per-organization provider settings with
//! encryption at rest, masked reads, environment-default fallback, and
//! cached live-connection verification.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    AuditAction, AuditDraft, AuditEntityKind, EnvDefaults, IntegrationKey,
    IntegrationSettingsRecord, MaskedSettings, MaskedValue, ResolvedSettings, SettingsState,
    TestResult,
};
use crate::services::audit::AuditService;
use crate::services::authz::AuthContext;
use crate::services::probes::ConnectionProbe;
use crate::services::secrets::{mask_secret, SecretCodec};
use crate::services::store::SettingsStore;
use crate::services::verification_cache::VerificationCache;

/// Upper bound on one submitted field value. Anything larger is not a
/// credential.
const MAX_FIELD_LEN: usize = 2048;

fn validation_error(code: &'static str, message: String) -> AppError {
    let mut error = validator::ValidationError::new(code);
    error.message = Some(message.into());
    let mut errors = validator::ValidationErrors::new();
    errors.add("fields", error);
    AppError::ValidationError(errors)
}

#[derive(Clone)]
pub struct IntegrationService {
    store: Arc<dyn SettingsStore>,
    audit: AuditService,
    codec: SecretCodec,
    env_defaults: Arc<EnvDefaults>,
    cache: Arc<VerificationCache>,
    probe: Arc<dyn ConnectionProbe>,
    probe_timeout: Duration,
}

impl IntegrationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn SettingsStore>,
        audit: AuditService,
        codec: SecretCodec,
        env_defaults: Arc<EnvDefaults>,
        cache: Arc<VerificationCache>,
        probe: Arc<dyn ConnectionProbe>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            codec,
            env_defaults,
            cache,
            probe,
            probe_timeout,
        }
    }

    /// Effective configuration with every secret masked. Never returns a raw
    /// secret value and never writes an audit entry.
    pub async fn get(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<MaskedSettings, AppError> {
        let record = self.store.find_settings(organization_id, key).await?;
        let org_fields = record.as_ref().map(|r| r.field_map()).unwrap_or_default();

        let mut fields = BTreeMap::new();
        for spec in key.schema() {
            let effective = self.effective_field(key, &org_fields, spec.name, spec.secret)?;
            let masked = match effective {
                None => MaskedValue::NotConfigured,
                Some(value) if spec.secret => MaskedValue::Secret {
                    preview: mask_secret(&value),
                },
                Some(value) => MaskedValue::Plain { value },
            };
            fields.insert(spec.name.to_string(), masked);
        }

        let state = match &record {
            None => SettingsState::Unconfigured,
            Some(r) => match r.verified {
                Some(true) => SettingsState::Verified,
                Some(false) => SettingsState::Failed,
                None => SettingsState::Configured,
            },
        };

        Ok(MaskedSettings {
            integration_key: key,
            state,
            has_org_settings: record.is_some(),
            verified_utc: record.as_ref().and_then(|r| r.verified_utc),
            fields,
        })
    }

    /// Whether the organization has its own record, independent of
    /// environment defaults.
    pub async fn has_settings(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<bool, AppError> {
        Ok(self.store.find_settings(organization_id, key).await?.is_some())
    }

    /// Replace the organization's settings for one integration.
    ///
    /// Requires a passed admin check (`auth`). Secret fields are encrypted
    /// before they reach storage; the previous record is replaced wholesale;
    /// any cached verification is invalidated after the write; one audit
    /// entry is recorded, with field names but never values in its metadata.
    pub async fn set(
        &self,
        auth: &AuthContext,
        key: IntegrationKey,
        fields: BTreeMap<String, String>,
        audit_ctx: &crate::models::AuditContext,
    ) -> Result<MaskedSettings, AppError> {
        let mut stored = BTreeMap::new();
        for (name, value) in &fields {
            let spec = key.field(name).ok_or_else(|| {
                validation_error(
                    "unknown_field",
                    format!("unknown field '{}' for integration '{}'", name, key),
                )
            })?;
            if value.len() > MAX_FIELD_LEN {
                return Err(validation_error(
                    "field_too_long",
                    format!("field '{}' exceeds {} bytes", name, MAX_FIELD_LEN),
                ));
            }
            let trimmed = value.trim();
            if trimmed.is_empty() {
                // Blank submissions mean "fall back to the environment
                // default for this field"; nothing is stored.
                continue;
            }
            let stored_value = if spec.secret {
                self.codec
                    .encrypt(trimmed)
                    .map_err(|e| AppError::InternalError(anyhow!(e)))?
            } else {
                trimmed.to_string()
            };
            stored.insert(name.clone(), stored_value);
        }

        if stored.is_empty() {
            return Err(validation_error(
                "no_fields",
                "at least one non-blank field is required".to_string(),
            ));
        }

        let record = IntegrationSettingsRecord::new(auth.organization_id, key, stored);
        self.store.upsert_settings(&record).await?;
        // Invalidation is deliberately the last writer after the credential
        // write: a concurrent test started against the old values can no
        // longer publish.
        self.cache.invalidate(auth.organization_id, key);

        self.audit
            .record(
                AuditDraft::new(
                    AuditAction::IntegrationSettingsUpdated,
                    format!("updated {} integration settings", key),
                )
                .entity(AuditEntityKind::IntegrationSettings, None)
                .metadata(serde_json::json!({
                    "integration": key.as_str(),
                    "fields": fields.keys().collect::<Vec<_>>(),
                })),
                audit_ctx,
            )
            .await;

        self.get(auth.organization_id, key).await
    }

    /// Remove the organization's record, reverting to environment defaults.
    pub async fn delete(
        &self,
        auth: &AuthContext,
        key: IntegrationKey,
        audit_ctx: &crate::models::AuditContext,
    ) -> Result<(), AppError> {
        let removed = self.store.delete_settings(auth.organization_id, key).await?;
        if !removed {
            return Err(AppError::NotFound(anyhow!(
                "no {} settings configured for this organization",
                key
            )));
        }
        self.cache.invalidate(auth.organization_id, key);

        self.audit
            .record(
                AuditDraft::new(
                    AuditAction::IntegrationSettingsDeleted,
                    format!("deleted {} integration settings", key),
                )
                .entity(AuditEntityKind::IntegrationSettings, None)
                .metadata(serde_json::json!({ "integration": key.as_str() })),
                audit_ctx,
            )
            .await;
        Ok(())
    }

    /// Run a live handshake against the provider with the effective
    /// (decrypted) configuration.
    ///
    /// Provider-side failures come back as a failed [`TestResult`]; only
    /// programming/storage errors surface as `Err`. A success is published
    /// to the verification cache unless the credentials changed while the
    /// handshake ran.
    pub async fn test_connection(
        &self,
        auth: &AuthContext,
        key: IntegrationKey,
        audit_ctx: &crate::models::AuditContext,
    ) -> Result<TestResult, AppError> {
        let organization_id = auth.organization_id;
        let generation = self.cache.begin(organization_id, key);

        let resolved = self.resolve(organization_id, key).await?;
        let missing = resolved.missing_required();
        if !missing.is_empty() {
            return Ok(TestResult::failed(format!(
                "not configured: missing {}",
                missing.join(", ")
            )));
        }

        let outcome = match tokio::time::timeout(
            self.probe_timeout,
            self.probe.probe(key, &resolved),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(crate::services::probes::ProbeError::Unreachable(format!(
                "connection test timed out after {:?}",
                self.probe_timeout
            ))),
        };

        match outcome {
            Ok(()) => {
                let now = Utc::now();
                let fresh = self.cache.publish_verified(organization_id, key, generation, now);
                if fresh {
                    self.store
                        .mark_verification(organization_id, key, true, now)
                        .await?;
                } else {
                    tracing::info!(
                        organization_id = %organization_id,
                        integration = %key,
                        "discarding verification result: credentials changed during the test"
                    );
                }
                self.audit
                    .record(
                        AuditDraft::new(
                            AuditAction::IntegrationConnectionTested,
                            format!("verified {} integration connection", key),
                        )
                        .entity(AuditEntityKind::IntegrationSettings, None)
                        .metadata(serde_json::json!({ "integration": key.as_str() })),
                        audit_ctx,
                    )
                    .await;
                Ok(TestResult::ok())
            }
            Err(probe_err) => {
                let fresh = self.cache.publish_failed(organization_id, key, generation);
                if fresh {
                    self.store
                        .mark_verification(organization_id, key, false, Utc::now())
                        .await?;
                }
                tracing::warn!(
                    organization_id = %organization_id,
                    integration = %key,
                    error = %probe_err.message(),
                    "integration connection test failed"
                );
                Ok(TestResult::failed(probe_err.message()))
            }
        }
    }

    /// Cached verification timestamp for the current credentials, if the
    /// last test succeeded. Used by live-client construction elsewhere to
    /// skip redundant handshakes.
    pub fn verified_at(&self, organization_id: Uuid, key: IntegrationKey) -> Option<chrono::DateTime<Utc>> {
        self.cache.verified_at(organization_id, key)
    }

    /// Decrypted effective configuration. Internal: feeds connection tests
    /// and live-client construction, never handlers.
    async fn resolve(
        &self,
        organization_id: Uuid,
        key: IntegrationKey,
    ) -> Result<ResolvedSettings, AppError> {
        let record = self.store.find_settings(organization_id, key).await?;
        let org_fields = record.as_ref().map(|r| r.field_map()).unwrap_or_default();

        let mut fields = BTreeMap::new();
        for spec in key.schema() {
            if let Some(value) = self.effective_field(key, &org_fields, spec.name, spec.secret)? {
                fields.insert(spec.name.to_string(), value);
            }
        }
        Ok(ResolvedSettings::new(key, fields))
    }

    /// One field of the effective configuration: the organization's value
    /// when present and non-blank (decrypted if secret), else the
    /// environment default, else nothing.
    fn effective_field(
        &self,
        key: IntegrationKey,
        org_fields: &BTreeMap<String, String>,
        name: &str,
        secret: bool,
    ) -> Result<Option<String>, AppError> {
        if let Some(raw) = org_fields.get(name).filter(|v| !v.trim().is_empty()) {
            let value = if secret {
                self.codec
                    .decrypt(raw)
                    .map_err(|e| AppError::InternalError(anyhow!(e)))?
            } else {
                raw.clone()
            };
            return Ok(Some(value));
        }
        Ok(self.env_defaults.get(key, name).map(|v| v.to_string()))
    }
}
