//! Integration settings model - per-organization third-party credentials.
//!
//! Each integration key carries a static field schema. The secret/plain
//! distinction lives in that schema, so a new field cannot be added without
//! declaring whether it is a secret.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Third-party integrations an organization can bring its own credentials
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKey {
    /// Outbound mail relay (SMTP).
    Email,
    /// Payment gateway.
    Payment,
}

impl IntegrationKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKey::Email => "email",
            IntegrationKey::Payment => "payment",
        }
    }

    /// The field schema for this integration.
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self {
            IntegrationKey::Email => EMAIL_FIELDS,
            IntegrationKey::Payment => PAYMENT_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.schema().iter().find(|f| f.name == name)
    }
}

impl std::fmt::Display for IntegrationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntegrationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(IntegrationKey::Email),
            "payment" => Ok(IntegrationKey::Payment),
            _ => Err(format!("Unknown integration key: {}", s)),
        }
    }
}

/// Declaration of one configuration field: its name, whether it is stored
/// encrypted and masked on read, and whether a connection test requires it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub secret: bool,
    pub required: bool,
}

const EMAIL_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "smtp_host", secret: false, required: true },
    FieldSpec { name: "smtp_port", secret: false, required: false },
    FieldSpec { name: "smtp_username", secret: false, required: true },
    FieldSpec { name: "smtp_password", secret: true, required: true },
    FieldSpec { name: "from_address", secret: false, required: false },
];

const PAYMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "api_base_url", secret: false, required: false },
    FieldSpec { name: "key_id", secret: false, required: true },
    FieldSpec { name: "key_secret", secret: true, required: true },
];

/// Stored settings row for one (organization, integration). The `fields`
/// map holds secret values in encrypted form only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IntegrationSettingsRecord {
    pub organization_id: Uuid,
    pub integration_key: String,
    pub fields: serde_json::Value,
    pub verified: Option<bool>,
    pub verified_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl IntegrationSettingsRecord {
    pub fn new(organization_id: Uuid, key: IntegrationKey, fields: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            organization_id,
            integration_key: key.as_str().to_string(),
            fields: serde_json::to_value(fields).unwrap_or_else(|_| serde_json::json!({})),
            verified: None,
            verified_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// The stored field map. Tolerates a malformed payload by returning an
    /// empty map rather than failing the read path.
    pub fn field_map(&self) -> BTreeMap<String, String> {
        serde_json::from_value(self.fields.clone()).unwrap_or_default()
    }
}

/// Where the overall (organization, integration) pair sits in its
/// configuration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsState {
    /// No organization record; environment defaults apply.
    Unconfigured,
    /// Organization record exists; never tested, or credentials changed
    /// since the last test.
    Configured,
    /// Last connection test succeeded.
    Verified,
    /// Last connection test failed.
    Failed,
}

/// Display form of one effective field. Secrets only ever appear as a
/// fixed-width preview; blank fields are an explicit marker, never "".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MaskedValue {
    NotConfigured,
    Plain { value: String },
    Secret { preview: String },
}

/// What `get` returns: the effective configuration with secrets masked.
#[derive(Debug, Clone, Serialize)]
pub struct MaskedSettings {
    pub integration_key: IntegrationKey,
    pub state: SettingsState,
    /// True when the organization has its own record (as opposed to running
    /// on environment defaults).
    pub has_org_settings: bool,
    pub verified_utc: Option<DateTime<Utc>>,
    pub fields: BTreeMap<String, MaskedValue>,
}

/// Decrypted effective configuration, used only inside connection testing.
/// Deliberately not serializable; Debug redacts secret values.
#[derive(Clone, Default)]
pub struct ResolvedSettings {
    key: Option<IntegrationKey>,
    fields: BTreeMap<String, String>,
}

impl ResolvedSettings {
    pub fn new(key: IntegrationKey, fields: BTreeMap<String, String>) -> Self {
        Self {
            key: Some(key),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// Required schema fields with no effective value.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let Some(key) = self.key else {
            return Vec::new();
        };
        key.schema()
            .iter()
            .filter(|spec| spec.required && self.get(spec.name).map_or(true, |v| v.trim().is_empty()))
            .map(|spec| spec.name)
            .collect()
    }
}

impl std::fmt::Debug for ResolvedSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.fields {
            let secret = self
                .key
                .and_then(|k| k.field(name))
                .map(|spec| spec.secret)
                .unwrap_or(true);
            if secret {
                map.entry(name, &"<redacted>");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// Outcome of a connection test. Provider-side failures are data, not
/// errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub valid: bool,
    pub message: String,
}

impl TestResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: "connection verified".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Deployment-wide fallback configuration, built once at startup and
/// injected. Used when an organization has no record, or field-by-field
/// where an organization record leaves a field blank.
#[derive(Clone, Default)]
pub struct EnvDefaults {
    defaults: HashMap<IntegrationKey, BTreeMap<String, String>>,
}

impl std::fmt::Debug for EnvDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values may include fallback credentials; only name the keys.
        f.debug_map()
            .entries(
                self.defaults
                    .iter()
                    .map(|(key, fields)| (key.as_str(), fields.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl EnvDefaults {
    pub fn new(defaults: HashMap<IntegrationKey, BTreeMap<String, String>>) -> Self {
        // Blank values are indistinguishable from absent ones downstream;
        // drop them here so the fallback chain stays unambiguous.
        let defaults = defaults
            .into_iter()
            .map(|(key, fields)| {
                let fields = fields
                    .into_iter()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .collect();
                (key, fields)
            })
            .collect();
        Self { defaults }
    }

    pub fn get(&self, key: IntegrationKey, field: &str) -> Option<&str> {
        self.defaults
            .get(&key)
            .and_then(|fields| fields.get(field))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_secrets_for_credentials() {
        assert!(IntegrationKey::Email.field("smtp_password").unwrap().secret);
        assert!(IntegrationKey::Payment.field("key_secret").unwrap().secret);
        assert!(!IntegrationKey::Email.field("smtp_host").unwrap().secret);
    }

    #[test]
    fn unknown_field_is_absent_from_schema() {
        assert!(IntegrationKey::Email.field("api_key").is_none());
    }

    #[test]
    fn integration_key_round_trips() {
        for key in [IntegrationKey::Email, IntegrationKey::Payment] {
            assert_eq!(key.as_str().parse::<IntegrationKey>().unwrap(), key);
        }
        assert!("slack".parse::<IntegrationKey>().is_err());
    }

    #[test]
    fn missing_required_reports_blank_and_absent_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("smtp_host".to_string(), "smtp.example.com".to_string());
        fields.insert("smtp_username".to_string(), "  ".to_string());
        let resolved = ResolvedSettings::new(IntegrationKey::Email, fields);
        assert_eq!(resolved.missing_required(), vec!["smtp_username", "smtp_password"]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut fields = BTreeMap::new();
        fields.insert("smtp_password".to_string(), "hunter2".to_string());
        fields.insert("smtp_host".to_string(), "smtp.example.com".to_string());
        let resolved = ResolvedSettings::new(IntegrationKey::Email, fields);
        let rendered = format!("{:?}", resolved);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("smtp.example.com"));
    }

    #[test]
    fn env_defaults_drop_blank_values() {
        let mut email = BTreeMap::new();
        email.insert("smtp_host".to_string(), "smtp.env.example".to_string());
        email.insert("smtp_password".to_string(), "   ".to_string());
        let mut map = HashMap::new();
        map.insert(IntegrationKey::Email, email);
        let defaults = EnvDefaults::new(map);
        assert_eq!(defaults.get(IntegrationKey::Email, "smtp_host"), Some("smtp.env.example"));
        assert_eq!(defaults.get(IntegrationKey::Email, "smtp_password"), None);
    }
}
