use std::collections::{BTreeMap, HashMap};
use std::env;

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;

use crate::models::{EnvDefaults, IntegrationKey};
use crate::services::secrets::SecretCodec;

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub probe: ProbeConfig,
    pub email_defaults: EmailDefaultsConfig,
    pub payment_defaults: PaymentDefaultsConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Hex-encoded 32-byte key for the secret codec. Required in
    /// production; dev falls back to a deterministic local key.
    pub master_key: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout_seconds: u64,
}

/// Deployment-wide SMTP fallback, used by organizations without their own
/// email settings.
#[derive(Debug, Clone)]
pub struct EmailDefaultsConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<Secret<String>>,
    pub from_address: Option<String>,
}

/// Deployment-wide payment-gateway fallback.
#[derive(Debug, Clone)]
pub struct PaymentDefaultsConfig {
    pub api_base_url: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<Secret<String>>,
}

impl TenancyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = TenancyConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("tenancy-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
                master_key: optional_env("SETTINGS_MASTER_KEY").map(Secret::new),
            },
            probe: ProbeConfig {
                timeout_seconds: get_env("PROBE_TIMEOUT_SECONDS", Some("10"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
            },
            email_defaults: EmailDefaultsConfig {
                smtp_host: optional_env("DEFAULT_SMTP_HOST"),
                smtp_port: optional_env("DEFAULT_SMTP_PORT"),
                smtp_username: optional_env("DEFAULT_SMTP_USERNAME"),
                smtp_password: optional_env("DEFAULT_SMTP_PASSWORD").map(Secret::new),
                from_address: optional_env("DEFAULT_SMTP_FROM_ADDRESS"),
            },
            payment_defaults: PaymentDefaultsConfig {
                api_base_url: optional_env("DEFAULT_PAYMENT_API_BASE_URL"),
                key_id: optional_env("DEFAULT_PAYMENT_KEY_ID"),
                key_secret: optional_env("DEFAULT_PAYMENT_KEY_SECRET").map(Secret::new),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.probe.timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PROBE_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.master_key.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SETTINGS_MASTER_KEY is required in production"
                )));
            }
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }

    /// The secret codec for this deployment. Production requires a
    /// provisioned master key; dev may run on the deterministic local key.
    pub fn secret_codec(&self) -> Result<SecretCodec, AppError> {
        match &self.security.master_key {
            Some(key) => {
                SecretCodec::from_hex(key).map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))
            }
            None => Ok(SecretCodec::dev()),
        }
    }

    /// Environment-default integration settings, keyed the same way
    /// organization records are.
    pub fn env_defaults(&self) -> EnvDefaults {
        let mut defaults = HashMap::new();

        let mut email = BTreeMap::new();
        push_field(&mut email, "smtp_host", self.email_defaults.smtp_host.as_deref());
        push_field(&mut email, "smtp_port", self.email_defaults.smtp_port.as_deref());
        push_field(
            &mut email,
            "smtp_username",
            self.email_defaults.smtp_username.as_deref(),
        );
        push_field(
            &mut email,
            "smtp_password",
            self.email_defaults
                .smtp_password
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
        );
        push_field(
            &mut email,
            "from_address",
            self.email_defaults.from_address.as_deref(),
        );
        defaults.insert(IntegrationKey::Email, email);

        let mut payment = BTreeMap::new();
        push_field(
            &mut payment,
            "api_base_url",
            self.payment_defaults.api_base_url.as_deref(),
        );
        push_field(&mut payment, "key_id", self.payment_defaults.key_id.as_deref());
        push_field(
            &mut payment,
            "key_secret",
            self.payment_defaults
                .key_secret
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
        );
        defaults.insert(IntegrationKey::Payment, payment);

        EnvDefaults::new(defaults)
    }
}

fn push_field(fields: &mut BTreeMap<String, String>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            fields.insert(name.to_string(), value.to_string());
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
