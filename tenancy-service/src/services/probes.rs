//! Live connection probes for third-party providers.
//!
//! Each probe attempts a minimal authenticated handshake with the provider
//! named by an integration key. Probes distinguish "the provider rejected
//! these credentials" from "the provider could not be reached"; both are
//! data, not errors.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::SmtpTransport;
use std::time::Duration;

use crate::models::{IntegrationKey, ResolvedSettings};

/// Why a probe did not succeed.
#[derive(Debug, Clone)]
pub enum ProbeError {
    /// The provider answered and refused the credentials.
    Rejected(String),
    /// The provider could not be reached (network, DNS, timeout).
    Unreachable(String),
}

impl ProbeError {
    pub fn message(&self) -> String {
        match self {
            ProbeError::Rejected(detail) => format!("invalid credentials: {}", detail),
            ProbeError::Unreachable(detail) => format!("provider unreachable: {}", detail),
        }
    }
}

/// A minimal `handshake-or-error` capability per provider. The credential
/// store resolves and decrypts settings; probes only consume them.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn probe(
        &self,
        key: IntegrationKey,
        settings: &ResolvedSettings,
    ) -> Result<(), ProbeError>;
}

/// Production probes: SMTP handshake for email, authenticated ping for the
/// payment gateway.
pub struct LiveProbes {
    http: reqwest::Client,
    smtp_timeout: Duration,
}

const DEFAULT_PAYMENT_API: &str = "https://api.razorpay.com/v1";

impl LiveProbes {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            smtp_timeout: timeout,
        })
    }

    async fn probe_smtp(&self, settings: &ResolvedSettings) -> Result<(), ProbeError> {
        let host = settings.get("smtp_host").unwrap_or_default().to_string();
        let port: u16 = settings
            .get("smtp_port")
            .unwrap_or("587")
            .trim()
            .parse()
            .map_err(|_| ProbeError::Rejected("smtp_port is not a valid port".to_string()))?;
        let username = settings.get("smtp_username").unwrap_or_default().to_string();
        let password = settings.get("smtp_password").unwrap_or_default().to_string();

        let mailer = SmtpTransport::starttls_relay(&host)
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(self.smtp_timeout))
            .build();

        // lettre's transport is blocking; keep the handshake off the async
        // runtime like every other SMTP call in the platform.
        let outcome = tokio::task::spawn_blocking(move || mailer.test_connection())
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProbeError::Rejected(
                "SMTP server refused the connection test".to_string(),
            )),
            Err(e) if e.is_permanent() => Err(ProbeError::Rejected(e.to_string())),
            Err(e) => Err(ProbeError::Unreachable(e.to_string())),
        }
    }

    async fn probe_payment(&self, settings: &ResolvedSettings) -> Result<(), ProbeError> {
        let base_url = settings
            .get("api_base_url")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_PAYMENT_API)
            .trim_end_matches('/')
            .to_string();
        let key_id = settings.get("key_id").unwrap_or_default().to_string();
        let key_secret = settings.get("key_secret").unwrap_or_default().to_string();

        // Cheapest authenticated call the gateway offers.
        let url = format!("{}/orders?count=1", base_url);
        let response = self
            .http
            .get(&url)
            .basic_auth(&key_id, Some(&key_secret))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Unreachable("request timed out".to_string())
                } else {
                    ProbeError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(ProbeError::Rejected(format!(
                "gateway rejected the API key (HTTP {})",
                status.as_u16()
            )))
        } else if status.is_server_error() {
            Err(ProbeError::Unreachable(format!(
                "gateway returned HTTP {}",
                status.as_u16()
            )))
        } else {
            Err(ProbeError::Rejected(format!(
                "gateway returned HTTP {}",
                status.as_u16()
            )))
        }
    }
}

#[async_trait]
impl ConnectionProbe for LiveProbes {
    async fn probe(
        &self,
        key: IntegrationKey,
        settings: &ResolvedSettings,
    ) -> Result<(), ProbeError> {
        match key {
            IntegrationKey::Email => self.probe_smtp(settings).await,
            IntegrationKey::Payment => self.probe_payment(settings).await,
        }
    }
}

/// Test probe with a scripted outcome and optional artificial latency.
pub struct StaticProbe {
    outcome: std::sync::Mutex<Result<(), ProbeError>>,
    delay: Option<Duration>,
}

impl StaticProbe {
    pub fn ok() -> Self {
        Self {
            outcome: std::sync::Mutex::new(Ok(())),
            delay: None,
        }
    }

    pub fn rejecting(detail: &str) -> Self {
        Self {
            outcome: std::sync::Mutex::new(Err(ProbeError::Rejected(detail.to_string()))),
            delay: None,
        }
    }

    pub fn unreachable(detail: &str) -> Self {
        Self {
            outcome: std::sync::Mutex::new(Err(ProbeError::Unreachable(detail.to_string()))),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the scripted outcome for subsequent probes.
    pub fn set_outcome(&self, outcome: Result<(), ProbeError>) {
        *self.outcome.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl ConnectionProbe for StaticProbe {
    async fn probe(
        &self,
        _key: IntegrationKey,
        _settings: &ResolvedSettings,
    ) -> Result<(), ProbeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.lock().unwrap().clone()
    }
}
