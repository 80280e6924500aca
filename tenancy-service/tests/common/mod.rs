//! Test helpers: an app wired to in-memory stores and scripted probes, plus
//! a request driver for the router.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use secrecy::Secret;
use tower::util::ServiceExt;
use uuid::Uuid;

use tenancy_service::config::{
    DatabaseConfig, EmailDefaultsConfig, Environment, PaymentDefaultsConfig, ProbeConfig,
    SecurityConfig, TenancyConfig,
};
use tenancy_service::models::{Membership, Organization, OrgRole, User};
use tenancy_service::services::{
    AuditService, ConnectionProbe, InMemoryStore, IntegrationService, MemberAdminService,
    OrgContextResolver, SecretCodec, VerificationCache,
};
use tenancy_service::{build_router, AppState};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<VerificationCache>,
}

pub fn test_config() -> TenancyConfig {
    TenancyConfig {
        common: service_core::config::Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "tenancy-service".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            master_key: None,
        },
        probe: ProbeConfig { timeout_seconds: 2 },
        email_defaults: EmailDefaultsConfig {
            smtp_host: Some("smtp.env.example".to_string()),
            smtp_port: Some("587".to_string()),
            smtp_username: Some("env-mailer".to_string()),
            smtp_password: Some(Secret::new("env-relay-password".to_string())),
            from_address: None,
        },
        payment_defaults: PaymentDefaultsConfig {
            api_base_url: None,
            key_id: None,
            key_secret: None,
        },
    }
}

/// Build an app around the given probe, returning handles to the in-memory
/// store and the verification cache for assertions.
pub fn spawn_app(probe: Arc<dyn ConnectionProbe>) -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(VerificationCache::new());

    let resolver = OrgContextResolver::new(store.clone());
    let audit = AuditService::new(store.clone());
    let integrations = IntegrationService::new(
        store.clone(),
        audit.clone(),
        SecretCodec::dev(),
        Arc::new(config.env_defaults()),
        cache.clone(),
        probe,
        PROBE_TIMEOUT,
    );
    let members = MemberAdminService::new(store.clone(), audit.clone());

    let state = AppState {
        config,
        resolver,
        audit,
        integrations,
        members,
    };
    let router = build_router(state.clone()).expect("router builds");

    TestApp {
        router,
        state,
        store,
        cache,
    }
}

/// Seed one organization with an owner, an admin, and a staff member.
pub struct SeededOrg {
    pub organization_id: Uuid,
    pub owner: Uuid,
    pub admin: Uuid,
    pub staff: Uuid,
}

pub fn seed_org(app: &TestApp, name: &str) -> SeededOrg {
    let org = Organization::new(name.to_string());
    let organization_id = org.organization_id;
    app.store.insert_organization(org);

    let mut ids = Vec::new();
    for (label, role) in [
        ("owner", OrgRole::Owner),
        ("admin", OrgRole::Admin),
        ("staff", OrgRole::Staff),
    ] {
        let user = User::new(format!("{}@{}.test", label, name.replace(' ', "-").to_lowercase()));
        let user_id = user.user_id;
        app.store.insert_user(user);
        app.store
            .insert_membership(Membership::new(user_id, organization_id, role));
        ids.push(user_id);
    }

    SeededOrg {
        organization_id,
        owner: ids[0],
        admin: ids[1],
        staff: ids[2],
    }
}

pub struct RequestSpec<'a> {
    pub method: Method,
    pub uri: &'a str,
    pub user: Option<Uuid>,
    pub org_hint: Option<Uuid>,
    pub body: Option<serde_json::Value>,
}

impl<'a> RequestSpec<'a> {
    pub fn get(uri: &'a str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn put(uri: &'a str, body: serde_json::Value) -> Self {
        let mut spec = Self::new(Method::PUT, uri);
        spec.body = Some(body);
        spec
    }

    pub fn post(uri: &'a str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn delete(uri: &'a str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    fn new(method: Method, uri: &'a str) -> Self {
        Self {
            method,
            uri,
            user: None,
            org_hint: None,
            body: None,
        }
    }

    pub fn as_user(mut self, user: Uuid) -> Self {
        self.user = Some(user);
        self
    }

    pub fn in_org(mut self, org: Uuid) -> Self {
        self.org_hint = Some(org);
        self
    }
}

/// Drive one request through the router and parse the JSON response.
pub async fn send(app: &TestApp, spec: RequestSpec<'_>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(spec.method).uri(spec.uri);
    if let Some(user) = spec.user {
        builder = builder
            .header("x-user-id", user.to_string())
            .header("x-user-email", format!("{}@request.test", user.simple()));
    }
    if let Some(org) = spec.org_hint {
        builder = builder.header("x-org-id", org.to_string());
    }

    let request = match spec.body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router never errors");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
