//! End-to-end integration settings flow: env-default fallback, masked
//! reads, connection testing, and the audit trail the flow leaves behind.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{seed_org, send, spawn_app, RequestSpec};
use serde_json::json;
use tenancy_service::services::{ConnectionProbe, StaticProbe};

#[tokio::test]
async fn unconfigured_org_reads_masked_env_defaults() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let (status, body) = send(
        &app,
        RequestSpec::get("/integrations/email").as_user(org.staff),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "unconfigured");
    assert_eq!(body["has_org_settings"], false);
    assert_eq!(body["fields"]["smtp_host"]["value"], "smtp.env.example");
    // The env-default relay password is a secret: masked, never echoed.
    assert_eq!(body["fields"]["smtp_password"]["state"], "secret");
    let preview = body["fields"]["smtp_password"]["preview"].as_str().unwrap();
    assert!(!preview.contains("env-relay-password"));
    assert!(preview.starts_with("********"));
    // No default was configured for from_address.
    assert_eq!(body["fields"]["from_address"]["state"], "not_configured");
}

#[tokio::test]
async fn org_settings_shadow_env_defaults_and_reads_stay_masked() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let (status, body) = send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": {
                "smtp_host": "smtp.acme.example",
                "smtp_username": "acme-mailer",
                "smtp_password": "acme-password-123",
            }}),
        )
        .as_user(org.admin),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "configured");
    assert_eq!(body["has_org_settings"], true);
    assert_eq!(body["fields"]["smtp_host"]["value"], "smtp.acme.example");
    let preview = body["fields"]["smtp_password"]["preview"].as_str().unwrap();
    assert_eq!(preview, "********-123");
    assert!(!serde_json::to_string(&body).unwrap().contains("acme-password-123"));

    // Fields the org left blank still fall back per-field: port came from
    // the environment default.
    assert_eq!(body["fields"]["smtp_port"]["value"], "587");
}

#[tokio::test]
async fn delete_reverts_to_env_defaults_and_double_delete_is_not_found() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let (_, _) = send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": { "smtp_host": "smtp.acme.example", "smtp_username": "u", "smtp_password": "p" }}),
        )
        .as_user(org.admin),
    )
    .await;

    let (status, _) = send(
        &app,
        RequestSpec::delete("/integrations/email").as_user(org.admin),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        RequestSpec::get("/integrations/email").as_user(org.staff),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_org_settings"], false);
    assert_eq!(body["fields"]["smtp_host"]["value"], "smtp.env.example");

    // Same outcome every time the record is absent.
    for _ in 0..2 {
        let (status, _) = send(
            &app,
            RequestSpec::delete("/integrations/email").as_user(org.admin),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn wrong_then_right_credentials_walk_failed_to_verified() {
    let probe = Arc::new(StaticProbe::rejecting("SMTP authentication failed"));
    let app = spawn_app(probe.clone() as Arc<dyn ConnectionProbe>);
    let org = seed_org(&app, "Acme");

    // Configure with a wrong password.
    send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": { "smtp_host": "smtp.acme.example", "smtp_username": "u", "smtp_password": "wrong" }}),
        )
        .as_user(org.admin),
    )
    .await;

    let (status, body) = send(
        &app,
        RequestSpec::post("/integrations/email/test").as_user(org.admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["message"].as_str().unwrap().contains("invalid credentials"));

    let (_, body) = send(
        &app,
        RequestSpec::get("/integrations/email").as_user(org.staff),
    )
    .await;
    assert_eq!(body["state"], "failed");

    // Correct the password; the provider accepts from now on.
    probe.set_outcome(Ok(()));
    send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": { "smtp_host": "smtp.acme.example", "smtp_username": "u", "smtp_password": "right" }}),
        )
        .as_user(org.admin),
    )
    .await;

    let (_, body) = send(
        &app,
        RequestSpec::post("/integrations/email/test").as_user(org.admin),
    )
    .await;
    assert_eq!(body["valid"], true);

    let (_, body) = send(
        &app,
        RequestSpec::get("/integrations/email").as_user(org.staff),
    )
    .await;
    assert_eq!(body["state"], "verified");

    // The whole walk left exactly: two updates and one successful test.
    let (_, audit) = send(&app, RequestSpec::get("/audit-log").as_user(org.admin)).await;
    let actions: Vec<&str> = audit["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action_key"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        vec![
            "integration_connection_tested",
            "integration_settings_updated",
            "integration_settings_updated",
        ]
    );
}

#[tokio::test]
async fn unreachable_provider_is_reported_distinctly() {
    let app = spawn_app(Arc::new(StaticProbe::unreachable("connection refused")));
    let org = seed_org(&app, "Acme");

    send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": { "smtp_host": "smtp.acme.example", "smtp_username": "u", "smtp_password": "p" }}),
        )
        .as_user(org.admin),
    )
    .await;

    let (status, body) = send(
        &app,
        RequestSpec::post("/integrations/email/test").as_user(org.admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["message"].as_str().unwrap().contains("provider unreachable"));
    assert!(!body["message"].as_str().unwrap().contains("invalid credentials"));
}

#[tokio::test]
async fn testing_with_nothing_configured_names_the_gaps() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    // Payment has no env defaults in the test fixture and no org record.
    let (status, body) = send(
        &app,
        RequestSpec::post("/integrations/payment/test").as_user(org.admin),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("not configured"));
    assert!(message.contains("key_id"));
    assert!(message.contains("key_secret"));

    // A failed precondition is not a connection test; nothing was audited.
    assert_eq!(app.store.audit_len(), 0);
}

#[tokio::test]
async fn reads_never_audit() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    send(&app, RequestSpec::get("/integrations/email").as_user(org.staff)).await;
    send(&app, RequestSpec::get("/integrations/payment").as_user(org.admin)).await;
    assert_eq!(app.store.audit_len(), 0);
}

#[tokio::test]
async fn settings_are_tenant_scoped() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org_a = seed_org(&app, "Acme");
    let org_b = seed_org(&app, "Globex");

    send(
        &app,
        RequestSpec::put(
            "/integrations/email",
            json!({ "fields": { "smtp_host": "smtp.acme.example", "smtp_username": "u", "smtp_password": "p" }}),
        )
        .as_user(org_a.admin),
    )
    .await;

    // Globex still sees the environment defaults.
    let (_, body) = send(
        &app,
        RequestSpec::get("/integrations/email").as_user(org_b.staff),
    )
    .await;
    assert_eq!(body["has_org_settings"], false);
    assert_eq!(body["fields"]["smtp_host"]["value"], "smtp.env.example");
}
