//! Membership removal over HTTP: role gates, the last-owner guard, and the
//! audit entries removals leave.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{seed_org, send, spawn_app, RequestSpec};
use tenancy_service::services::StaticProbe;
use uuid::Uuid;

#[tokio::test]
async fn admin_removes_staff_and_the_removal_is_audited() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let uri = format!("/members/{}", org.staff);
    let (status, _) = send(&app, RequestSpec::delete(&uri).as_user(org.admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, audit) = send(&app, RequestSpec::get("/audit-log").as_user(org.admin)).await;
    assert_eq!(audit["total"], 1);
    let entry = &audit["entries"][0];
    assert_eq!(entry["action_key"], "member_removed");
    assert_eq!(entry["entity_id"], org.staff.to_string());
    assert_eq!(
        entry["organization_id"],
        org.organization_id.to_string()
    );
}

#[tokio::test]
async fn admin_cannot_remove_an_owner() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let uri = format!("/members/{}", org.owner);
    let (status, _) = send(&app, RequestSpec::delete(&uri).as_user(org.admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.audit_len(), 0);
}

#[tokio::test]
async fn the_last_owner_cannot_be_removed() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let uri = format!("/members/{}", org.owner);
    let (status, _) = send(&app, RequestSpec::delete(&uri).as_user(org.owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Still an owner afterwards.
    let (_, body) = send(&app, RequestSpec::get("/context").as_user(org.owner)).await;
    assert_eq!(body["active"]["role"], "owner");
}

#[tokio::test]
async fn removing_an_unknown_member_is_not_found() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org = seed_org(&app, "Acme");

    let uri = format!("/members/{}", Uuid::new_v4());
    let (status, _) = send(&app, RequestSpec::delete(&uri).as_user(org.admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removal_is_scoped_to_the_active_org() {
    let app = spawn_app(Arc::new(StaticProbe::ok()));
    let org_a = seed_org(&app, "Acme");
    let org_b = seed_org(&app, "Globex");

    // Acme's admin cannot reach into Globex through the member id alone.
    let uri = format!("/members/{}", org_b.staff);
    let (status, _) = send(&app, RequestSpec::delete(&uri).as_user(org_a.admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Globex staff membership is untouched.
    let (_, body) = send(&app, RequestSpec::get("/context").as_user(org_b.staff)).await;
    assert_eq!(body["needs_onboarding"], false);
}
