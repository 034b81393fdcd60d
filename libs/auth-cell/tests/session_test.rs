// libs/auth-cell/tests/session_test.rs
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::services::session::SessionService;
use shared_utils::test_utils::TestConfig;

fn session_row(id: Uuid, principal_id: Uuid, last_used_offset_min: i64) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "id": id,
        "principal_id": principal_id,
        "refresh_hash": format!("digest-{}", id),
        "device": "pixel-9",
        "ip_address": "203.0.113.9",
        "user_agent": "test-agent",
        "expires_at": (now + Duration::days(7)).to_rfc3339(),
        "revoked": false,
        "last_used_at": (now - Duration::minutes(last_used_offset_min)).to_rfc3339(),
        "location": null,
        "created_at": now.to_rfc3339()
    })
}

#[tokio::test]
async fn cap_eviction_revokes_only_the_least_recently_used() {
    let server = MockServer::start().await;
    let principal_id = Uuid::new_v4();

    // Four live sessions, newest first (the service asks for that order).
    let rows: Vec<serde_json::Value> = (0..4)
        .map(|i| session_row(Uuid::new_v4(), principal_id, i * 60))
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([rows[3]])))
        .mount(&server)
        .await;

    let service = SessionService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let evicted = service
        .enforce_cap("patient_sessions", principal_id, 3)
        .await
        .unwrap();

    assert_eq!(evicted, 1);

    // Exactly one revocation PATCH, targeting the oldest session.
    let oldest_id = rows[3]["id"].as_str().unwrap().to_string();
    let patches: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .collect();
    assert_eq!(patches.len(), 1);
    assert!(patches[0].url.query().unwrap_or("").contains(&oldest_id));
}

#[tokio::test]
async fn cap_is_a_no_op_below_the_limit() {
    let server = MockServer::start().await;
    let principal_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            session_row(Uuid::new_v4(), principal_id, 0),
            session_row(Uuid::new_v4(), principal_id, 60),
        ])))
        .mount(&server)
        .await;

    let service = SessionService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let evicted = service
        .enforce_cap("patient_sessions", principal_id, 3)
        .await
        .unwrap();

    assert_eq!(evicted, 0);
}

#[tokio::test]
async fn rotation_is_conditional_on_the_current_hash() {
    let server = MockServer::start().await;
    let session_id = Uuid::new_v4();

    // The conditional PATCH matched no rows: another rotation got there
    // first.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = SessionService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let err = service
        .rotate("patient_sessions", session_id, "stale-digest", "new-digest")
        .await
        .unwrap_err();

    assert!(matches!(err, auth_cell::models::AuthError::InvalidRefreshToken));
}
