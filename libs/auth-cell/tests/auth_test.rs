// libs/auth-cell/tests/auth_test.rs
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::models::{AuthError, LoginRequest, PrincipalRecord, RequestContext};
use auth_cell::services::auth::AuthService;
use auth_cell::services::credentials::CredentialService;
use security_cell::services::password::PasswordService;
use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_utils::digest::token_digest;
use shared_utils::test_utils::TestConfig;

const GOOD_PASSWORD: &str = "CorrectHorse1";

// ==============================================================================
// FIXTURES
// ==============================================================================

fn ctx() -> RequestContext {
    RequestContext {
        source_addr: "203.0.113.9".to_string(),
        user_agent: "test-agent".to_string(),
    }
}

fn login_request(identifier: &str, password: &str) -> LoginRequest {
    LoginRequest {
        identifier: identifier.to_string(),
        password: password.to_string(),
        remember_me: false,
        device_descriptor: Some("pixel-9".to_string()),
    }
}

fn patient_row(
    id: Uuid,
    password_hash: &str,
    failed: i32,
    locked_until: Option<chrono::DateTime<Utc>>,
    email_verified: bool,
) -> serde_json::Value {
    json!({
        "id": id,
        "email": "pat@example.com",
        "phone_number": "+15550100",
        "password_hash": password_hash,
        "is_active": true,
        "email_verified": email_verified,
        "phone_verified": true,
        "failed_login_attempts": failed,
        "locked_until": locked_until.map(|t| t.to_rfc3339()),
        "last_login_at": null
    })
}

fn session_row(
    id: Uuid,
    principal_id: Uuid,
    refresh_hash: &str,
    revoked: bool,
) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "id": id,
        "principal_id": principal_id,
        "refresh_hash": refresh_hash,
        "device": "pixel-9",
        "ip_address": "203.0.113.9",
        "user_agent": "test-agent",
        "expires_at": (now + Duration::days(7)).to_rfc3339(),
        "revoked": revoked,
        "last_used_at": now.to_rfc3339(),
        "location": null,
        "created_at": now.to_rfc3339()
    })
}

async fn mock_write_paths(server: &MockServer) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/security_events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> AppConfig {
    TestConfig::with_store_url(&server.uri()).to_app_config()
}

// ==============================================================================
// LOGIN
// ==============================================================================

#[tokio::test]
async fn login_issues_a_token_pair_and_session() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let hash = PasswordService::hash_password(GOOD_PASSWORD).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id, &hash, 0, None, true
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([session_row(
            Uuid::new_v4(),
            patient_id,
            "stored-hash",
            false
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    mock_write_paths(&server).await;

    let config = config_for(&server);
    let service = AuthService::patient(&config);
    let response = service
        .login(login_request("Pat@Example.com", GOOD_PASSWORD), &ctx())
        .await
        .unwrap();

    assert_eq!(response.token_type, "Bearer");
    // Patient access tokens live 30 minutes without remember_me.
    assert_eq!(response.expires_in, 1800);
    assert_eq!(response.principal.id, patient_id);
    assert_eq!(response.principal.role, Role::Patient);
    assert_eq!(response.access_token.split('.').count(), 3);
    assert_ne!(response.access_token, response.refresh_token);
}

#[tokio::test]
async fn unknown_identifier_reads_as_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = AuthService::patient(&config)
        .login(login_request("nobody@example.com", "whatever"), &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn third_patient_failure_sets_the_lock() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let hash = PasswordService::hash_password(GOOD_PASSWORD).unwrap();

    // Two failures already on record; this wrong password is the third.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id, &hash, 2, None, true
        )])))
        .mount(&server)
        .await;
    mock_write_paths(&server).await;

    let config = config_for(&server);
    let err = AuthService::patient(&config)
        .login(login_request("pat@example.com", "WrongPassword1"), &ctx())
        .await
        .unwrap_err();
    // The attempt itself still reads as bad credentials; the lock bites on
    // the next one.
    assert_matches!(err, AuthError::InvalidCredentials);

    let lock_patch = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/patients")
        .expect("lockout must be persisted");
    let body: serde_json::Value = serde_json::from_slice(&lock_patch.body).unwrap();
    assert_eq!(body["failed_login_attempts"], 3);
    assert!(body["locked_until"].is_string(), "locked_until must be set");
}

#[tokio::test]
async fn locked_account_rejects_even_the_correct_password() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let hash = PasswordService::hash_password(GOOD_PASSWORD).unwrap();
    let locked_until = Utc::now() + Duration::hours(1);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id,
            &hash,
            3,
            Some(locked_until),
            true
        )])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = AuthService::patient(&config)
        .login(login_request("pat@example.com", GOOD_PASSWORD), &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::AccountLocked(until) if until == locked_until);
}

#[tokio::test]
async fn unverified_patient_email_blocks_login() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let hash = PasswordService::hash_password(GOOD_PASSWORD).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id, &hash, 0, None, false
        )])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = AuthService::patient(&config)
        .login(login_request("pat@example.com", GOOD_PASSWORD), &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::EmailNotVerified);
}

// ==============================================================================
// REFRESH ROTATION
// ==============================================================================

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_old_token() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();
    let config = config_for(&server);

    let principal = PrincipalRecord {
        id: patient_id,
        email: "pat@example.com".to_string(),
        phone_number: "+15550100".to_string(),
        password_hash: "unused".to_string(),
        is_active: true,
        email_verified: true,
        phone_verified: true,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
    };
    let pair = CredentialService::new(&config)
        .mint_pair(
            &principal,
            Role::Patient,
            session_id,
            "fp",
            Duration::minutes(30),
            Duration::days(7),
        )
        .unwrap();
    let old_token = pair.refresh_token;
    let old_digest = token_digest(&old_token);

    // First read sees the matching digest; later reads see the rotated one.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            session_id,
            patient_id,
            &old_digest,
            false
        )])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            session_id,
            patient_id,
            "digest-after-rotation",
            false
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id,
            "unused",
            0,
            None,
            true
        )])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            session_id,
            patient_id,
            "digest-after-rotation",
            false
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/security_events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;

    let service = AuthService::patient(&config);

    let rotated = service.refresh(&old_token, &ctx()).await.unwrap();
    assert_ne!(rotated.refresh_token, old_token);

    // Replaying the old token now misses the stored digest.
    let err = service.refresh(&old_token, &ctx()).await.unwrap_err();
    assert_matches!(err, AuthError::InvalidRefreshToken);
}

#[tokio::test]
async fn garbage_refresh_tokens_are_rejected_outright() {
    let server = MockServer::start().await;
    let config = config_for(&server);

    let err = AuthService::patient(&config)
        .refresh("not-a-token", &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::InvalidRefreshToken);
}

#[tokio::test]
async fn revoked_session_rejects_refresh() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();
    let config = config_for(&server);

    let principal = PrincipalRecord {
        id: patient_id,
        email: "pat@example.com".to_string(),
        phone_number: "+15550100".to_string(),
        password_hash: "unused".to_string(),
        is_active: true,
        email_verified: true,
        phone_verified: true,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
    };
    let pair = CredentialService::new(&config)
        .mint_pair(
            &principal,
            Role::Patient,
            session_id,
            "fp",
            Duration::minutes(30),
            Duration::days(7),
        )
        .unwrap();
    let digest = token_digest(&pair.refresh_token);

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            session_id, patient_id, &digest, true
        )])))
        .mount(&server)
        .await;

    let err = AuthService::patient(&config)
        .refresh(&pair.refresh_token, &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::InvalidRefreshToken);
}

// ==============================================================================
// LOGOUT
// ==============================================================================

#[tokio::test]
async fn logout_is_idempotent() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();
    let config = config_for(&server);

    let principal = PrincipalRecord {
        id: patient_id,
        email: "pat@example.com".to_string(),
        phone_number: "+15550100".to_string(),
        password_hash: "unused".to_string(),
        is_active: true,
        email_verified: true,
        phone_verified: true,
        failed_login_attempts: 0,
        locked_until: None,
        last_login_at: None,
    };
    let pair = CredentialService::new(&config)
        .mint_pair(
            &principal,
            Role::Patient,
            session_id,
            "fp",
            Duration::minutes(30),
            Duration::days(7),
        )
        .unwrap();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patient_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_row(
            session_id, patient_id, "digest", true
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/security_events"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&server)
        .await;

    let service = AuthService::patient(&config);
    service.logout(&pair.refresh_token, &ctx()).await.unwrap();
    service.logout(&pair.refresh_token, &ctx()).await.unwrap();
}

#[tokio::test]
async fn logout_all_requires_the_password() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let hash = PasswordService::hash_password(GOOD_PASSWORD).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(
            patient_id, &hash, 0, None, true
        )])))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = AuthService::patient(&config)
        .logout_all(patient_id, "WrongPassword1", &ctx())
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::InvalidCredentials);
}
