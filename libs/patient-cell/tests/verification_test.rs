// libs/patient-cell/tests/verification_test.rs
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::PatientError;
use patient_cell::services::verification::VerificationService;
use shared_utils::test_utils::TestConfig;

fn token_row(patient_id: Uuid, token: &str, kind: &str) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "id": Uuid::new_v4(),
        "patient_id": patient_id,
        "token": token,
        "kind": kind,
        "expires_at": (now + Duration::hours(1)).to_rfc3339(),
        "used": true,
        "created_at": now.to_rfc3339()
    })
}

#[tokio::test]
async fn email_verification_flips_the_flag() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let token = Uuid::new_v4().to_string();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verification_tokens"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([token_row(patient_id, &token, "email")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let service =
        VerificationService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let verified = service.verify_email(&token).await.unwrap();
    assert_eq!(verified, patient_id);

    let patched = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/rest/v1/patients")
        .expect("patient row must be patched");
    let body: serde_json::Value = serde_json::from_slice(&patched.body).unwrap();
    assert_eq!(body["email_verified"], true);
}

#[tokio::test]
async fn spent_or_expired_tokens_are_rejected() {
    let server = MockServer::start().await;

    // Conditional update matched nothing: wrong token, expired, or already
    // used. All three collapse to the same empty row set.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verification_tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service =
        VerificationService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let err = service.verify_email("stale-token").await.unwrap_err();
    assert_matches!(err, PatientError::InvalidVerificationToken);
}

#[tokio::test]
async fn issued_phone_otps_are_six_digits() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/verification_tokens"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([token_row(patient_id, "123456", "phone")])),
        )
        .mount(&server)
        .await;

    let service =
        VerificationService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    service.issue_phone_token(patient_id).await.unwrap();

    let insert = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    let otp = body["token"].as_str().unwrap();
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));
}
