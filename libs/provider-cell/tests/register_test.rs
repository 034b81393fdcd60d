// libs/provider-cell/tests/register_test.rs
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use provider_cell::models::{ClinicAddress, ProviderError, RegisterProviderRequest};
use provider_cell::services::provider::ProviderService;
use shared_utils::test_utils::TestConfig;

fn request() -> RegisterProviderRequest {
    RegisterProviderRequest {
        first_name: "Maria".to_string(),
        last_name: "Alvarez".to_string(),
        email: "Maria@Example.com".to_string(),
        phone_number: "+15551234567".to_string(),
        password: "Str0ngPassw0rd".to_string(),
        confirm_password: "Str0ngPassw0rd".to_string(),
        specialization: "Cardiology".to_string(),
        license_number: "md12345".to_string(),
        years_of_experience: 12,
        clinic_address: ClinicAddress {
            street: "12 Harbor Way".to_string(),
            city: "Boston".to_string(),
            state: "MA".to_string(),
            zip: "02110".to_string(),
        },
    }
}

fn provider_row(id: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "first_name": "Maria",
        "last_name": "Alvarez",
        "email": "maria@example.com",
        "phone_number": "+15551234567",
        "specialization": "Cardiology",
        "license_number": "MD12345",
        "years_of_experience": 12,
        "clinic_street": "12 Harbor Way",
        "clinic_city": "Boston",
        "clinic_state": "MA",
        "clinic_zip": "02110",
        "is_active": true,
        "created_at": "2030-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn registration_folds_email_and_license_case() {
    let server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    // Uniqueness probes all come back empty.
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([provider_row(provider_id)])))
        .mount(&server)
        .await;

    let service = ProviderService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let provider = service.register(request()).await.unwrap();
    assert_eq!(provider.id, provider_id);

    // The insert body carries the folded forms.
    let insert = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
    assert_eq!(body["email"], "maria@example.com");
    assert_eq!(body["license_number"], "MD12345");
    assert!(body["password_hash"].as_str().unwrap().starts_with("$argon2"));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("email", "eq.maria@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&server)
        .await;

    let service = ProviderService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let err = service.register(request()).await.unwrap_err();
    assert_matches!(err, ProviderError::Duplicate("email"));
}

#[tokio::test]
async fn invalid_fields_do_not_touch_the_store() {
    let server = MockServer::start().await;

    let mut bad = request();
    bad.phone_number = "not-a-phone".to_string();
    bad.years_of_experience = 99;

    let service = ProviderService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let err = service.register(bad).await.unwrap_err();
    assert_matches!(err, ProviderError::ValidationFailed(_));

    assert!(server.received_requests().await.unwrap().is_empty());
}
