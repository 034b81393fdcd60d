// libs/availability-cell/tests/search_test.rs
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use availability_cell::models::SearchQuery;
use availability_cell::services::search::SearchService;
use shared_utils::test_utils::TestConfig;

fn provider_row(
    id: Uuid,
    name: (&str, &str),
    specialization: &str,
    city: &str,
    state: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "first_name": name.0,
        "last_name": name.1,
        "specialization": specialization,
        "years_of_experience": 9,
        "clinic_street": "1 Main St",
        "clinic_city": city,
        "clinic_state": state,
        "clinic_zip": "10001",
        "is_active": true
    })
}

fn template_row(id: Uuid, provider_id: Uuid, pricing: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "provider_id": provider_id,
        "date": "2030-04-01",
        "start_time": "09:00",
        "end_time": "10:00",
        "timezone": "America/New_York",
        "slot_duration_minutes": 30,
        "break_duration_minutes": 0,
        "is_recurring": false,
        "recurrence_pattern": null,
        "recurrence_end_date": null,
        "max_appointments_per_slot": 1,
        "current_appointments": 0,
        "appointment_type": "consultation",
        "status": "active",
        "location": {"location_type": "clinic", "address": "1 Main St", "room_number": null},
        "pricing": pricing,
        "special_requirements": null,
        "notes": null,
        "created_at": "2030-01-01T00:00:00Z",
        "updated_at": "2030-01-01T00:00:00Z"
    })
}

fn slot_row(availability_id: Uuid, provider_id: Uuid) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "availability_id": availability_id,
        "provider_id": provider_id,
        "slot_start": "2030-04-01T13:00:00Z",
        "slot_end": "2030-04-01T13:30:00Z",
        "status": "available",
        "patient_id": null,
        "appointment_type": "consultation",
        "booking_reference": "APT-300401-QRSTUVWX",
        "pricing": null,
        "notes": null,
        "created_at": "2030-01-01T00:00:00Z",
        "updated_at": "2030-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn specialization_and_location_filters_select_one_provider() {
    let server = MockServer::start().await;

    let cardiology_ny = Uuid::new_v4();
    let dermatology_ma = Uuid::new_v4();
    let template_q = Uuid::new_v4();
    let template_r = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            template_row(template_q, cardiology_ny, json!(null)),
            template_row(template_r, dermatology_ma, json!(null)),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            provider_row(cardiology_ny, ("Quinn", "Harper"), "Cardiology", "New York", "NY"),
            provider_row(dermatology_ma, ("Rae", "Ellison"), "Dermatology", "Cambridge", "MA"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([slot_row(template_q, cardiology_ny)])),
        )
        .mount(&server)
        .await;

    let service = SearchService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let response = service
        .search(SearchQuery {
            date: NaiveDate::from_ymd_opt(2030, 4, 1),
            specialization: Some("cardio".to_string()),
            location: Some("NY".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(response.total_providers, 1);
    assert_eq!(response.total_slots, 1);
    assert_eq!(response.results[0].provider.provider_id, cardiology_ny);
    assert_eq!(response.results[0].provider.specialization, "Cardiology");
    // 13:00Z rendered in the template's zone.
    assert_eq!(response.results[0].available_slots[0].start_time, "09:00");
}

#[tokio::test]
async fn price_cap_excludes_priced_templates_above_it() {
    let server = MockServer::start().await;

    let cheap = Uuid::new_v4();
    let pricey = Uuid::new_v4();
    let template_cheap = Uuid::new_v4();
    let template_pricey = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            template_row(template_cheap, cheap, json!({"base_fee": 60.0, "insurance_accepted": true, "currency": "USD"})),
            template_row(template_pricey, pricey, json!({"base_fee": 220.0, "insurance_accepted": true, "currency": "USD"})),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            provider_row(cheap, ("Ana", "Silva"), "Family Medicine", "Austin", "TX"),
            provider_row(pricey, ("Ben", "Okafor"), "Family Medicine", "Austin", "TX"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([slot_row(template_cheap, cheap)])),
        )
        .mount(&server)
        .await;

    let service = SearchService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let response = service
        .search(SearchQuery {
            max_price: Some(100.0),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(response.total_providers, 1);
    assert_eq!(response.results[0].provider.provider_id, cheap);
}

#[tokio::test]
async fn empty_template_space_short_circuits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = SearchService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let response = service.search(SearchQuery::default()).await.unwrap();

    assert_eq!(response.total_providers, 0);
    assert_eq!(response.total_slots, 0);
}

#[tokio::test]
async fn providers_rank_by_available_slot_count() {
    let server = MockServer::start().await;

    let busy = Uuid::new_v4();
    let quiet = Uuid::new_v4();
    let template_busy = Uuid::new_v4();
    let template_quiet = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            template_row(template_busy, busy, json!(null)),
            template_row(template_quiet, quiet, json!(null)),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            provider_row(busy, ("Busy", "Doctor"), "Cardiology", "New York", "NY"),
            provider_row(quiet, ("Quiet", "Doctor"), "Cardiology", "New York", "NY"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_row(template_quiet, quiet),
            slot_row(template_busy, busy),
            slot_row(template_busy, busy),
        ])))
        .mount(&server)
        .await;

    let service = SearchService::new(&TestConfig::with_store_url(&server.uri()).to_app_config());
    let response = service.search(SearchQuery::default()).await.unwrap();

    assert_eq!(response.total_providers, 2);
    assert_eq!(response.results[0].provider.provider_id, busy);
    assert_eq!(response.results[0].available_slots.len(), 2);
}
