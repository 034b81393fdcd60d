// libs/patient-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::{json, Value};

use security_cell::models::{SecurityEvent, SecurityEventKind};
use security_cell::services::events::SecurityEventService;
use security_cell::services::guard::RateGuard;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::{client_addr, user_agent};

use crate::models::{PatientError, RegisterPatientRequest, VerifyTokenRequest};
use crate::services::patient::PatientService;
use crate::services::verification::VerificationService;

#[derive(Clone)]
pub struct PatientCellState {
    pub config: Arc<AppConfig>,
    pub registration_guard: RateGuard,
}

fn map_error(err: PatientError) -> AppError {
    match err {
        PatientError::ValidationFailed(fields) => AppError::Validation(fields),
        PatientError::Duplicate(field) => {
            AppError::Conflict(format!("A patient with this {} already exists", field))
        }
        PatientError::InvalidVerificationToken => {
            AppError::BadInput("Invalid or expired verification token".to_string())
        }
        PatientError::StoreError(msg) => AppError::Internal(msg),
    }
}

/// POST /v1/patient/register
#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<PatientCellState>,
    headers: HeaderMap,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let addr = client_addr(&headers);
    state.registration_guard.check_and_count(&addr).await?;

    let service = PatientService::new(&state.config);
    let verification = VerificationService::new(&state.config);

    match service.register(request, &verification).await {
        Ok(patient) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "patient_id": patient.id,
                "email": patient.email,
                "verification_required": true,
            })),
        )),
        Err(err) => {
            if matches!(err, PatientError::Duplicate(_)) {
                SecurityEventService::new(&state.config)
                    .record_best_effort(SecurityEvent::new(
                        SecurityEventKind::RegistrationRejected,
                        None,
                        &addr,
                        &user_agent(&headers),
                    ))
                    .await;
            }
            Err(map_error(err))
        }
    }
}

/// POST /v1/patient/verify/email
#[axum::debug_handler]
pub async fn verify_email(
    State(state): State<PatientCellState>,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let verification = VerificationService::new(&state.config);
    let patient_id = verification
        .verify_email(&request.token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient_id,
        "email_verified": true,
    })))
}

/// POST /v1/patient/verify/phone
#[axum::debug_handler]
pub async fn verify_phone(
    State(state): State<PatientCellState>,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let verification = VerificationService::new(&state.config);
    let patient_id = verification
        .verify_phone(&request.token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient_id,
        "phone_verified": true,
    })))
}
