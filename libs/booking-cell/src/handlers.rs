// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, BookingError, CancelAppointmentRequest, PatientAppointmentsQuery,
};
use crate::services::booking::BookingService;

fn map_error(err: BookingError) -> AppError {
    match err {
        BookingError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        BookingError::SlotNotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::SlotNotAvailable => {
            AppError::Conflict("Appointment slot not available".to_string())
        }
        BookingError::InvalidRequest(msg) => AppError::BadInput(msg),
        BookingError::StoreError(msg) => AppError::Internal(msg),
    }
}

/// POST /v1/appointments/book
#[axum::debug_handler]
pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if request.patient_id != user.id {
        return Err(AppError::Forbidden(
            "Cannot book an appointment for another patient".to_string(),
        ));
    }

    let service = BookingService::new(&config);
    let confirmation = service.reserve(request).await.map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment_id": confirmation.appointment_id,
            "booking_reference": confirmation.booking_reference,
            "provider_id": confirmation.provider_id,
            "slot_start": confirmation.slot_start,
            "slot_end": confirmation.slot_end,
            "appointment_type": confirmation.appointment_type,
        })),
    ))
}

/// GET /v1/appointments/patient/{patient_id}
#[axum::debug_handler]
pub async fn patient_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<PatientAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    if patient_id != user.id {
        return Err(AppError::Forbidden(
            "Cannot view another patient's appointments".to_string(),
        ));
    }

    let service = BookingService::new(&config);
    let page = service
        .list_for_patient(patient_id, query)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
        "appointments": page.appointments,
    })))
}

/// PUT /v1/appointments/{appointment_id}/cancel
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);
    service
        .cancel(appointment_id, user.id, request.reason)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
    })))
}
