// libs/availability-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityError, AvailabilityViewQuery, CreateAvailabilityRequest, DeleteSlotQuery,
    SearchQuery, UpdateSlotRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::search::SearchService;

fn map_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        AvailabilityError::SlotNotFound => {
            AppError::NotFound("Availability slot not found".to_string())
        }
        AvailabilityError::InvalidInput(msg) => AppError::BadInput(msg),
        AvailabilityError::ValidationFailed(map) => AppError::Validation(map),
        AvailabilityError::ScheduleConflict(msg) => AppError::Conflict(msg),
        AvailabilityError::BookedSlot => {
            AppError::BadInput("Cannot modify booked slot".to_string())
        }
        AvailabilityError::BookedSibling(msg) => AppError::Conflict(msg),
        AvailabilityError::StoreError(msg) => AppError::Internal(msg),
    }
}

/// POST /v1/provider/availability — the owning provider comes from the
/// access token, never from the body.
#[axum::debug_handler]
pub async fn create_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AvailabilityService::new(&config);
    let response = service
        .create_availability(user.id, request)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "availability_ids": response.availability_ids,
            "slots_created": response.slots_created,
            "date_range": response.date_range,
            "total_appointments_available": response.total_appointments_available,
        })),
    ))
}

/// GET /v1/provider/{provider_id}/availability
#[axum::debug_handler]
pub async fn provider_schedule(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AvailabilityViewQuery>,
) -> Result<Json<Value>, AppError> {
    if user.id != provider_id {
        return Err(AppError::Forbidden(
            "Cannot view another provider's schedule".to_string(),
        ));
    }

    debug!("Schedule view for provider {}", provider_id);

    let service = AvailabilityService::new(&config);
    let days = service
        .provider_schedule(provider_id, query)
        .await
        .map_err(map_error)?;

    let total_slots: usize = days.iter().map(|d| d.summary.total).sum();
    let total_available: usize = days.iter().map(|d| d.summary.available).sum();

    Ok(Json(json!({
        "success": true,
        "provider_id": provider_id,
        "days": days,
        "total_slots": total_slots,
        "total_available": total_available,
    })))
}

/// PUT /v1/provider/availability/{slot_id}
#[axum::debug_handler]
pub async fn update_slot(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(slot_id): Path<Uuid>,
    Json(patch): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);
    let slot = service
        .update_slot(slot_id, user.id, patch)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
    })))
}

/// DELETE /v1/provider/availability/{slot_id}?delete_recurring&reason
#[axum::debug_handler]
pub async fn delete_slot(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(slot_id): Path<Uuid>,
    Query(query): Query<DeleteSlotQuery>,
) -> Result<Json<Value>, AppError> {
    if let Some(reason) = &query.reason {
        debug!("Deleting slot {} (reason: {})", slot_id, reason);
    }

    let service = AvailabilityService::new(&config);
    let outcome = service
        .delete_slot(slot_id, user.id, query.delete_recurring)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "deleted_slots": outcome.deleted_slots,
        "cascaded": outcome.cascaded,
    })))
}

/// GET /v1/availability/search — public.
#[axum::debug_handler]
pub async fn search_availability(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SearchService::new(&config);
    let response = service.search(query).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "total_providers": response.total_providers,
        "total_slots": response.total_slots,
        "results": response.results,
    })))
}
