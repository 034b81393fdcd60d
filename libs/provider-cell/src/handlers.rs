// libs/provider-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::{json, Value};

use security_cell::models::{SecurityEvent, SecurityEventKind};
use security_cell::services::events::SecurityEventService;
use security_cell::services::guard::RateGuard;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::{client_addr, user_agent};

use crate::models::{ProviderError, RegisterProviderRequest};
use crate::services::provider::ProviderService;

#[derive(Clone)]
pub struct ProviderCellState {
    pub config: Arc<AppConfig>,
    pub registration_guard: RateGuard,
}

fn map_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::ValidationFailed(fields) => AppError::Validation(fields),
        ProviderError::Duplicate(field) => {
            AppError::Conflict(format!("A provider with this {} already exists", field))
        }
        ProviderError::StoreError(msg) => AppError::Internal(msg),
    }
}

/// POST /v1/provider/register
#[axum::debug_handler]
pub async fn register_provider(
    State(state): State<ProviderCellState>,
    headers: HeaderMap,
    Json(request): Json<RegisterProviderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let addr = client_addr(&headers);
    state.registration_guard.check_and_count(&addr).await?;

    let service = ProviderService::new(&state.config);
    match service.register(request).await {
        Ok(provider) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "provider_id": provider.id,
                "email": provider.email,
            })),
        )),
        Err(err) => {
            if matches!(err, ProviderError::Duplicate(_)) {
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
