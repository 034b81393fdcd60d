use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::patient_auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/v1/appointments/book", post(handlers::book_appointment))
        .route(
            "/v1/appointments/patient/{patient_id}",
            get(handlers::patient_appointments),
        )
        .route(
            "/v1/appointments/{appointment_id}/cancel",
            put(handlers::cancel_appointment),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            patient_auth_middleware,
        ))
        .with_state(state)
}
