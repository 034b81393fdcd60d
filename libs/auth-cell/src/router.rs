use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_utils::extractor::{patient_auth_middleware, provider_auth_middleware};

use crate::handlers::{self, AuthCellState};

pub fn auth_routes(state: AuthCellState) -> Router {
    let public_routes = Router::new()
        .route("/v1/provider/login", post(handlers::provider_login))
        .route("/v1/provider/refresh", post(handlers::provider_refresh))
        .route("/v1/provider/logout", post(handlers::provider_logout))
        .route("/v1/patient/login", post(handlers::patient_login))
        .route("/v1/patient/refresh", post(handlers::patient_refresh))
        .route("/v1/patient/logout", post(handlers::patient_logout));

    let provider_routes = Router::new()
        .route("/v1/provider/logout-all", post(handlers::provider_logout_all))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            provider_auth_middleware,
        ));

    let patient_routes = Router::new()
        .route("/v1/patient/logout-all", post(handlers::patient_logout_all))
        .route("/v1/patient/sessions", get(handlers::patient_sessions))
        .route(
            "/v1/patient/sessions/{session_id}",
            delete(handlers::revoke_patient_session),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            patient_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(provider_routes)
        .merge(patient_routes)
        .with_state(state)
}
