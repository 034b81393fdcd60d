use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::provider_auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new().route(
        "/v1/availability/search",
        get(handlers::search_availability),
    );

    let provider_routes = Router::new()
        .route("/v1/provider/availability", post(handlers::create_availability))
        .route(
            "/v1/provider/{provider_id}/availability",
            get(handlers::provider_schedule),
        )
        .route(
            "/v1/provider/availability/{slot_id}",
            put(handlers::update_slot).delete(handlers::delete_slot),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            provider_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(provider_routes)
        .with_state(state)
}
