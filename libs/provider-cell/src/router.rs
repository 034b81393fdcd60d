use axum::{routing::post, Router};

use crate::handlers::{self, ProviderCellState};

pub fn provider_routes(state: ProviderCellState) -> Router {
    Router::new()
        .route("/v1/provider/register", post(handlers::register_provider))
        .with_state(state)
}
