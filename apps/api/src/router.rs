use std::sync::Arc;

use axum::{Router, routing::get};

use auth_cell::handlers::AuthCellState;
use auth_cell::router::auth_routes;
use availability_cell::router::availability_routes;
use booking_cell::router::appointment_routes;
use patient_cell::handlers::PatientCellState;
use patient_cell::router::patient_routes;
use provider_cell::handlers::ProviderCellState;
use provider_cell::router::provider_routes;
use security_cell::services::guard::RateGuard;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    // Limiter state outlives requests; both registration surfaces share one
    // window per source address, as do both login surfaces.
    let registration_guard = RateGuard::registration();
    let login_guard = RateGuard::login();

    let api = Router::new()
        .merge(auth_routes(AuthCellState {
            config: config.clone(),
            login_guard,
        }))
        .merge(provider_routes(ProviderCellState {
            config: config.clone(),
            registration_guard: registration_guard.clone(),
        }))
        .merge(patient_routes(PatientCellState {
            config: config.clone(),
            registration_guard,
        }))
        .merge(availability_routes(config.clone()))
        .merge(appointment_routes(config));

    Router::new()
        .route("/", get(|| async { "Carebook API is running!" }))
        .nest("/api", api)
}
