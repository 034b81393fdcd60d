use axum::{routing::post, Router};

use crate::handlers::{self, PatientCellState};

pub fn patient_routes(state: PatientCellState) -> Router {
    Router::new()
        .route("/v1/patient/register", post(handlers::register_patient))
        .route("/v1/patient/verify/email", post(handlers::verify_email))
        .route("/v1/patient/verify/phone", post(handlers::verify_phone))
        .with_state(state)
}
