// libs/provider-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProviderRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
    pub specialization: String,
    pub license_number: String,
    pub years_of_experience: i32,
    pub clinic_address: ClinicAddress,
}

/// Full provider row as persisted. The password hash never leaves the
/// service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub specialization: String,
    pub license_number: String,
    pub years_of_experience: i32,
    pub clinic_street: String,
    pub clinic_city: String,
    pub clinic_state: String,
    pub clinic_zip: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Validation failed")]
    ValidationFailed(BTreeMap<String, Vec<String>>),

    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error("Store error: {0}")]
    StoreError(String),
}
