// libs/patient-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    NonBinary,
    PreferNotToSay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone_number: String,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceInfo {
    pub provider: String,
    pub policy_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub address: PostalAddress,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_history: Option<Vec<String>>,
    pub insurance_info: Option<InsuranceInfo>,
    #[serde(default)]
    pub marketing_consent: bool,
    #[serde(default)]
    pub data_retention_consent: bool,
    #[serde(default)]
    pub hipaa_consent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Single-use verification token row. Email tokens are UUIDs living 24
/// hours; phone tokens are 6-digit OTPs living 5 minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub token: String,
    pub kind: VerificationKind,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Email,
    Phone,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Validation failed")]
    ValidationFailed(BTreeMap<String, Vec<String>>),

    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Store error: {0}")]
    StoreError(String),
}
