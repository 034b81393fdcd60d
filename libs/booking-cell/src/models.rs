// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::models::{AppointmentType, SlotStatus};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub slot_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: Option<AppointmentType>,
    pub notes: Option<String>,
    pub special_requirements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub booking_reference: String,
    pub provider_id: Uuid,
    pub availability_id: Uuid,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub appointment_type: AppointmentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientAppointmentsQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SlotStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of a patient's appointments, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAppointmentsPage {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub appointments: Vec<AppointmentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentView {
    pub appointment_id: Uuid,
    pub booking_reference: String,
    pub provider_id: Uuid,
    pub availability_id: Uuid,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
    pub status: SlotStatus,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    SlotNotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store error: {0}")]
    StoreError(String),
}
